//! Priority request scheduler.
//!
//! Submissions become tickets in a four-band priority queue. A single
//! daemon task dispatches them under two bounds, a concurrency cap and a
//! multi-window rate limiter, and owns every retry decision. Handles are
//! cloneable and channel-connected, so no caller ever touches scheduler
//! state directly.
//!
//! ```ignore
//! let scheduler = RequestScheduler::spawn(
//!     SchedulerConfig::new(),
//!     RateLimitConfig::new(),
//!     RetryConfig::new(),
//!     Arc::new(ReqwestTransport::new()?),
//!     Some(cache),
//!     Arc::new(EndpointHealthTracker::new(HealthConfig::new())),
//! );
//! let response = scheduler
//!     .submit(RequestSpec::new(Target::get("https://api.example.com/v1/orders")))
//!     .await?;
//! ```

mod daemon;
mod handle;
mod queue;
mod telemetry;
mod ticket;

pub use daemon::SchedulerStatsSnapshot;
pub use handle::RequestScheduler;
pub use telemetry::SchedulerEvent;
pub use ticket::{Priority, RequestSpec, TicketId};
