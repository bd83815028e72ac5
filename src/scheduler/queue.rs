//! Per-priority pending queue.
//!
//! Four FIFO bands, one per [`Priority`]. Dispatch always drains the
//! highest non-empty band first; within a band, order is insertion order.
//! Rate-limit pushback re-inserts at the front of the band so a deferred
//! ticket keeps its turn; retries re-enter at the tail.

use super::ticket::{Priority, RequestTicket};
use std::collections::VecDeque;

pub(crate) struct PendingQueue {
    bands: [VecDeque<RequestTicket>; Priority::COUNT],
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self {
            bands: std::array::from_fn(|_| VecDeque::new()),
        }
    }

    /// Appends at the tail of the ticket's priority band.
    pub(crate) fn push_back(&mut self, ticket: RequestTicket) {
        self.bands[ticket.priority.band()].push_back(ticket);
    }

    /// Re-inserts at the front of the ticket's priority band, preserving
    /// its place after a rate-limit deferral.
    pub(crate) fn push_front(&mut self, ticket: RequestTicket) {
        self.bands[ticket.priority.band()].push_front(ticket);
    }

    /// Removes the next ticket to dispatch: head of the highest non-empty
    /// band.
    pub(crate) fn pop(&mut self) -> Option<RequestTicket> {
        self.bands.iter_mut().find_map(VecDeque::pop_front)
    }

    pub(crate) fn len(&self) -> usize {
        self.bands.iter().map(VecDeque::len).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bands.iter().all(VecDeque::is_empty)
    }

    /// Empties the queue, yielding tickets in dispatch order. Used by the
    /// shutdown drain.
    pub(crate) fn drain(&mut self) -> Vec<RequestTicket> {
        let mut drained = Vec::with_capacity(self.len());
        for band in &mut self.bands {
            drained.extend(band.drain(..));
        }
        drained
    }
}
