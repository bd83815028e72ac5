//! Fixed-size ring buffer for outcome samples.

/// A fixed-size circular buffer.
///
/// Holds the most recent `capacity` values; pushing into a full buffer
/// overwrites the oldest value. The buffer is a rolling log: out-of-window
/// values are excluded by readers at aggregation time, never eagerly
/// deleted here.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a new ring buffer with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Pushes a value, overwriting the oldest value if full.
    pub fn push(&mut self, value: T) {
        if self.data.len() < self.capacity {
            self.data.push(value);
        } else {
            self.data[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Iterates values in order from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (wrapped, start) = self.data.split_at(self.head);
        start.iter().chain(wrapped.iter())
    }

    /// Returns the number of values in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_iter_in_order() {
        let mut buf: RingBuffer<i32> = RingBuffer::new(3);
        assert!(buf.is_empty());

        buf.push(1);
        buf.push(2);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_overflow_overwrites_oldest() {
        let mut buf: RingBuffer<i32> = RingBuffer::new(3);
        buf.push(1);
        buf.push(2);
        buf.push(3);
        buf.push(4);

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);

        buf.push(5);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_capacity() {
        let buf: RingBuffer<i32> = RingBuffer::new(8);
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn test_zero_capacity_panics() {
        RingBuffer::<i32>::new(0);
    }
}
