/// Default number of samples retained per series.
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity ring buffer. Once full, each push overwrites the oldest
/// entry in place.
///
/// Storage is allocated once at construction and never grows past
/// `capacity`; there is no resize operation.
///
/// # Examples
///
/// ```
/// use hearth_collector::buffer::RingBuffer;
///
/// let mut buf = RingBuffer::new(3);
/// for v in 1..=5 {
///     buf.push(v);
/// }
/// assert_eq!(buf.len(), 3);
/// assert_eq!(buf.latest(), Some(&5));
/// assert_eq!(buf.to_vec(10), vec![3, 4, 5]);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    /// Slot the next push writes to.
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer. A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() < self.capacity {
            self.items.push(item);
        } else {
            self.items[self.head] = item;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    pub fn latest(&self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let idx = (self.head + self.capacity - 1) % self.capacity;
        self.items.get(idx)
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        let len = self.items.len();
        let start = if len < self.capacity { 0 } else { self.head };
        (0..len).map(move |i| &self.items[(start + i) % self.capacity])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Returns up to `n` of the most recent entries, oldest first.
    pub fn to_vec(&self, n: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(n);
        self.iter().skip(skip).cloned().collect()
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_has_no_latest() {
        let buf: RingBuffer<u32> = RingBuffer::new(4);
        assert!(buf.is_empty());
        assert_eq!(buf.latest(), None);
        assert!(buf.to_vec(4).is_empty());
    }

    #[test]
    fn overflow_keeps_last_capacity_values_in_order() {
        for capacity in [1usize, 2, 3, 7, 100] {
            let mut buf = RingBuffer::new(capacity);
            let pushes = capacity * 3 + 1;
            for v in 0..pushes {
                buf.push(v);
            }
            assert_eq!(buf.len(), capacity);
            let expected: Vec<usize> = (pushes - capacity..pushes).collect();
            assert_eq!(buf.to_vec(capacity), expected, "capacity {capacity}");
            assert_eq!(buf.latest(), Some(&(pushes - 1)));
        }
    }

    #[test]
    fn to_vec_limits_to_most_recent() {
        let mut buf = RingBuffer::new(5);
        for v in 1..=4 {
            buf.push(v);
        }
        assert_eq!(buf.to_vec(2), vec![3, 4]);
        assert_eq!(buf.to_vec(0), Vec::<i32>::new());
        assert_eq!(buf.to_vec(99), vec![1, 2, 3, 4]);
    }

    #[test]
    fn storage_never_grows_past_capacity() {
        let mut buf = RingBuffer::new(8);
        for v in 0..10_000 {
            buf.push(v);
        }
        assert!(buf.items.capacity() >= 8);
        assert_eq!(buf.items.len(), 8);
        assert!(buf.is_full());
    }

    #[test]
    fn clear_resets_write_position() {
        let mut buf = RingBuffer::new(2);
        buf.push("a");
        buf.push("b");
        buf.push("c");
        buf.clear();
        buf.push("d");
        assert_eq!(buf.to_vec(2), vec!["d"]);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let mut buf = RingBuffer::new(0);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.to_vec(5), vec![2]);
    }
}
