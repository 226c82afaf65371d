use std::collections::VecDeque;

/// Fixed-capacity FIFO holding the most recent samples shown on screen.
#[derive(Debug, Clone)]
pub struct WindowBuffer<T> {
    live: VecDeque<T>,
    capacity: usize,
}

impl<T> WindowBuffer<T> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            live: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn push(&mut self, item: T) {
        self.live.push_back(item);
        self.prune_by_points();
    }

    /// Change the capacity, evicting the oldest entries right away when shrinking.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.prune_by_points();
    }

    pub fn clear(&mut self) {
        self.live.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.live.iter()
    }

    /// Take every buffered entry, oldest first, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<T> {
        self.live.drain(..).collect()
    }

    fn prune_by_points(&mut self) {
        while self.live.len() > self.capacity {
            self.live.pop_front();
        }
    }
}

impl<T: Clone> WindowBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.live.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_capacity_items_in_arrival_order() {
        let mut w = WindowBuffer::new(5);
        for k in 0..4 {
            w.clear();
            for i in 0..(5 + k) {
                w.push(i);
            }
            assert_eq!(w.len(), 5);
            let expected: Vec<usize> = (k..5 + k).collect();
            assert_eq!(w.to_vec(), expected);
        }
    }

    #[test]
    fn shrinking_keeps_most_recent() {
        let mut w = WindowBuffer::new(10);
        for i in 0..10 {
            w.push(i);
        }
        w.resize(3);
        assert_eq!(w.capacity(), 3);
        assert_eq!(w.to_vec(), vec![7, 8, 9]);
        w.push(10);
        assert_eq!(w.to_vec(), vec![8, 9, 10]);
    }

    #[test]
    fn growing_does_not_evict() {
        let mut w = WindowBuffer::new(2);
        w.push('a');
        w.push('b');
        w.resize(4);
        w.push('c');
        assert_eq!(w.to_vec(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut w = WindowBuffer::new(0);
        assert_eq!(w.capacity(), 1);
        w.push(1);
        w.push(2);
        assert_eq!(w.to_vec(), vec![2]);
        w.resize(0);
        assert_eq!(w.capacity(), 1);
    }

    #[test]
    fn drain_empties_buffer() {
        let mut w = WindowBuffer::new(4);
        w.push(1.0);
        w.push(2.0);
        assert_eq!(w.drain(), vec![1.0, 2.0]);
        assert!(w.is_empty());
    }
}
