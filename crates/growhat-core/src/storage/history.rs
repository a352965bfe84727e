use alloc::vec::Vec;

use heapless::Deque;

/// Number of saturation samples kept per channel
pub const HISTORY_CAPACITY: usize = 96;

/// Rolling buffer of recent saturation samples, oldest first.
///
/// Once full, each push evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct ReadingHistory {
    samples: Deque<f32, HISTORY_CAPACITY>,
}

impl ReadingHistory {
    pub const fn new() -> Self {
        Self {
            samples: Deque::new(),
        }
    }

    pub fn push(&mut self, saturation: f32) {
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        self.samples.push_back(saturation).ok();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    /// Samples in chronological order
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for ReadingHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_insertion_order() {
        let mut history = ReadingHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);

        history.push(0.1);
        history.push(0.2);
        history.push(0.3);
        assert_eq!(history.to_vec(), [0.1, 0.2, 0.3]);
        assert_eq!(history.latest(), Some(0.3));
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut history = ReadingHistory::new();
        let total = HISTORY_CAPACITY + 10;
        for i in 0..total {
            history.push(i as f32);
        }

        assert_eq!(history.len(), HISTORY_CAPACITY);
        let expected: Vec<f32> = (10..total).map(|i| i as f32).collect();
        assert_eq!(history.to_vec(), expected);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut history = ReadingHistory::new();
        for i in 0..(HISTORY_CAPACITY * 3) {
            history.push(i as f32);
            assert!(history.len() <= HISTORY_CAPACITY);
        }
        history.clear();
        assert!(history.is_empty());
    }
}
