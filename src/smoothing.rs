//! # Temporal Smoothing
//!
//! Bounded per-mission history of accepted raw values combined with a
//! linearly weighted moving average: the i-th oldest entry gets weight `i + 1`.

use std::collections::VecDeque;

/// Entries kept per mission
pub const HISTORY_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct History {
    values: VecDeque<f32>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_SIZE)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, value: f32) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn values(&self) -> Vec<f32> {
        self.values.iter().copied().collect()
    }

    /// `Σ(value × (i+1)) / Σ(i+1)`, oldest first
    pub fn weighted_mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let (sum, weights) = self
            .values
            .iter()
            .enumerate()
            .fold((0.0f64, 0.0f64), |(sum, weights), (i, &value)| {
                let weight = (i + 1) as f64;
                (sum + f64::from(value) * weight, weights + weight)
            });
        Some(sum / weights)
    }

    pub fn smoothed(&self) -> Option<i32> {
        self.weighted_mean().map(|mean| mean.round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_smoothing_law() {
        let mut history = History::default();
        for value in [10.0, 20.0, 30.0, 40.0, 50.0] {
            history.push(value);
        }
        assert_eq!(history.smoothed(), Some(40));
    }

    #[test]
    fn test_newest_weighs_most() {
        let mut history = History::default();
        history.push(60.0);
        history.push(90.0);
        // (60 + 180) / 3
        assert_eq!(history.weighted_mean(), Some(80.0));
    }

    #[test]
    fn test_bounded_to_five() {
        let mut history = History::default();
        for value in 1..=8 {
            history.push(value as f32);
        }
        assert_eq!(history.len(), HISTORY_SIZE);
        assert_eq!(history.values(), vec![4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_empty_and_clear() {
        let mut history = History::default();
        assert_eq!(history.smoothed(), None);
        history.push(72.0);
        assert_eq!(history.smoothed(), Some(72));
        history.clear();
        assert!(history.is_empty());
    }
}
