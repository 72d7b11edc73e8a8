//! A fast resettable vector based on timestamps.

use std::ops::{Index, IndexMut};

/// A vector which can be reset to a default value in amortized O(1)
/// by bumping a 32bit generation counter.
/// Elements are modified through the index traits.
#[derive(Debug, Clone)]
pub struct TimestampedVector<T> {
    data: Vec<T>,
    // timestamp of the current generation, up to date values carry this one
    current: u32,
    timestamps: Vec<u32>,
    default: T,
}

impl<T: Clone> TimestampedVector<T> {
    pub fn new(size: usize, default: T) -> TimestampedVector<T> {
        TimestampedVector {
            data: vec![default.clone(); size],
            current: 0,
            timestamps: vec![0; size],
            default,
        }
    }

    /// Reset all elements to the default.
    pub fn reset(&mut self) {
        let (new, overflow) = self.current.overflowing_add(1);
        self.current = new;

        // on counter overflow old timestamps become current again, so reset manually
        if overflow {
            for element in &mut self.data {
                *element = self.default.clone();
            }
        }
    }

    pub fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
        self.timestamps[index] = self.current;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Index<usize> for TimestampedVector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        if self.timestamps[index] == self.current {
            &self.data[index]
        } else {
            &self.default
        }
    }
}

impl<T: Clone> IndexMut<usize> for TimestampedVector<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        if self.timestamps[index] != self.current {
            let default = self.default.clone();
            self.set(index, default);
        }
        &mut self.data[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_default() {
        let mut distances = TimestampedVector::new(3, u32::MAX);
        distances[1] = 42;
        assert_eq!(distances[1], 42);
        distances.reset();
        assert_eq!(distances[1], u32::MAX);
    }
}
