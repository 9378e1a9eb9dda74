//! Running per-day LTV statistics for a single key.

use crate::types::{Ltv, LTV_DAYS};

/// Accumulator of per-day sums and contribution counts.
///
/// Values of 0 are treated as "no observation for this day" and never
/// contribute to a slot's mean.
#[derive(Debug, Clone, Default)]
pub struct LtvAccumulator {
    /// Sum of non-zero values per day slot
    sums: Ltv,

    /// Number of non-zero contributions per day slot
    counts: [u32; LTV_DAYS],

    /// Number of vectors added, zero or not
    vectors: u64,
}

impl LtvAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one LTV vector.
    pub fn add(&mut self, ltv: &Ltv) {
        for (day, &value) in ltv.iter().enumerate() {
            if value == 0.0 {
                continue;
            }
            self.sums[day] += value;
            self.counts[day] += 1;
        }
        self.vectors += 1;
    }

    /// Mean of every slot that received at least one contribution, in day order.
    ///
    /// Slots without contributions are skipped, not interpolated, so the
    /// result can be shorter than [`LTV_DAYS`].
    pub fn averages(&self) -> Vec<f64> {
        self.sums
            .iter()
            .zip(self.counts.iter())
            .filter(|(_, &count)| count > 0)
            .map(|(&sum, &count)| sum / count as f64)
            .collect()
    }

    /// Number of vectors added.
    pub fn vectors(&self) -> u64 {
        self.vectors
    }

    /// Number of slots with at least one contribution.
    pub fn observed_days(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}
