// Round planner
// Splits the canonical-digest space [0, 2^filter_bits) into rounds whose
// candidate populations are roughly equal, using a bin histogram filled by a
// preparatory pass over the input.

use std::sync::atomic::{AtomicU32, Ordering};

/// Number of equal bins the digest space is divided into.
pub const BINS_COUNT: usize = 1 << 24;

/// Inclusive digest range processed by one round.
pub type RoundRange = (u64, u64);

pub struct RoundPlanner {
    bins: Vec<AtomicU32>,
    bin_size: u64,
    real_size: u64,
}

impl RoundPlanner {
    pub fn new(filter_bits: u32) -> Self {
        let real_size = 1u64 << filter_bits;
        let bin_size = std::cmp::max(1, real_size / BINS_COUNT as u64);
        let mut bins = Vec::with_capacity(BINS_COUNT);
        bins.resize_with(BINS_COUNT, || AtomicU32::new(0));
        RoundPlanner {
            bins,
            bin_size,
            real_size,
        }
    }

    /// Count a distinct edge: bump the bins of its two endpoint digests.
    /// Counters saturate instead of wrapping.
    pub fn count_edge(&self, prefix_digest: u64, suffix_digest: u64) {
        for digest in [prefix_digest, suffix_digest] {
            let bin = &self.bins[(digest / self.bin_size) as usize % BINS_COUNT];
            if bin.load(Ordering::Relaxed) < u32::MAX {
                bin.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Form `rounds` inclusive digest ranges greedily: extend the current
    /// round until its accumulated count first exceeds an equal share, and
    /// let the final round absorb the remainder.
    pub fn plan(&self, rounds: usize) -> Vec<RoundRange> {
        if rounds <= 1 {
            return vec![(0, self.real_size)];
        }

        let total: u64 = self
            .bins
            .iter()
            .map(|b| b.load(Ordering::Relaxed) as u64)
            .sum();
        let round_share = total as f64 / rounds as f64;

        let mut ranges = Vec::with_capacity(rounds);
        let mut low = 0u64;
        let mut boundary = 0usize;
        for round in 0..rounds {
            let last = round + 1 == rounds;
            if boundary >= BINS_COUNT {
                // Degenerate: more rounds than populated bins. Trailing
                // rounds are empty, but the final one still closes the space.
                let high = if last { self.real_size } else { low - 1 };
                ranges.push((low, high));
                low = high + 1;
                continue;
            }
            let mut accumulated = self.bins[boundary].load(Ordering::Relaxed) as u64;
            boundary += 1;
            while boundary < BINS_COUNT {
                if accumulated as f64 <= round_share || last {
                    accumulated += self.bins[boundary].load(Ordering::Relaxed) as u64;
                    boundary += 1;
                } else {
                    break;
                }
            }

            let high = if last {
                self.real_size
            } else {
                boundary as u64 * self.bin_size
            };
            ranges.push((low, high));
            low = high + 1;
        }

        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_round_covers_everything() {
        let planner = RoundPlanner::new(20);
        assert_eq!(planner.plan(1), vec![(0, 1 << 20)]);
    }

    #[test]
    fn test_ranges_are_disjoint_and_cover_the_space() {
        let planner = RoundPlanner::new(26);
        // Skewed population: everything in the lower half of the space.
        let mut state = 1u64;
        for _ in 0..10_000 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let digest = (state >> 12) % (1 << 25);
            planner.count_edge(digest, digest ^ 0xfff);
        }

        let ranges = planner.plan(4);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].0, 0);
        assert_eq!(ranges[3].1, 1 << 26);
        for window in ranges.windows(2) {
            assert_eq!(window[1].0, window[0].1 + 1);
        }
    }

    #[test]
    fn test_balanced_population_gets_balanced_rounds() {
        let planner = RoundPlanner::new(30);
        let mut state = 99u64;
        for _ in 0..40_000 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(7);
            planner.count_edge(state % (1 << 30), (state >> 17) % (1 << 30));
        }

        let ranges = planner.plan(4);
        let total: u64 = planner
            .bins
            .iter()
            .map(|b| b.load(Ordering::Relaxed) as u64)
            .sum();
        for &(low, high) in &ranges {
            let count: u64 = planner
                .bins
                .iter()
                .enumerate()
                .filter(|(i, _)| {
                    let first = *i as u64 * planner.bin_size;
                    first >= low && first <= high
                })
                .map(|(_, b)| b.load(Ordering::Relaxed) as u64)
                .sum();
            // Greedy splitting on a uniform population: no round should hold
            // more than half of everything.
            assert!(count < total / 2 + planner.bin_size, "range ({low},{high})");
        }
    }
}
