//! Window aggregation of per-tick movement samples.
//!
//! Samples arrive once per sampling tick. Qualifying events are counted over
//! a fixed-length window; when the window closes a [`WindowVerdict`] is
//! emitted and all window state (including the edge tracker) is cleared.

use crate::config::{Config, CountPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a closed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowVerdict {
    /// Whether `qualifying >= threshold`
    pub compliant: bool,
    /// Qualifying events counted in the window
    pub qualifying: u32,
    /// Threshold the window was judged against
    pub threshold: u32,
}

/// Elapsed time and qualifying count of the window being filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub elapsed: Duration,
    pub qualifying: u32,
}

/// Remembers the previous tick's sample so a run of `true` counts once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeTracker {
    previous: bool,
}

impl EdgeTracker {
    /// Record `sample` and report whether it is a false -> true transition.
    pub fn rising(&mut self, sample: bool) -> bool {
        let rising = sample && !self.previous;
        self.previous = sample;
        rising
    }

    pub fn reset(&mut self) {
        self.previous = false;
    }
}

/// Folds the periodic sample stream into compliance verdicts.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    sampling_interval: Duration,
    window_length: Duration,
    threshold: u32,
    policy: CountPolicy,
    window: Window,
    edges: EdgeTracker,
}

impl WindowAggregator {
    /// Create an aggregator using the window parameters in `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            sampling_interval: config.sampling_interval(),
            window_length: config.window_length(),
            threshold: config.threshold(),
            policy: config.count_policy(),
            window: Window::default(),
            edges: EdgeTracker::default(),
        }
    }

    /// Fold one tick's sample in.
    ///
    /// Returns a verdict when this tick closes the window.
    pub fn observe(&mut self, sample: bool) -> Option<WindowVerdict> {
        self.window.elapsed += self.sampling_interval;

        let rising = self.edges.rising(sample);
        let qualifies = match self.policy {
            CountPolicy::RisingEdge => rising,
            CountPolicy::TotalSamples => sample,
        };
        if qualifies {
            self.window.qualifying += 1;
        }

        if self.window.elapsed < self.window_length {
            return None;
        }

        let verdict = WindowVerdict {
            compliant: self.window.qualifying >= self.threshold,
            qualifying: self.window.qualifying,
            threshold: self.threshold,
        };
        self.reset();
        Some(verdict)
    }

    /// Discard the window in progress.
    pub fn reset(&mut self) {
        self.window = Window::default();
        self.edges.reset();
    }

    /// Pick up new window parameters. The window in progress is discarded.
    pub fn reconfigure(&mut self, config: &Config) {
        *self = Self::new(config);
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn elapsed(&self) -> Duration {
        self.window.elapsed
    }

    pub fn qualifying_count(&self) -> u32 {
        self.window.qualifying
    }

    /// Number of ticks in one window.
    pub fn ticks_per_window(&self) -> u32 {
        let step = self.sampling_interval.as_nanos().max(1);
        let ticks = (self.window_length.as_nanos() + step - 1) / step;
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn aggregator(threshold: u32) -> WindowAggregator {
        let mut config = Config::default();
        assert!(config.set_threshold(threshold));
        WindowAggregator::new(&config)
    }

    fn feed(aggregator: &mut WindowAggregator, samples: &[bool]) -> Vec<WindowVerdict> {
        samples
            .iter()
            .filter_map(|&s| aggregator.observe(s))
            .collect()
    }

    #[test]
    fn test_window_closes_after_twenty_ticks() {
        let mut agg = aggregator(3);
        assert_eq!(agg.ticks_per_window(), 20);

        let verdicts = feed(&mut agg, &[false; 19]);
        assert!(verdicts.is_empty());
        assert_eq!(agg.elapsed(), Duration::from_millis(4750));

        let verdict = agg.observe(false).unwrap();
        assert!(!verdict.compliant);
        assert_eq!(agg.window(), Window::default());
    }

    #[test]
    fn test_alternating_samples_count_every_rise() {
        let mut agg = aggregator(3);
        let samples: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
        let verdicts = feed(&mut agg, &samples);

        assert_eq!(
            verdicts,
            vec![WindowVerdict {
                compliant: true,
                qualifying: 10,
                threshold: 3,
            }]
        );
    }

    #[test]
    fn test_constant_true_counts_once() {
        let mut agg = aggregator(2);
        let verdicts = feed(&mut agg, &[true; 20]);

        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].qualifying, 1);
        assert!(!verdicts[0].compliant);
    }

    #[test]
    fn test_runs_and_isolated_ticks() {
        // true at ticks 2,3 / 8 / 15,16,17 (1-based)
        let mut samples = [false; 20];
        for tick in [2, 3, 8, 15, 16, 17] {
            samples[tick - 1] = true;
        }
        let mut agg = aggregator(3);
        let verdicts = feed(&mut agg, &samples);

        assert_eq!(verdicts[0].qualifying, 3);
        assert!(verdicts[0].compliant);
    }

    #[test]
    fn test_edge_tracker_resets_between_windows() {
        let mut agg = aggregator(1);
        let mut samples = vec![false; 19];
        samples.push(true);
        samples.push(true);
        let verdicts = feed(&mut agg, &samples);

        assert_eq!(verdicts[0].qualifying, 1);
        // the run continuing into the next window rises again
        assert_eq!(agg.qualifying_count(), 1);
    }

    #[test]
    fn test_total_samples_policy() {
        let mut config = Config::default();
        config.set_count_policy(CountPolicy::TotalSamples);
        assert!(config.set_threshold(5));
        let mut agg = WindowAggregator::new(&config);

        let verdicts = feed(&mut agg, &[true; 20]);
        assert_eq!(verdicts[0].qualifying, 20);
        assert!(verdicts[0].compliant);
    }

    #[test]
    fn test_rising_edges_decide_compliance() {
        // Every 20-tick pattern with a known rising-edge count
        let patterns: [(&str, u32); 5] = [
            ("TTTTTTTTTTTTTTTTTTTT", 1),
            ("FFFFFFFFFFFFFFFFFFFF", 0),
            ("TFFTFFTFFFFFFFFFFFFF", 3),
            ("FTTFTTFTTFFFFFFFFFFF", 3),
            ("TFTFTFFFFFFFFFFFFFFF", 3),
        ];
        for (pattern, rises) in patterns {
            let samples: Vec<bool> = pattern.chars().map(|c| c == 'T').collect();
            for threshold in 1..=4 {
                let mut agg = aggregator(threshold);
                let verdict = feed(&mut agg, &samples)[0];
                assert_eq!(verdict.qualifying, rises, "{pattern}");
                assert_eq!(verdict.compliant, rises >= threshold, "{pattern}");
            }
        }
    }

    #[test]
    fn test_reconfigure_discards_window() {
        let mut agg = aggregator(3);
        feed(&mut agg, &[true, false, true]);
        assert_eq!(agg.qualifying_count(), 2);

        let mut config = Config::default();
        assert!(config.set_window_length(Duration::from_secs(1)));
        agg.reconfigure(&config);
        assert_eq!(agg.qualifying_count(), 0);
        assert_eq!(agg.ticks_per_window(), 4);
    }
}
