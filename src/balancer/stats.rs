//! Per-outcome statistic collection.
//!
//! # Responsibilities
//! - Accumulate count and latency data for one outcome category of a node
//! - One collector per (node, status code), created lazily on first outcome

use std::time::Duration;

/// Bucket key under which outcomes without a response are recorded.
pub const NO_RESPONSE: u16 = 0;

/// The observed result of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    code: Option<u16>,
    elapsed: Option<Duration>,
}

impl Outcome {
    /// Outcome for a request that received a response with the given status code.
    pub fn status(code: u16) -> Self {
        Self {
            code: Some(code),
            elapsed: None,
        }
    }

    /// Outcome for a request that never received a response.
    pub fn no_response() -> Self {
        Self {
            code: None,
            elapsed: None,
        }
    }

    /// Attach the observed request latency.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// The status code, if a response was received.
    pub fn code(&self) -> Option<u16> {
        self.code
    }

    /// The observed latency, if one was measured.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// The statistics bucket this outcome falls into.
    pub fn bucket(&self) -> u16 {
        self.code.unwrap_or(NO_RESPONSE)
    }
}

/// Accumulator for one outcome category.
///
/// Purely additive; only an explicit clear on the owning node discards it.
#[derive(Debug, Clone, Default)]
pub struct StatisticCollector {
    count: u64,
    min_time: Option<Duration>,
    max_time: Option<Duration>,
    total_time: Duration,
}

impl StatisticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observed outcome into the accumulator.
    pub fn collect_from(&mut self, outcome: &Outcome) {
        self.count += 1;
        if let Some(t) = outcome.elapsed() {
            self.min_time = Some(self.min_time.map_or(t, |m| m.min(t)));
            self.max_time = Some(self.max_time.map_or(t, |m| m.max(t)));
            self.total_time += t;
        }
    }

    /// Number of outcomes recorded so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Shortest observed latency, if any outcome carried one.
    pub fn min_time(&self) -> Option<Duration> {
        self.min_time
    }

    /// Longest observed latency, if any outcome carried one.
    pub fn max_time(&self) -> Option<Duration> {
        self.max_time
    }

    /// Mean observed latency across all outcomes that carried one.
    pub fn avg_time(&self) -> Option<Duration> {
        if self.count == 0 || self.total_time.is_zero() {
            return None;
        }
        Some(self.total_time / self.count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let mut sc = StatisticCollector::new();
        assert_eq!(sc.count(), 0);

        sc.collect_from(&Outcome::status(200));
        sc.collect_from(&Outcome::status(200));
        assert_eq!(sc.count(), 2);
    }

    #[test]
    fn test_latency_tracking() {
        let mut sc = StatisticCollector::new();
        sc.collect_from(&Outcome::status(200).with_elapsed(Duration::from_millis(10)));
        sc.collect_from(&Outcome::status(200).with_elapsed(Duration::from_millis(30)));
        sc.collect_from(&Outcome::status(200));

        assert_eq!(sc.min_time(), Some(Duration::from_millis(10)));
        assert_eq!(sc.max_time(), Some(Duration::from_millis(30)));
        assert_eq!(sc.count(), 3);
    }

    #[test]
    fn test_no_response_bucket() {
        assert_eq!(Outcome::no_response().bucket(), NO_RESPONSE);
        assert_eq!(Outcome::status(502).bucket(), 502);
    }
}
