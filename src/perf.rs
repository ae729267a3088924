//! Timing primitives: the measurement stopwatch and phase counters.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Stopwatch with reset/start/stop semantics.
///
/// Elapsed time accumulates across start/stop pairs, so setup work done
/// while stopped is excluded. [`Stopwatch::reset`] discards everything
/// measured so far, including a running interval, without stopping.
#[derive(Debug, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
    accumulated: Duration,
}

impl Stopwatch {
    /// Create a stopped stopwatch with zero elapsed time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or keep) running.
    #[inline]
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Stop running and fold the current interval into the total.
    #[inline]
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.accumulated += started.elapsed();
        }
    }

    /// Zero the elapsed time. A running stopwatch keeps running from now.
    #[inline]
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }

    /// Whether the stopwatch is running.
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Total elapsed time, including the running interval.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.accumulated + started.elapsed(),
            None => self.accumulated,
        }
    }
}

/// Accumulates durations for one named phase.
#[derive(Debug, Clone, Default)]
pub struct PerfCounter {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl PerfCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one duration.
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total += duration;
        self.min = Some(self.min.map_or(duration, |min| min.min(duration)));
        self.max = Some(self.max.map_or(duration, |max| max.max(duration)));
    }

    /// Snapshot of the recorded durations.
    pub fn stats(&self) -> PerfStats {
        let avg_time = if self.count > 0 {
            Duration::from_nanos((self.total.as_nanos() / u128::from(self.count)) as u64)
        } else {
            Duration::ZERO
        };

        PerfStats {
            count: self.count,
            total_time: self.total,
            avg_time,
            min_time: self.min.unwrap_or(Duration::ZERO),
            max_time: self.max.unwrap_or(Duration::ZERO),
        }
    }

    /// Forget everything recorded.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Statistics snapshot of a [`PerfCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfStats {
    /// Number of recorded durations
    pub count: u64,
    /// Sum of all durations
    pub total_time: Duration,
    /// Mean duration
    pub avg_time: Duration,
    /// Shortest duration
    pub min_time: Duration,
    /// Longest duration
    pub max_time: Duration,
}

/// Named phase counters, e.g. time spent auditing, verifying and measuring.
#[derive(Debug, Clone, Default)]
pub struct PhaseRegistry {
    counters: BTreeMap<String, PerfCounter>,
}

impl PhaseRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a duration against a phase, creating the counter on first use.
    pub fn record(&mut self, phase: &str, duration: Duration) {
        self.counters
            .entry(phase.to_string())
            .or_default()
            .record(duration);
    }

    /// Time `f` and record it against `phase`.
    pub fn time<T>(&mut self, phase: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.record(phase, start.elapsed());
        result
    }

    /// Statistics for one phase.
    pub fn stats(&self, phase: &str) -> Option<PerfStats> {
        self.counters.get(phase).map(PerfCounter::stats)
    }

    /// Statistics for every phase, ordered by name.
    pub fn all_stats(&self) -> BTreeMap<String, PerfStats> {
        self.counters
            .iter()
            .map(|(name, counter)| (name.clone(), counter.stats()))
            .collect()
    }

    /// Reset all counters.
    pub fn reset_all(&mut self) {
        for counter in self.counters.values_mut() {
            counter.reset();
        }
    }
}
