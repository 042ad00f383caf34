//! Flush and render metrics
//!
//! Counters shared by the accumulators and render queues of one pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Why a bucket was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The bucket reached its batch size
    Threshold,
    /// The scheduled sweep found it non-empty
    Sweep,
    /// An explicit flush, e.g. at shutdown
    Manual,
}

/// Counters for one pipeline
#[derive(Debug, Default)]
pub struct FlushMetrics {
    /// Placements taken in by the pipeline, counted once each
    pub accepted: AtomicU64,

    /// Flushes by trigger
    pub threshold_flushes: AtomicU64,
    pub sweep_flushes: AtomicU64,
    pub manual_flushes: AtomicU64,

    /// Deltas handed to renderers
    pub flushed_deltas: AtomicU64,

    /// Incremental renders that completed, and time spent in them (nanoseconds)
    pub renders: AtomicU64,
    pub total_render_time_ns: AtomicU64,

    /// Incremental renders that failed and fell back to regeneration
    pub render_failures: AtomicU64,

    /// Full regenerations, successful and failed
    pub regenerations: AtomicU64,
    pub regeneration_failures: AtomicU64,
}

impl FlushMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flush of `deltas` deltas
    pub fn record_flush(&self, trigger: FlushTrigger, deltas: usize) {
        let counter = match trigger {
            FlushTrigger::Threshold => &self.threshold_flushes,
            FlushTrigger::Sweep => &self.sweep_flushes,
            FlushTrigger::Manual => &self.manual_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.flushed_deltas
            .fetch_add(deltas as u64, Ordering::Relaxed);
    }

    pub fn record_render(&self, duration: Duration) {
        self.renders.fetch_add(1, Ordering::Relaxed);
        self.total_render_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_render_failure(&self) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_regeneration(&self, ok: bool) {
        if ok {
            self.regenerations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.regeneration_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> FlushSnapshot {
        FlushSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            threshold_flushes: self.threshold_flushes.load(Ordering::Relaxed),
            sweep_flushes: self.sweep_flushes.load(Ordering::Relaxed),
            manual_flushes: self.manual_flushes.load(Ordering::Relaxed),
            flushed_deltas: self.flushed_deltas.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            total_render_time_ns: self.total_render_time_ns.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            regenerations: self.regenerations.load(Ordering::Relaxed),
            regeneration_failures: self.regeneration_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`FlushMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSnapshot {
    pub accepted: u64,
    pub threshold_flushes: u64,
    pub sweep_flushes: u64,
    pub manual_flushes: u64,
    pub flushed_deltas: u64,
    pub renders: u64,
    pub total_render_time_ns: u64,
    pub render_failures: u64,
    pub regenerations: u64,
    pub regeneration_failures: u64,
}

impl FlushSnapshot {
    pub fn flushes(&self) -> u64 {
        self.threshold_flushes + self.sweep_flushes + self.manual_flushes
    }

    /// Get average incremental render time
    pub fn avg_render_time(&self) -> Duration {
        if self.renders == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_render_time_ns / self.renders)
        }
    }
}

impl std::fmt::Display for FlushSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  Accepted: {} | Flushed: {} in {} flushes (threshold {}, sweep {}, manual {})",
            self.accepted,
            self.flushed_deltas,
            self.flushes(),
            self.threshold_flushes,
            self.sweep_flushes,
            self.manual_flushes
        )?;
        writeln!(
            f,
            "  Renders: {} | Avg Time: {:.2}ms | Failures: {}",
            self.renders,
            self.avg_render_time().as_secs_f64() * 1000.0,
            self.render_failures
        )?;
        writeln!(
            f,
            "  Regenerations: {} | Regeneration Failures: {}",
            self.regenerations, self.regeneration_failures
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_counters() {
        let metrics = FlushMetrics::new();

        metrics.record_accept();
        metrics.record_accept();
        metrics.record_flush(FlushTrigger::Threshold, 2);
        metrics.record_flush(FlushTrigger::Sweep, 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.flushes(), 2);
        assert_eq!(snapshot.flushed_deltas, 3);
    }

    #[test]
    fn test_avg_render_time() {
        let metrics = FlushMetrics::new();

        metrics.record_render(Duration::from_millis(10));
        metrics.record_render(Duration::from_millis(20));

        assert_eq!(metrics.snapshot().avg_render_time(), Duration::from_millis(15));
    }

    #[test]
    fn test_regeneration_outcomes() {
        let metrics = FlushMetrics::new();

        metrics.record_regeneration(true);
        metrics.record_regeneration(false);
        metrics.record_regeneration(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.regenerations, 1);
        assert_eq!(snapshot.regeneration_failures, 2);
        assert!(snapshot.to_string().contains("Regeneration Failures: 2"));
    }
}
