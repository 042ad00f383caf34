//! Per-scope pending-delta buckets.
//!
//! A bucket moves EMPTY → ACCUMULATING → FLUSHING → EMPTY. Take-and-clear
//! and the hand-off to the sink both happen under the bucket's map guard, so
//! a concurrent `accept` lands either in the outgoing batch or in the next
//! one, and batches for one scope reach the sink in the order they were cut.

use crate::metrics::{FlushMetrics, FlushTrigger};
use dashmap::DashMap;
use pixelplace_core::BatchMode;
use pixelplace_types::PixelDelta;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Receives flushed batches. Must not block.
pub trait BatchSink<K>: Send + Sync {
    fn submit(&self, scope: &K, batch: Vec<PixelDelta>);
}

pub struct BatchAccumulator<K: Eq + Hash> {
    buckets: DashMap<K, Vec<PixelDelta>>,
    threshold: usize,
    mode: BatchMode,
    sink: Arc<dyn BatchSink<K>>,
    metrics: Arc<FlushMetrics>,
}

impl<K> BatchAccumulator<K>
where
    K: Clone + Eq + Hash + std::fmt::Display,
{
    pub fn new(
        mode: BatchMode,
        threshold: usize,
        sink: Arc<dyn BatchSink<K>>,
        metrics: Arc<FlushMetrics>,
    ) -> Self {
        Self {
            buckets: DashMap::new(),
            threshold: threshold.max(1),
            mode,
            sink,
            metrics,
        }
    }

    /// Add a delta; returns true when it triggered a threshold flush.
    pub fn accept(&self, scope: K, delta: PixelDelta) -> bool {
        let mut bucket = self.buckets.entry(scope).or_default();
        bucket.push(delta);

        if !self.mode.flushes_on_count() || bucket.len() < self.threshold {
            return false;
        }

        let batch = std::mem::take(&mut *bucket);
        debug!(scope = %bucket.key(), deltas = batch.len(), "Batch size reached");
        self.metrics.record_flush(FlushTrigger::Threshold, batch.len());
        self.sink.submit(bucket.key(), batch);
        true
    }

    /// Flush one scope; returns the number of deltas handed off.
    pub fn flush(&self, scope: &K, trigger: FlushTrigger) -> usize {
        let flushed = match self.buckets.get_mut(scope) {
            Some(mut bucket) if !bucket.is_empty() => {
                let batch = std::mem::take(&mut *bucket);
                let len = batch.len();
                self.metrics.record_flush(trigger, len);
                self.sink.submit(scope, batch);
                len
            }
            _ => 0,
        };
        self.buckets.remove_if(scope, |_, bucket| bucket.is_empty());
        flushed
    }

    /// Flush every non-empty scope if the mode has a timer.
    pub fn sweep(&self) -> usize {
        if !self.mode.flushes_on_timer() {
            return 0;
        }
        self.flush_scopes(FlushTrigger::Sweep)
    }

    /// Flush every non-empty scope regardless of mode.
    pub fn flush_all(&self) -> usize {
        self.flush_scopes(FlushTrigger::Manual)
    }

    fn flush_scopes(&self, trigger: FlushTrigger) -> usize {
        // Scopes appear while we iterate; work from a snapshot of the keys.
        self.active_scopes()
            .iter()
            .map(|scope| self.flush(scope, trigger))
            .sum()
    }

    /// Scopes with pending deltas.
    pub fn active_scopes(&self) -> Vec<K> {
        self.buckets
            .iter()
            .filter(|bucket| !bucket.is_empty())
            .map(|bucket| bucket.key().clone())
            .collect()
    }

    /// `(scopes, deltas)` currently pending.
    pub fn pending(&self) -> (usize, usize) {
        self.buckets
            .iter()
            .filter(|bucket| !bucket.is_empty())
            .fold((0, 0), |(scopes, deltas), bucket| {
                (scopes + 1, deltas + bucket.len())
            })
    }
}
