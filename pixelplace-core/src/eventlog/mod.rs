//! Append-only, per-stream ordered event storage.
//!
//! Streams are identified by string ids: a canvas stream is the canvas id, a
//! pixel stream is `{canvasId}_{x}_{y}`. Each stream is strictly ordered by
//! `sequence`; `position` orders events across the whole log.

mod file;
mod memory;

pub use file::FileEventLog;
pub use memory::MemoryEventLog;

use crate::error::{CanvasError, Result};
use chrono::{DateTime, Utc};
use pixelplace_types::CanvasEvent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A stored event with its log coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub stream_id: String,
    /// 1-based index within the stream.
    pub sequence: u64,
    /// 1-based index within the whole log.
    pub position: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: CanvasEvent,
}

/// Durable event log collaborator.
pub trait EventLog: Send + Sync {
    /// Append `event` to `stream_id`.
    ///
    /// `expected_sequence` is the last sequence the writer observed on the
    /// stream (0 for a new stream). A mismatch means another writer got there
    /// first and nothing is appended.
    fn append(
        &self,
        stream_id: &str,
        expected_sequence: u64,
        event: CanvasEvent,
    ) -> Result<EventEnvelope>;

    /// Every event of a stream in sequence order. Unknown streams are empty.
    fn read(&self, stream_id: &str) -> Result<Vec<EventEnvelope>>;

    /// Ids of every stream starting with `prefix`.
    fn list_stream_ids(&self, prefix: &str) -> Result<BTreeSet<String>>;

    /// Position of the most recent event, 0 when empty.
    fn last_position(&self) -> u64;
}

/// Ordered in-memory index shared by the log implementations.
#[derive(Debug, Default)]
pub(crate) struct StreamIndex {
    streams: BTreeMap<String, Vec<EventEnvelope>>,
    position: u64,
}

impl StreamIndex {
    /// Build the envelope the next append would store, without storing it.
    pub(crate) fn prepare(
        &self,
        stream_id: &str,
        expected_sequence: u64,
        event: CanvasEvent,
    ) -> Result<EventEnvelope> {
        let current = self.streams.get(stream_id).map_or(0, |s| s.len() as u64);
        if current != expected_sequence {
            return Err(CanvasError::Persistence(format!(
                "concurrent append to stream {stream_id}: expected sequence {expected_sequence}, found {current}"
            )));
        }
        Ok(EventEnvelope {
            stream_id: stream_id.to_string(),
            sequence: current + 1,
            position: self.position + 1,
            recorded_at: Utc::now(),
            event,
        })
    }

    pub(crate) fn insert(&mut self, envelope: EventEnvelope) {
        self.position = self.position.max(envelope.position);
        self.streams
            .entry(envelope.stream_id.clone())
            .or_default()
            .push(envelope);
    }

    pub(crate) fn read(&self, stream_id: &str) -> Vec<EventEnvelope> {
        self.streams.get(stream_id).cloned().unwrap_or_default()
    }

    pub(crate) fn list(&self, prefix: &str) -> BTreeSet<String> {
        self.streams
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }
}
