use super::{EventEnvelope, EventLog, StreamIndex};
use crate::error::Result;
use parking_lot::RwLock;
use pixelplace_types::CanvasEvent;
use std::collections::BTreeSet;

/// Process-local event log, used by tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    index: RwLock<StreamIndex>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for MemoryEventLog {
    fn append(
        &self,
        stream_id: &str,
        expected_sequence: u64,
        event: CanvasEvent,
    ) -> Result<EventEnvelope> {
        let mut index = self.index.write();
        let envelope = index.prepare(stream_id, expected_sequence, event)?;
        index.insert(envelope.clone());
        Ok(envelope)
    }

    fn read(&self, stream_id: &str) -> Result<Vec<EventEnvelope>> {
        Ok(self.index.read().read(stream_id))
    }

    fn list_stream_ids(&self, prefix: &str) -> Result<BTreeSet<String>> {
        Ok(self.index.read().list(prefix))
    }

    fn last_position(&self) -> u64 {
        self.index.read().position()
    }
}
