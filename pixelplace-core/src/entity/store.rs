use crate::error::Result;
use crate::eventlog::{EventEnvelope, EventLog};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// State that can be rebuilt by replaying one stream.
pub trait Entity: Send + 'static {
    type Key: Clone + Eq + Hash + Send + Sync + std::fmt::Display;

    /// State before any event.
    fn empty(key: &Self::Key) -> Self;

    fn stream_id(key: &Self::Key) -> String;

    /// Fold one stored event into the state.
    fn apply(&mut self, envelope: &EventEnvelope) -> Result<()>;

    /// Sequence of the last applied event, 0 when none.
    fn version(&self) -> u64;
}

/// Keyed, versioned record store over an append-only log.
///
/// Records are hydrated lazily by replaying their stream the first time a
/// key is touched, then kept current by applying each appended envelope.
/// The per-record mutex is the single-writer discipline for that key.
pub struct EntityStore<E: Entity> {
    log: Arc<dyn EventLog>,
    records: DashMap<E::Key, Arc<Mutex<E>>>,
}

impl<E: Entity> EntityStore<E> {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self {
            log,
            records: DashMap::new(),
        }
    }

    /// Handle to the record for `key`, replaying its stream on first use.
    pub fn handle(&self, key: &E::Key) -> Result<Arc<Mutex<E>>> {
        if let Some(existing) = self.records.get(key) {
            return Ok(existing.clone());
        }

        let entity = self.replay(key)?;
        let handle = self
            .records
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(entity)))
            .clone();
        Ok(handle)
    }

    /// Rebuild a record from its stream without caching it.
    pub fn replay(&self, key: &E::Key) -> Result<E> {
        let mut entity = E::empty(key);
        let envelopes = self.log.read(&E::stream_id(key))?;
        for envelope in &envelopes {
            entity.apply(envelope)?;
        }
        if !envelopes.is_empty() {
            debug!(key = %key, events = envelopes.len(), "Hydrated entity");
        }
        Ok(entity)
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    /// Number of hydrated records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
