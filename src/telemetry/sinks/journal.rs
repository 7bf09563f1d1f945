//! Durable sled-backed telemetry journal.
//!
//! Events are appended under monotonically increasing, zero-padded sequence
//! keys so a plain scan returns them in record order.

use std::path::Path;

use sled::{Db, Tree};
use tracing::warn;

use crate::error::StorageError;
use crate::telemetry::events::TelemetryEvent;
use crate::telemetry::sink::TelemetrySink;

const TREE_EVENTS: &str = "telemetry_events";
const EVENT_KEY_PAD: usize = 20;

#[derive(Clone)]
pub struct TelemetryJournal {
    db: Db,
    events: Tree,
}

impl TelemetryJournal {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(path)?;
        Self::new(db)
    }

    pub fn new(db: Db) -> Result<Self, StorageError> {
        let events = db.open_tree(TREE_EVENTS)?;
        Ok(Self { db, events })
    }

    /// Append one event; returns its sequence number.
    pub fn append(&self, event: &TelemetryEvent) -> Result<u64, StorageError> {
        let seq = self.db.generate_id()?;
        let value = serde_json::to_vec(event).map_err(to_storage_data)?;
        self.events.insert(encode_key(seq).as_bytes(), value)?;
        Ok(seq)
    }

    pub fn read_all(&self) -> Result<Vec<TelemetryEvent>, StorageError> {
        let mut out = Vec::new();
        for result in self.events.iter() {
            let (_, value) = result?;
            out.push(serde_json::from_slice(&value).map_err(to_storage_data)?);
        }
        Ok(out)
    }

    /// The `limit` most recent events, oldest first.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<TelemetryEvent>, StorageError> {
        let mut out = Vec::with_capacity(limit);
        for result in self.events.iter().rev().take(limit) {
            let (_, value) = result?;
            out.push(serde_json::from_slice(&value).map_err(to_storage_data)?);
        }
        out.reverse();
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop the oldest events so at most `max_events` remain.
    pub fn prune(&self, max_events: usize) -> Result<usize, StorageError> {
        let excess = self.events.len().saturating_sub(max_events);
        let keys: Vec<Vec<u8>> = self
            .events
            .iter()
            .keys()
            .take(excess)
            .filter_map(|k| k.ok().map(|k| k.to_vec()))
            .collect();
        for key in &keys {
            self.events.remove(key)?;
        }
        Ok(keys.len())
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

impl TelemetrySink for TelemetryJournal {
    fn record(&self, event: TelemetryEvent) {
        if let Err(err) = self.append(&event) {
            warn!(
                outcome = event.outcome.as_str(),
                error = %err,
                "failed to append telemetry event to journal"
            );
        }
    }
}

fn encode_key(seq: u64) -> String {
    format!("{seq:0EVENT_KEY_PAD$}")
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::CorruptRecord(err.to_string())
}
