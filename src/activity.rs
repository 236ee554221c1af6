//! Activity feed: newest-first, append-only event history and its CSV export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{FarmError, FarmResult};
use crate::types::{ActivityLog, LogId};
use crate::wallets::etherscan_tx_url;

pub const CSV_HEADER: [&str; 7] = ["Timestamp", "Action", "Wallet", "DEX", "Pair", "Details", "Tx Hash"];

/// Entries are kept newest first. Nothing is ever removed.
#[derive(Debug, Default, Clone)]
pub struct ActivityFeed {
    entries: VecDeque<ActivityLog>,
}

impl ActivityFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes entries already ordered newest first
    pub fn from_entries(entries: Vec<ActivityLog>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn prepend(&mut self, entry: ActivityLog) {
        self.entries.push_front(entry);
    }

    /// Put a batch ahead of existing entries, keeping the batch's own order
    pub fn prepend_batch(&mut self, batch: Vec<ActivityLog>) {
        for entry in batch.into_iter().rev() {
            self.entries.push_front(entry);
        }
    }

    pub fn contains_id(&self, id: &LogId) -> bool {
        self.entries.iter().any(|e| &e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityLog> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<ActivityLog> {
        self.entries.iter().cloned().collect()
    }
}

/// Render entries as CSV, one row per entry in the given order
pub fn export_csv<'a, I>(entries: I) -> FarmResult<String>
where
    I: IntoIterator<Item = &'a ActivityLog>,
{
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(CSV_HEADER)
        .map_err(|e| FarmError::Export(e.to_string()))?;

    for entry in entries {
        let details = serde_json::to_string(&entry.details)
            .map_err(|e| FarmError::Export(e.to_string()))?;
        let timestamp = iso_timestamp(&entry.timestamp);
        wtr.write_record([
            timestamp.as_str(),
            entry.action.as_str(),
            entry.wallet_address.as_str(),
            entry.venue.as_str(),
            entry.pair.as_str(),
            details.as_str(),
            entry.tx_hash.as_str(),
        ])
        .map_err(|e| FarmError::Export(e.to_string()))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| FarmError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| FarmError::Export(e.to_string()))
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("vikings-farm-activity-{}.csv", now.timestamp_millis())
}

/// `2024-05-01T12:00:00.000Z`
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Short age of an entry for feed display
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - ts).num_minutes();
    let hours = minutes / 60;

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        ts.format("%Y-%m-%d").to_string()
    }
}

/// Feed entry as listed by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub log: ActivityLog,
    pub label: String,
    pub age: String,
    pub explorer_url: String,
}

impl ActivityView {
    pub fn new(log: ActivityLog, now: DateTime<Utc>) -> Self {
        Self {
            label: log.action.label().to_string(),
            age: relative_time(log.timestamp, now),
            explorer_url: etherscan_tx_url(&log.tx_hash),
            log,
        }
    }
}
