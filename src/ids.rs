//! Id and transaction-hash generation
//!
//! Nothing here is real: tx hashes are fabricated for display only.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::types::{LogId, PositionId};

pub trait IdSource: Send + Sync {
    fn position_id(&self) -> PositionId;
    fn log_id(&self) -> LogId;
    fn tx_hash(&self) -> String;
}

/// Random ids backed by uuid v4
#[derive(Debug, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn position_id(&self) -> PositionId {
        PositionId(format!("pos-{}", Uuid::new_v4()))
    }

    fn log_id(&self) -> LogId {
        LogId(format!("log-{}", Uuid::new_v4()))
    }

    fn tx_hash(&self) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("0x{}", &hex[..12])
    }
}

/// Deterministic ids from a shared counter
#[derive(Debug)]
pub struct SequentialIds {
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            counter: AtomicU64::new(first),
        }
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIds {
    fn position_id(&self) -> PositionId {
        PositionId(format!("pos-{}", self.next()))
    }

    fn log_id(&self) -> LogId {
        LogId(format!("log-{}", self.next()))
    }

    fn tx_hash(&self) -> String {
        format!("0x{:012x}", self.next())
    }
}
