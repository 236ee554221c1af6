//! Cancellable delayed tasks keyed by position

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;

use crate::types::PositionId;

#[derive(Debug)]
struct Pending {
    ticket: u64,
    handle: AbortHandle,
}

/// One pending removal per position. Must be used inside a tokio runtime.
///
/// Every schedule hands out a ticket. A task that fires must redeem its
/// ticket with [`CloseTimers::complete`]; a stale ticket (the timer was
/// cancelled or replaced meanwhile) is refused.
#[derive(Debug, Default)]
pub struct CloseTimers {
    pending: DashMap<PositionId, Pending>,
    next_ticket: AtomicU64,
}

impl CloseTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the task built by `make_task` after `delay`.
    /// Replaces (and aborts) any timer already held for `id`.
    pub fn schedule<F, Fut>(&self, id: PositionId, delay: Duration, make_task: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let task = make_task(ticket);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        let pending = Pending {
            ticket,
            handle: handle.abort_handle(),
        };
        if let Some(previous) = self.pending.insert(id, pending) {
            previous.handle.abort();
        }
        ticket
    }

    /// Redeem a fired timer's ticket; false if it is no longer current
    pub fn complete(&self, id: &PositionId, ticket: u64) -> bool {
        self.pending
            .remove_if(id, |_, pending| pending.ticket == ticket)
            .is_some()
    }

    /// Abort a pending timer; false if none was pending
    pub fn cancel(&self, id: &PositionId) -> bool {
        match self.pending.remove(id) {
            Some((_, pending)) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let ids: Vec<PositionId> = self.pending.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    pub fn is_pending(&self, id: &PositionId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
