//! Position lifecycle: Open -> Closing -> removed
//!
//! `close_position` flips a position to `Closing`, writes the `close` log and
//! schedules removal after the configured delay. `cancel_close` rolls a
//! pending close back to `Open`. `emergency_close` skips the delay and
//! removes everything at once.

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::activity::ActivityFeed;
use crate::error::{FarmError, FarmResult};
use crate::state::FarmState;
use crate::types::{
    details_map, ActionKind, ActivityLog, FarmEvent, LogId, Position, PositionId, PositionStatus,
};

pub const EMERGENCY_REASON: &str = "Emergency closure initiated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyReport {
    /// Every position that was removed, open or closing
    pub removed: Vec<Position>,
    /// One `emergency` entry per position that was open, newest first
    pub logs: Vec<ActivityLog>,
    pub timers_cancelled: usize,
}

/// Reject ids already in the feed or repeated within the batch
fn ensure_fresh_ids<'a>(
    feed: &ActivityFeed,
    logs: impl IntoIterator<Item = &'a ActivityLog>,
) -> FarmResult<()> {
    let mut fresh: HashSet<&LogId> = HashSet::new();
    for log in logs {
        if feed.contains_id(&log.id) || !fresh.insert(&log.id) {
            warn!("Log id {} already taken", log.id);
            return Err(FarmError::DuplicateId(log.id.to_string()));
        }
    }
    Ok(())
}

impl FarmState {
    fn lifecycle_log(
        &self,
        position: &Position,
        action: ActionKind,
        details: Map<String, Value>,
    ) -> ActivityLog {
        ActivityLog {
            id: self.ids.log_id(),
            action,
            wallet_address: position.wallet_address.clone(),
            venue: position.venue.clone(),
            pair: position.pair.clone(),
            details,
            tx_hash: self.ids.tx_hash(),
            timestamp: Utc::now(),
        }
    }

    /// Build the `close` log for an open position without touching state.
    ///
    /// The pnl recorded is the value before the transition.
    fn prepare_close(
        &self,
        positions: &IndexMap<PositionId, Position>,
        id: &PositionId,
    ) -> FarmResult<ActivityLog> {
        let position = positions
            .get(id)
            .ok_or_else(|| FarmError::PositionNotFound(id.to_string()))?;
        if position.status != PositionStatus::Open {
            return Err(FarmError::PositionNotOpen(id.to_string()));
        }

        Ok(self.lifecycle_log(
            position,
            ActionKind::Close,
            details_map(json!({ "side": position.side, "pnl": position.unrealized_pnl })),
        ))
    }

    /// Caller holds both locks and has checked the log id
    fn commit_close(
        self: &Arc<Self>,
        positions: &mut IndexMap<PositionId, Position>,
        feed: &mut ActivityFeed,
        id: &PositionId,
        log: &ActivityLog,
    ) {
        if let Some(position) = positions.get_mut(id) {
            position.status = PositionStatus::Closing;
        }
        feed.prepend(log.clone());

        // before the timer exists, so removal can never be seen first
        self.publish(FarmEvent::PositionClosing {
            position_id: id.clone(),
        });
        self.publish(FarmEvent::Activity(log.clone()));

        let state = Arc::clone(self);
        let key = id.clone();
        self.timers
            .schedule(id.clone(), self.config.close_delay, move |ticket| async move {
                state.finish_close(&key, ticket);
            });
    }

    /// Mark a position `Closing` and schedule its removal.
    ///
    /// Returns the `close` log, whose pnl is the value at call time.
    /// Needs a tokio runtime for the removal timer.
    pub fn close_position(self: &Arc<Self>, id: &PositionId) -> FarmResult<ActivityLog> {
        let log = {
            let mut positions = self.positions_write()?;
            let mut feed = self.activity_write()?;
            let log = self.prepare_close(&positions, id)?;
            ensure_fresh_ids(&feed, [&log])?;
            self.commit_close(&mut positions, &mut feed, id, &log);
            log
        };

        info!(
            "Closing position {} ({} {}), removal in {:?}",
            id, log.venue, log.pair, self.config.close_delay
        );

        Ok(log)
    }

    /// Close every position that is `Open` right now, each on its own timer.
    ///
    /// All-or-nothing: a taken log id leaves every position untouched.
    pub fn close_all(self: &Arc<Self>) -> FarmResult<Vec<ActivityLog>> {
        let logs = {
            let mut positions = self.positions_write()?;
            let mut feed = self.activity_write()?;

            let open: Vec<PositionId> = positions
                .values()
                .filter(|p| p.is_open())
                .map(|p| p.id.clone())
                .collect();

            let mut planned = Vec::with_capacity(open.len());
            for id in open {
                let log = self.prepare_close(&positions, &id)?;
                planned.push((id, log));
            }
            ensure_fresh_ids(&feed, planned.iter().map(|(_, log)| log))?;

            for (id, log) in &planned {
                self.commit_close(&mut positions, &mut feed, id, log);
            }
            planned.into_iter().map(|(_, log)| log).collect::<Vec<_>>()
        };

        info!("Closing all open positions: {}", logs.len());

        Ok(logs)
    }

    /// Timer callback: drop the position if the ticket is still current
    fn finish_close(&self, id: &PositionId, ticket: u64) {
        let removed = {
            let mut positions = match self.positions_write() {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("Removal of {} skipped: {}", id, e);
                    return;
                }
            };
            if !self.timers.complete(id, ticket) {
                debug!("Stale close timer for {} ignored", id);
                return;
            }
            let closing = positions
                .get(id)
                .is_some_and(|p| p.status == PositionStatus::Closing);
            if closing {
                positions.shift_remove(id)
            } else {
                None
            }
        };

        if let Some(mut position) = removed {
            position.status = PositionStatus::Closed;
            position.closed_at = Some(Utc::now());
            debug!("Position {} removed", id);
            self.publish(FarmEvent::PositionRemoved(position));
        }
    }

    /// Abort a pending removal and put the position back to `Open`.
    ///
    /// The `close` log already written stays in the feed.
    pub fn cancel_close(&self, id: &PositionId) -> FarmResult<Position> {
        let position = {
            let mut positions = self.positions_write()?;
            let position = positions
                .get_mut(id)
                .filter(|p| p.status == PositionStatus::Closing)
                .ok_or_else(|| FarmError::NoPendingClose(id.to_string()))?;
            if !self.timers.cancel(id) {
                return Err(FarmError::NoPendingClose(id.to_string()));
            }
            position.status = PositionStatus::Open;
            position.clone()
        };

        info!("Close of position {} cancelled", id);
        self.publish(FarmEvent::CloseCancelled {
            position_id: id.clone(),
        });

        Ok(position)
    }

    /// Remove every position immediately.
    ///
    /// `confirmation` must equal the configured phrase exactly.
    pub fn emergency_close(&self, confirmation: &str) -> FarmResult<EmergencyReport> {
        if confirmation != self.config.emergency_phrase {
            warn!("🚨 Emergency close refused: confirmation text mismatch");
            return Err(FarmError::ConfirmationMismatch);
        }

        let report = {
            let mut positions = self.positions_write()?;
            let mut feed = self.activity_write()?;

            // position order, oldest first
            let planned: Vec<ActivityLog> = positions
                .values()
                .filter(|p| p.is_open())
                .map(|p| {
                    self.lifecycle_log(
                        p,
                        ActionKind::Emergency,
                        details_map(json!({ "side": p.side, "reason": EMERGENCY_REASON })),
                    )
                })
                .collect();
            ensure_fresh_ids(&feed, &planned)?;

            for log in &planned {
                feed.prepend(log.clone());
            }
            let mut logs = planned;
            logs.reverse();

            let timers_cancelled = self.timers.cancel_all();
            let removed: Vec<Position> = positions.drain(..).map(|(_, p)| p).collect();

            EmergencyReport {
                removed,
                logs,
                timers_cancelled,
            }
        };

        warn!(
            "🚨 EMERGENCY CLOSE: {} position(s) removed, {} pending close(s) cancelled",
            report.removed.len(),
            report.timers_cancelled
        );
        // oldest first so subscribers see the same order the feed was built in
        for log in report.logs.iter().rev() {
            self.publish(FarmEvent::Activity(log.clone()));
        }
        self.publish(FarmEvent::EmergencyClose {
            removed: report.removed.len(),
        });

        Ok(report)
    }

    /// Abort every pending removal
    pub fn shutdown(&self) -> usize {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            info!("Shutdown: {} pending close timer(s) aborted", cancelled);
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FarmConfig;
    use crate::ids::SequentialIds;
    use crate::types::TradeConfig;
    use std::time::Duration;

    fn state() -> Arc<FarmState> {
        Arc::new(FarmState::new(
            FarmConfig::default(),
            Arc::new(SequentialIds::starting_at(100)),
        ))
    }

    fn pos(id: &str) -> PositionId {
        PositionId::new(id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_one_transitions_then_removes() {
        let state = state();
        let log = state.close_position(&pos("pos-1")).unwrap();

        assert_eq!(log.action, ActionKind::Close);
        assert_eq!(log.details["pnl"], 125.50);
        assert_eq!(log.details["side"], "Long");
        assert_eq!(state.position(&pos("pos-1")).unwrap().status, PositionStatus::Closing);
        assert_eq!(state.activity().unwrap()[0].id, log.id);

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(state.position(&pos("pos-1")).is_ok());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(matches!(
            state.position(&pos("pos-1")),
            Err(FarmError::PositionNotFound(_))
        ));
        assert_eq!(state.positions().unwrap().len(), 1);
        assert!(state.timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_rejects_unknown_and_closing() {
        let state = state();
        assert!(matches!(
            state.close_position(&pos("pos-404")),
            Err(FarmError::PositionNotFound(_))
        ));

        state.close_position(&pos("pos-2")).unwrap();
        assert!(matches!(
            state.close_position(&pos("pos-2")),
            Err(FarmError::PositionNotOpen(_))
        ));
        // only one close log was written
        let closes = state
            .activity()
            .unwrap()
            .iter()
            .filter(|l| l.action == ActionKind::Close)
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all_only_touches_positions_open_at_call_time() {
        let state = state();
        state.close_position(&pos("pos-1")).unwrap();

        let logs = state.close_all().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].venue, "Pacifica");

        // added afterwards: untouched
        let batch = state
            .submit_operation(&TradeConfig {
                venues: vec!["Based".into()],
                ..TradeConfig::default()
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2100)).await;
        let remaining = state.positions().unwrap();
        assert_eq!(remaining.len(), batch.len());
        assert!(remaining.iter().all(|p| p.status == PositionStatus::Open));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_close_rolls_back() {
        let state = state();
        state.close_position(&pos("pos-1")).unwrap();

        let restored = state.cancel_close(&pos("pos-1")).unwrap();
        assert_eq!(restored.status, PositionStatus::Open);
        assert!(matches!(
            state.cancel_close(&pos("pos-1")),
            Err(FarmError::NoPendingClose(_))
        ));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(state.position(&pos("pos-1")).unwrap().status, PositionStatus::Open);
        // the close log stays
        assert_eq!(state.activity().unwrap()[0].action, ActionKind::Close);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reclose_after_cancel_uses_fresh_delay() {
        let state = state();
        state.close_position(&pos("pos-1")).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        state.cancel_close(&pos("pos-1")).unwrap();
        state.close_position(&pos("pos-1")).unwrap();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(state.position(&pos("pos-1")).is_ok());
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(state.position(&pos("pos-1")).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_close_requires_phrase() {
        let state = state();
        assert!(matches!(
            state.emergency_close("panic"),
            Err(FarmError::ConfirmationMismatch)
        ));
        assert_eq!(state.positions().unwrap().len(), 2);
        assert_eq!(state.activity().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_close_clears_everything() {
        let state = state();
        state
            .submit_operation(&TradeConfig {
                venues: vec!["Lighter".into()],
                ..TradeConfig::default()
            })
            .unwrap();
        // one position already closing
        state.close_position(&pos("pos-2")).unwrap();
        let before = state.activity().unwrap();

        let report = state.emergency_close("PANIC").unwrap();

        assert_eq!(report.removed.len(), 7);
        assert_eq!(report.logs.len(), 6);
        assert_eq!(report.timers_cancelled, 1);
        assert!(state.positions().unwrap().is_empty());
        assert!(state.timers.is_empty());

        let feed = state.activity().unwrap();
        assert_eq!(feed.len(), before.len() + 6);
        assert!(feed[..6].iter().all(|l| l.action == ActionKind::Emergency));
        assert_eq!(feed[0].details["reason"], EMERGENCY_REASON);
        // newest-first: last open position's log on top
        assert_eq!(feed[0].id, report.logs[0].id);
        assert_eq!(feed[5].venue, "Hyperliquid");
        // older entries keep their order
        let older: Vec<_> = feed[6..].iter().map(|l| l.id.clone()).collect();
        let expected: Vec<_> = before.iter().map(|l| l.id.clone()).collect();
        assert_eq!(older, expected);

        // the cancelled timer never fires into the emptied state
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(state.positions().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_event_carries_closed_position() {
        let state = state();
        let mut rx = state.subscribe();
        state.close_position(&pos("pos-2")).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;

        let mut removed = None;
        while let Ok(event) = rx.try_recv() {
            if let FarmEvent::PositionRemoved(p) = event {
                removed = Some(p);
            }
        }
        let removed = removed.unwrap();
        assert_eq!(removed.id, pos("pos-2"));
        assert_eq!(removed.status, PositionStatus::Closed);
        assert!(removed.closed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_timers() {
        let state = state();
        state.close_all().unwrap();
        assert_eq!(state.shutdown(), 2);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(state.positions().unwrap().len(), 2);
    }

    fn state_with_ids(ids: SequentialIds) -> Arc<FarmState> {
        Arc::new(FarmState::new(FarmConfig::default(), Arc::new(ids)))
    }

    fn feed_ids(state: &FarmState) -> Vec<String> {
        state
            .activity()
            .unwrap()
            .into_iter()
            .map(|l| l.id.to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_with_taken_log_id_changes_nothing() {
        // the first generated log id is the seeded `log-1`
        let state = state_with_ids(SequentialIds::new());

        assert!(matches!(
            state.close_position(&pos("pos-2")),
            Err(FarmError::DuplicateId(id)) if id == "log-1"
        ));
        assert_eq!(state.position(&pos("pos-2")).unwrap().status, PositionStatus::Open);
        assert_eq!(feed_ids(&state), vec!["log-1", "log-2"]);
        assert!(state.timers.is_empty());

        // the next id is free
        let log = state.close_position(&pos("pos-2")).unwrap();
        assert_eq!(log.id.to_string(), "log-3");
        assert_eq!(feed_ids(&state), vec!["log-3", "log-1", "log-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all_with_taken_log_id_closes_nothing() {
        // pos-1 gets log-0, pos-2 would get the seeded log-2
        let state = state_with_ids(SequentialIds::starting_at(0));

        assert!(matches!(
            state.close_all(),
            Err(FarmError::DuplicateId(id)) if id == "log-2"
        ));
        assert!(state.positions().unwrap().iter().all(|p| p.is_open()));
        assert_eq!(feed_ids(&state), vec!["log-1", "log-2"]);
        assert!(state.timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_with_taken_log_id_changes_nothing() {
        // pos-1 gets log-0, pos-2 would get the seeded log-2
        let state = state_with_ids(SequentialIds::starting_at(0));

        let mut rx = state.subscribe();
        assert!(matches!(
            state.emergency_close("PANIC"),
            Err(FarmError::DuplicateId(_))
        ));
        assert_eq!(state.positions().unwrap().len(), 2);
        assert_eq!(feed_ids(&state), vec!["log-1", "log-2"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_close_twice() {
        let state = state();
        let first = state.emergency_close("PANIC").unwrap();
        assert_eq!(first.removed.len(), 2);
        assert_eq!(first.logs.len(), 2);
        let feed = feed_ids(&state);

        let second = state.emergency_close("PANIC").unwrap();
        assert!(second.removed.is_empty());
        assert!(second.logs.is_empty());
        assert_eq!(second.timers_cancelled, 0);
        assert_eq!(feed_ids(&state), feed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_event_precedes_removal_with_zero_delay() {
        let config = FarmConfig {
            close_delay: Duration::ZERO,
            ..FarmConfig::default()
        };
        let state = Arc::new(FarmState::new(
            config,
            Arc::new(SequentialIds::starting_at(100)),
        ));
        let mut rx = state.subscribe();

        state.close_position(&pos("pos-1")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                FarmEvent::PositionClosing { .. } => "closing",
                FarmEvent::Activity(_) => "activity",
                FarmEvent::PositionRemoved(_) => "removed",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["closing", "activity", "removed"]);
        assert!(state.positions().unwrap().iter().all(|p| p.id != pos("pos-1")));
    }
}
