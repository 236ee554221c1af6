use chrono::Utc;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::activity::{self, ActivityFeed, ActivityView};
use crate::config::FarmConfig;
use crate::error::{FarmError, FarmResult};
use crate::ids::IdSource;
use crate::orchestrator::{self, OperationBatch, OperationPreview};
use crate::positions::{self, PositionFilter, PositionsView};
use crate::seed;
use crate::timer::CloseTimers;
use crate::types::{
    ActivityLog, FarmEvent, Position, PositionId, ProgramStats, TradeConfig, Wallet, WalletId,
};
use crate::wallets::{self, Chain, WalletView, WalletsOverview};

/// Everything the farm knows, owned in one place and shared behind `Arc`.
///
/// Lock order is always positions, then activity.
pub struct FarmState {
    pub(crate) config: FarmConfig,
    wallets: Vec<Wallet>,
    /// Ephemeral display tags (wallet_id -> tag)
    wallet_tags: DashMap<WalletId, String>,
    stats: ProgramStats,
    pub(crate) positions: RwLock<IndexMap<PositionId, Position>>,
    pub(crate) activity: RwLock<ActivityFeed>,
    /// Operation waiting for confirmation
    staged: RwLock<Option<TradeConfig>>,
    pub(crate) timers: CloseTimers,
    pub(crate) ids: Arc<dyn IdSource>,
    /// Event stream for subscribers
    pub broadcast_tx: broadcast::Sender<FarmEvent>,
}

impl FarmState {
    /// State loaded with the seed wallets, positions and activity
    pub fn new(config: FarmConfig, ids: Arc<dyn IdSource>) -> Self {
        let now = Utc::now();
        Self::with_data(
            config,
            ids,
            seed::wallets(),
            seed::positions(now),
            seed::activity(now),
        )
    }

    /// `activity` is expected newest first
    pub fn with_data(
        config: FarmConfig,
        ids: Arc<dyn IdSource>,
        wallets: Vec<Wallet>,
        positions: Vec<Position>,
        activity: Vec<ActivityLog>,
    ) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.event_capacity);
        let positions = positions.into_iter().map(|p| (p.id.clone(), p)).collect();

        Self {
            config,
            wallets,
            wallet_tags: DashMap::new(),
            stats: seed::program_stats(),
            positions: RwLock::new(positions),
            activity: RwLock::new(ActivityFeed::from_entries(activity)),
            staged: RwLock::new(None),
            timers: CloseTimers::new(),
            ids,
            broadcast_tx,
        }
    }

    pub fn config(&self) -> &FarmConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FarmEvent> {
        self.broadcast_tx.subscribe()
    }

    pub(crate) fn publish(&self, event: FarmEvent) {
        let _ = self.broadcast_tx.send(event);
    }

    pub(crate) fn positions_read(
        &self,
    ) -> FarmResult<RwLockReadGuard<'_, IndexMap<PositionId, Position>>> {
        self.positions
            .read()
            .map_err(|_| FarmError::Internal("Lock error".to_string()))
    }

    pub(crate) fn positions_write(
        &self,
    ) -> FarmResult<RwLockWriteGuard<'_, IndexMap<PositionId, Position>>> {
        self.positions
            .write()
            .map_err(|_| FarmError::Internal("Lock error".to_string()))
    }

    pub(crate) fn activity_read(&self) -> FarmResult<RwLockReadGuard<'_, ActivityFeed>> {
        self.activity
            .read()
            .map_err(|_| FarmError::Internal("Lock error".to_string()))
    }

    pub(crate) fn activity_write(&self) -> FarmResult<RwLockWriteGuard<'_, ActivityFeed>> {
        self.activity
            .write()
            .map_err(|_| FarmError::Internal("Lock error".to_string()))
    }

    // ---- wallets & stats ----

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn stats(&self) -> ProgramStats {
        self.stats
    }

    pub fn wallet_tag(&self, wallet_id: &WalletId) -> Option<String> {
        self.wallet_tags.get(wallet_id).map(|t| t.value().clone())
    }

    /// Set a display tag; blank tags reset to the default
    pub fn set_wallet_tag(&self, wallet_id: &WalletId, tag: &str) -> FarmResult<String> {
        if !self.wallets.iter().any(|w| &w.id == wallet_id) {
            return Err(FarmError::WalletNotFound(wallet_id.to_string()));
        }
        let tag = wallets::normalize_tag(tag);
        self.wallet_tags.insert(wallet_id.clone(), tag.clone());
        Ok(tag)
    }

    pub fn wallets_overview(&self, chain: Chain) -> WalletsOverview {
        WalletsOverview {
            wallets: self
                .wallets
                .iter()
                .map(|w| WalletView::new(w, self.wallet_tag(&w.id), chain))
                .collect(),
            total_balance: wallets::total_balance(&self.wallets),
        }
    }

    // ---- positions & activity ----

    pub fn positions(&self) -> FarmResult<Vec<Position>> {
        Ok(self.positions_read()?.values().cloned().collect())
    }

    pub fn position(&self, id: &PositionId) -> FarmResult<Position> {
        self.positions_read()?
            .get(id)
            .cloned()
            .ok_or_else(|| FarmError::PositionNotFound(id.to_string()))
    }

    pub fn positions_view(&self, filter: &PositionFilter) -> FarmResult<PositionsView> {
        let all = self.positions()?;
        Ok(positions::view(&all, filter))
    }

    /// Newest first
    pub fn activity(&self) -> FarmResult<Vec<ActivityLog>> {
        Ok(self.activity_read()?.snapshot())
    }

    /// Newest first, with display label, age and tx link
    pub fn activity_view(&self) -> FarmResult<Vec<ActivityView>> {
        let now = Utc::now();
        Ok(self
            .activity()?
            .into_iter()
            .map(|log| ActivityView::new(log, now))
            .collect())
    }

    /// `(filename, csv)` for the whole feed
    pub fn export_activity(&self) -> FarmResult<(String, String)> {
        let csv = {
            let feed = self.activity_read()?;
            activity::export_csv(feed.iter())?
        };
        Ok((activity::export_filename(Utc::now()), csv))
    }

    // ---- operations ----

    pub fn preview(&self, config: &TradeConfig) -> OperationPreview {
        orchestrator::preview(config, &self.wallets)
    }

    /// Hold `config` until confirmed; replaces anything staged before
    pub fn stage_operation(&self, config: TradeConfig) -> FarmResult<OperationPreview> {
        let preview = self.preview(&config);
        let mut staged = self
            .staged
            .write()
            .map_err(|_| FarmError::Internal("Lock error".to_string()))?;
        *staged = Some(config);
        info!(
            "Operation staged: {} transaction(s) across {:?}",
            preview.estimated_transactions, preview.venues
        );
        Ok(preview)
    }

    pub fn staged_operation(&self) -> FarmResult<Option<TradeConfig>> {
        Ok(self
            .staged
            .read()
            .map_err(|_| FarmError::Internal("Lock error".to_string()))?
            .clone())
    }

    /// Discard the staged operation; false if nothing was staged
    pub fn cancel_operation(&self) -> FarmResult<bool> {
        let mut staged = self
            .staged
            .write()
            .map_err(|_| FarmError::Internal("Lock error".to_string()))?;
        Ok(staged.take().is_some())
    }

    pub fn confirm_operation(&self) -> FarmResult<OperationBatch> {
        let config = {
            let mut staged = self
                .staged
                .write()
                .map_err(|_| FarmError::Internal("Lock error".to_string()))?;
            staged.take().ok_or(FarmError::NoPendingOperation)?
        };
        self.submit_operation(&config)
    }

    /// Open one position per wallet x venue and log each one.
    ///
    /// All-or-nothing: if any generated id is already taken, nothing is applied.
    pub fn submit_operation(&self, config: &TradeConfig) -> FarmResult<OperationBatch> {
        for warning in orchestrator::warnings_for(config) {
            warn!("Submitting despite warning: {:?}", warning);
        }

        let batch = orchestrator::plan_operation(config, &self.wallets, self.ids.as_ref(), Utc::now());

        {
            let mut positions = self.positions_write()?;
            let mut feed = self.activity_write()?;

            let mut fresh_positions = HashSet::new();
            for p in &batch.positions {
                if positions.contains_key(&p.id) || !fresh_positions.insert(&p.id) {
                    return Err(FarmError::DuplicateId(p.id.to_string()));
                }
            }
            let mut fresh_logs = HashSet::new();
            for log in &batch.logs {
                if feed.contains_id(&log.id) || !fresh_logs.insert(&log.id) {
                    return Err(FarmError::DuplicateId(log.id.to_string()));
                }
            }

            for p in &batch.positions {
                positions.insert(p.id.clone(), p.clone());
            }
            feed.prepend_batch(batch.logs.clone());
        }

        info!(
            "⚔️ Operation executed: {} position(s) on {} {} {}x",
            batch.len(),
            config.pair,
            config.side,
            config.leverage
        );

        for p in &batch.positions {
            self.publish(FarmEvent::PositionOpened(p.clone()));
        }
        for log in &batch.logs {
            self.publish(FarmEvent::Activity(log.clone()));
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::types::{ActionKind, PositionStatus};

    fn test_state() -> FarmState {
        FarmState::new(FarmConfig::default(), Arc::new(SequentialIds::starting_at(100)))
    }

    fn venues(names: &[&str]) -> TradeConfig {
        TradeConfig {
            venues: names.iter().map(|v| v.to_string()).collect(),
            ..TradeConfig::default()
        }
    }

    #[test]
    fn test_seeded_state() {
        let state = test_state();
        assert_eq!(state.wallets().len(), 5);
        assert_eq!(state.positions().unwrap().len(), 2);
        assert_eq!(state.activity().unwrap().len(), 2);
        assert_eq!(state.stats().total_supply, 1111);
    }

    #[test]
    fn test_submit_fans_out_across_wallets() {
        let state = test_state();
        let batch = state.submit_operation(&venues(&["Hyperliquid", "Pacifica"])).unwrap();

        assert_eq!(batch.len(), 10);
        let positions = state.positions().unwrap();
        assert_eq!(positions.len(), 12);
        // appended after the seed positions
        assert_eq!(positions[0].id, PositionId::new("pos-1"));
        assert_eq!(positions[2].id, batch.positions[0].id);
        assert!(positions[2..].iter().all(|p| p.status == PositionStatus::Open));

        let feed = state.activity().unwrap();
        assert_eq!(feed.len(), 12);
        let opens = feed.iter().filter(|l| l.action == ActionKind::Open).count();
        assert_eq!(opens, 12);
        // new block first, block order kept, seed entries after
        assert_eq!(feed[0].id, batch.logs[0].id);
        assert_eq!(feed[9].id, batch.logs[9].id);
        assert_eq!(feed[10].id.0, "log-1");
    }

    #[test]
    fn test_single_wallet_two_venues_btc() {
        let wallet = seed::wallets().remove(0);
        let state = FarmState::with_data(
            FarmConfig::default(),
            Arc::new(SequentialIds::new()),
            vec![wallet],
            Vec::new(),
            Vec::new(),
        );
        let config = TradeConfig {
            venues: vec!["A".into(), "B".into()],
            pair: "BTC/USDC".into(),
            amount: 1000.0,
            ..TradeConfig::default()
        };
        state.submit_operation(&config).unwrap();

        let positions = state.positions().unwrap();
        assert_eq!(positions.len(), 2);
        assert!(positions.iter().all(|p| p.entry_price == 49_500.0));
        assert!(positions.iter().all(|p| p.size_usdc == 1000.0));
    }

    #[test]
    fn test_duplicate_ids_rejected_atomically() {
        // counter starts at 1, so the first generated id collides with seed "pos-1"
        let state = FarmState::new(FarmConfig::default(), Arc::new(SequentialIds::new()));
        let err = state.submit_operation(&venues(&["Based"])).unwrap_err();

        assert!(matches!(err, FarmError::DuplicateId(ref id) if id == "pos-1"));
        assert_eq!(state.positions().unwrap().len(), 2);
        assert_eq!(state.activity().unwrap().len(), 2);
    }

    #[test]
    fn test_stage_confirm_cancel() {
        let state = test_state();
        assert!(matches!(
            state.confirm_operation(),
            Err(FarmError::NoPendingOperation)
        ));

        let preview = state.stage_operation(venues(&["Lighter"])).unwrap();
        assert_eq!(preview.estimated_transactions, 5);
        assert!(state.staged_operation().unwrap().is_some());
        assert!(state.cancel_operation().unwrap());
        assert!(!state.cancel_operation().unwrap());

        state.stage_operation(venues(&["Lighter", "Based"])).unwrap();
        let batch = state.confirm_operation().unwrap();
        assert_eq!(batch.len(), 10);
        assert!(state.staged_operation().unwrap().is_none());
    }

    #[test]
    fn test_empty_venue_set_is_noop() {
        let state = test_state();
        let batch = state.submit_operation(&venues(&[])).unwrap();
        assert!(batch.is_empty());
        assert_eq!(state.positions().unwrap().len(), 2);
    }

    #[test]
    fn test_wallet_tags() {
        let state = test_state();
        let id = WalletId::new("3");
        assert_eq!(state.set_wallet_tag(&id, " farmer ").unwrap(), "farmer");
        assert_eq!(state.wallet_tag(&id).as_deref(), Some("farmer"));
        assert_eq!(state.set_wallet_tag(&id, "").unwrap(), "TAG");
        assert!(matches!(
            state.set_wallet_tag(&WalletId::new("9"), "x"),
            Err(FarmError::WalletNotFound(_))
        ));

        let overview = state.wallets_overview(Chain::Arb);
        assert_eq!(overview.wallets[2].tag, "TAG");
        assert_eq!(overview.wallets[0].tag, "TAG");
        assert!(overview.wallets[0].debank_url.ends_with("?chain=arb"));
    }

    #[test]
    fn test_export_activity() {
        let state = test_state();
        let (filename, csv) = state.export_activity().unwrap();
        assert!(filename.starts_with("vikings-farm-activity-"));
        assert!(filename.ends_with(".csv"));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_submit_publishes_events() {
        let state = test_state();
        let mut rx = state.subscribe();
        state.submit_operation(&venues(&["Based"])).unwrap();

        let mut opened = 0;
        let mut logged = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                FarmEvent::PositionOpened(_) => opened += 1,
                FarmEvent::Activity(_) => logged += 1,
                _ => {}
            }
        }
        assert_eq!((opened, logged), (5, 5));
    }
}
