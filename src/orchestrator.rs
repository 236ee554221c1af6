//! Fans one trade configuration out across every wallet and selected venue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::ids::IdSource;
use crate::types::{
    details_map, entry_price_for, max_leverage_for, ActionKind, ActivityLog, Position,
    PositionStatus, TradeConfig, Wallet,
};
use crate::wallets::shorten_address;

/// Displayed gas estimate per leg, in ETH
pub const GAS_ESTIMATE_ETH: f64 = 0.002;

/// Positions and their `open` logs, both in wallet-major order
#[derive(Debug, Clone, Default)]
pub struct OperationBatch {
    pub positions: Vec<Position>,
    pub logs: Vec<ActivityLog>,
}

impl OperationBatch {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn open_details(config: &TradeConfig) -> Map<String, Value> {
    details_map(json!({
        "leverage": config.leverage,
        "size": config.amount,
        "side": config.side,
    }))
}

/// Build one position and one `open` log per (wallet, venue) pair
pub fn plan_operation(
    config: &TradeConfig,
    wallets: &[Wallet],
    ids: &dyn IdSource,
    now: DateTime<Utc>,
) -> OperationBatch {
    let venues = config.selected_venues();
    let mut batch = OperationBatch {
        positions: Vec::with_capacity(wallets.len() * venues.len()),
        logs: Vec::with_capacity(wallets.len() * venues.len()),
    };

    for wallet in wallets {
        let wallet_address = shorten_address(&wallet.address);
        for venue in &venues {
            let position = Position {
                id: ids.position_id(),
                wallet_id: wallet.id.clone(),
                wallet_address: wallet_address.clone(),
                venue: venue.clone(),
                pair: config.pair.clone(),
                side: config.side,
                leverage: config.leverage,
                size_usdc: config.amount,
                entry_price: entry_price_for(&config.pair),
                take_profit_percent: config.take_profit_percent,
                stop_loss_percent: config.stop_loss_percent,
                unrealized_pnl: 0.0,
                status: PositionStatus::Open,
                tx_hash: ids.tx_hash(),
                opened_at: now,
                closed_at: None,
            };

            let log = ActivityLog {
                id: ids.log_id(),
                action: ActionKind::Open,
                wallet_address: wallet_address.clone(),
                venue: venue.clone(),
                pair: config.pair.clone(),
                details: open_details(config),
                tx_hash: position.tx_hash.clone(),
                timestamp: now,
            };

            batch.positions.push(position);
            batch.logs.push(log);
        }
    }

    batch
}

/// Display-only findings; they never block submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigWarning {
    LeverageAboveVenueMax { max: u32, requested: u32 },
    NoVenueSelected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewLeg {
    pub wallet: String,
    pub venue: String,
    pub gas_estimate_eth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationPreview {
    pub config: TradeConfig,
    pub venues: Vec<String>,
    pub estimated_transactions: usize,
    pub legs: Vec<PreviewLeg>,
    pub margin_per_wallet: f64,
    pub total_margin: f64,
    pub max_leverage: u32,
    pub warnings: Vec<ConfigWarning>,
}

pub fn warnings_for(config: &TradeConfig) -> Vec<ConfigWarning> {
    let venues = config.selected_venues();
    let mut warnings = Vec::new();
    if venues.is_empty() {
        warnings.push(ConfigWarning::NoVenueSelected);
    }
    let max = max_leverage_for(&venues);
    if config.leverage > max {
        warnings.push(ConfigWarning::LeverageAboveVenueMax {
            max,
            requested: config.leverage,
        });
    }
    warnings
}

pub fn preview(config: &TradeConfig, wallets: &[Wallet]) -> OperationPreview {
    let venues = config.selected_venues();

    let legs: Vec<PreviewLeg> = wallets
        .iter()
        .flat_map(|wallet| {
            let short: String = wallet.address.chars().take(10).collect();
            venues.iter().map(move |venue| PreviewLeg {
                wallet: format!("{short}..."),
                venue: venue.clone(),
                gas_estimate_eth: GAS_ESTIMATE_ETH,
            })
        })
        .collect();

    let margin_per_wallet = config.amount * venues.len() as f64;

    OperationPreview {
        estimated_transactions: legs.len(),
        legs,
        margin_per_wallet,
        total_margin: margin_per_wallet * wallets.len() as f64,
        max_leverage: max_leverage_for(&venues),
        warnings: warnings_for(config),
        venues,
        config: config.clone(),
    }
}
