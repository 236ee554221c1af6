//! Core types for the farming simulator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Venues an operation can fan out to
pub const AVAILABLE_VENUES: [&str; 7] = [
    "Hyperliquid",
    "Extended",
    "Pacifica",
    "AsterDEX",
    "Based",
    "Lighter",
    "Backpack",
];

/// Tradable pairs
pub const TRADING_PAIRS: [&str; 5] = ["BTC/USDC", "ETH/USDC", "SOL/USDC", "ARB/USDC", "OP/USDC"];

/// Simulated entry price for a pair
pub fn entry_price_for(pair: &str) -> f64 {
    if pair == "BTC/USDC" {
        49_500.0
    } else {
        2_850.0
    }
}

/// Highest leverage any of the selected venues allows
pub fn max_leverage_for<S: AsRef<str>>(venues: &[S]) -> u32 {
    if venues.iter().any(|v| v.as_ref() == "Hyperliquid") {
        50
    } else {
        20
    }
}

/// Wallet identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub String);

impl WalletId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Activity log identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub String);

impl LogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wallet connection status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WalletStatus {
    Connected,
    ReadOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub address: String,
    pub label: String,
    pub usdc_balance: f64,
    pub status: WalletStatus,
}

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "Long",
            Side::Short => "Short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PositionStatus {
    Open,
    /// Removal scheduled, waiting for the close delay
    Closing,
    /// Only ever seen on the removal event, never stored
    Closed,
}

/// A simulated leveraged position held by one wallet on one venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub wallet_id: WalletId,
    /// Shortened wallet address
    pub wallet_address: String,
    pub venue: String,
    pub pair: String,
    pub side: Side,
    pub leverage: u32,
    pub size_usdc: f64,
    pub entry_price: f64,
    pub take_profit_percent: f64,
    pub stop_loss_percent: f64,
    pub unrealized_pnl: f64,
    pub status: PositionStatus,
    pub tx_hash: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

/// Kind of event recorded in the activity log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Open,
    Close,
    TpHit,
    SlHit,
    Emergency,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Open => "open",
            ActionKind::Close => "close",
            ActionKind::TpHit => "tp_hit",
            ActionKind::SlHit => "sl_hit",
            ActionKind::Emergency => "emergency",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Open => "Position Opened",
            ActionKind::Close => "Position Closed",
            ActionKind::TpHit => "Take Profit Hit",
            ActionKind::SlHit => "Stop Loss Hit",
            ActionKind::Emergency => "Emergency Close",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One activity feed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: LogId,
    pub action: ActionKind,
    pub wallet_address: String,
    pub venue: String,
    pub pair: String,
    pub details: Map<String, Value>,
    pub tx_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// Log details from a `json!` object; non-objects give an empty map
pub fn details_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

/// Input of a synchronized operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    #[serde(alias = "dexes")]
    pub venues: Vec<String>,
    pub pair: String,
    pub side: Side,
    pub leverage: u32,
    /// USDC per wallet per venue
    pub amount: f64,
    pub amount_percent: Option<f64>,
    pub take_profit_percent: f64,
    pub stop_loss_percent: f64,
    pub slippage: f64,
    pub order_type: OrderType,
    pub delta_neutral: bool,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            venues: vec!["Hyperliquid".to_string()],
            pair: "BTC/USDC".to_string(),
            side: Side::Long,
            leverage: 5,
            amount: 1000.0,
            amount_percent: None,
            take_profit_percent: 2.0,
            stop_loss_percent: 1.0,
            slippage: 0.5,
            order_type: OrderType::Market,
            delta_neutral: false,
        }
    }
}

impl TradeConfig {
    /// Selected venues as a set: first occurrence wins, order kept
    pub fn selected_venues(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::with_capacity(self.venues.len());
        for venue in &self.venues {
            if !seen.contains(venue) {
                seen.push(venue.clone());
            }
        }
        seen
    }
}

/// Program-wide display constants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProgramStats {
    pub total_supply: u64,
    pub total_power: u64,
    pub treasury_percent: f64,
    pub holders_percent: f64,
    pub total_volume: f64,
}

/// Events pushed to stream subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FarmEvent {
    #[serde(rename = "position_opened")]
    PositionOpened(Position),
    #[serde(rename = "position_closing")]
    PositionClosing { position_id: PositionId },
    #[serde(rename = "close_cancelled")]
    CloseCancelled { position_id: PositionId },
    #[serde(rename = "position_removed")]
    PositionRemoved(Position),
    #[serde(rename = "emergency_close")]
    EmergencyClose { removed: usize },
    #[serde(rename = "activity")]
    Activity(ActivityLog),
}

/// API response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn err(msg: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_price_by_pair() {
        assert_eq!(entry_price_for("BTC/USDC"), 49_500.0);
        assert_eq!(entry_price_for("ETH/USDC"), 2_850.0);
        assert_eq!(entry_price_for("OP/USDC"), 2_850.0);
    }

    #[test]
    fn test_max_leverage_depends_on_hyperliquid() {
        assert_eq!(max_leverage_for(&["Pacifica", "Hyperliquid"]), 50);
        assert_eq!(max_leverage_for(&["Pacifica", "Lighter"]), 20);
        assert_eq!(max_leverage_for::<&str>(&[]), 20);
    }

    #[test]
    fn test_selected_venues_collapses_duplicates() {
        let config = TradeConfig {
            venues: vec!["Based".into(), "Lighter".into(), "Based".into()],
            ..TradeConfig::default()
        };
        assert_eq!(config.selected_venues(), vec!["Based", "Lighter"]);
    }

    #[test]
    fn test_trade_config_accepts_dexes_alias() {
        let config: TradeConfig =
            serde_json::from_str(r#"{"dexes": ["Pacifica"], "pair": "ETH/USDC", "side": "Short"}"#)
                .unwrap();
        assert_eq!(config.venues, vec!["Pacifica"]);
        assert_eq!(config.side, Side::Short);
        assert_eq!(config.leverage, 5);
        assert_eq!(config.order_type, OrderType::Market);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&ActionKind::TpHit).unwrap(), "\"tp_hit\"");
        assert_eq!(
            serde_json::to_string(&WalletStatus::ReadOnly).unwrap(),
            "\"read-only\""
        );
        assert_eq!(serde_json::to_string(&OrderType::Limit).unwrap(), "\"limit\"");
        assert_eq!(ActionKind::Emergency.label(), "Emergency Close");
    }

    #[test]
    fn test_details_map() {
        let map = details_map(serde_json::json!({ "side": Side::Short, "pnl": -45.3 }));
        assert_eq!(map["side"], "Short");
        assert_eq!(map["pnl"], -45.3);
        assert!(details_map(serde_json::json!([1, 2])).is_empty());
    }
}
