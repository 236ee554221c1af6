//! Initial wallets, positions, activity and program stats

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::types::{
    details_map, ActionKind, ActivityLog, LogId, Position, PositionId, PositionStatus,
    ProgramStats, Side, Wallet, WalletId, WalletStatus,
};

fn wallet(id: &str, address: &str, balance: f64, status: WalletStatus) -> Wallet {
    Wallet {
        id: WalletId::new(id),
        address: address.to_string(),
        label: format!("Wallet {id}"),
        usdc_balance: balance,
        status,
    }
}

pub fn wallets() -> Vec<Wallet> {
    vec![
        wallet(
            "1",
            "0xd9a5087ad1aee96dead33b1e18c7052572f22d14",
            12_450.50,
            WalletStatus::Connected,
        ),
        wallet(
            "2",
            "0xA1b2C3d4E5f678901234567890abcdefABCDef01",
            8_920.75,
            WalletStatus::ReadOnly,
        ),
        wallet(
            "3",
            "0xB2c3D4e5F678901234567890abcdefABCDef0123",
            15_680.30,
            WalletStatus::Connected,
        ),
        wallet(
            "4",
            "0xC3d4E5f678901234567890abcdefABCDef012345",
            6_540.00,
            WalletStatus::ReadOnly,
        ),
        wallet(
            "5",
            "0xD4e5F678901234567890abcdefABCDef01234567",
            21_300.45,
            WalletStatus::Connected,
        ),
    ]
}

pub fn positions(now: DateTime<Utc>) -> Vec<Position> {
    vec![
        Position {
            id: PositionId::new("pos-1"),
            wallet_id: WalletId::new("1"),
            wallet_address: "0xd9a5...2d14".to_string(),
            venue: "Hyperliquid".to_string(),
            pair: "BTC/USDC".to_string(),
            side: Side::Long,
            leverage: 5,
            size_usdc: 1000.0,
            entry_price: 49_500.0,
            take_profit_percent: 2.0,
            stop_loss_percent: 1.0,
            unrealized_pnl: 125.50,
            status: PositionStatus::Open,
            tx_hash: "0x1234...abcd".to_string(),
            opened_at: now - Duration::hours(1),
            closed_at: None,
        },
        Position {
            id: PositionId::new("pos-2"),
            wallet_id: WalletId::new("3"),
            wallet_address: "0xB2c3...0123".to_string(),
            venue: "Pacifica".to_string(),
            pair: "ETH/USDC".to_string(),
            side: Side::Short,
            leverage: 3,
            size_usdc: 1500.0,
            entry_price: 2_850.0,
            take_profit_percent: 1.5,
            stop_loss_percent: 1.0,
            unrealized_pnl: -45.30,
            status: PositionStatus::Open,
            tx_hash: "0x5678...efgh".to_string(),
            opened_at: now - Duration::hours(2),
            closed_at: None,
        },
    ]
}

/// Newest first
pub fn activity(now: DateTime<Utc>) -> Vec<ActivityLog> {
    let open_details = |leverage: u32, size: f64, side: Side| {
        details_map(json!({ "leverage": leverage, "size": size, "side": side }))
    };

    vec![
        ActivityLog {
            id: LogId::new("log-1"),
            action: ActionKind::Open,
            wallet_address: "0xd9a5...2d14".to_string(),
            venue: "Hyperliquid".to_string(),
            pair: "BTC/USDC".to_string(),
            details: open_details(5, 1000.0, Side::Long),
            tx_hash: "0x1234...abcd".to_string(),
            timestamp: now - Duration::hours(1),
        },
        ActivityLog {
            id: LogId::new("log-2"),
            action: ActionKind::Open,
            wallet_address: "0xB2c3...0123".to_string(),
            venue: "Pacifica".to_string(),
            pair: "ETH/USDC".to_string(),
            details: open_details(3, 1500.0, Side::Short),
            tx_hash: "0x5678...efgh".to_string(),
            timestamp: now - Duration::hours(2),
        },
    ]
}

pub fn program_stats() -> ProgramStats {
    ProgramStats {
        total_supply: 1111,
        total_power: 66_750,
        treasury_percent: 15.0,
        holders_percent: 80.0,
        total_volume: 2_847_650.0,
    }
}
