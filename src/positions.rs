//! Position filtering and totals for the positions table

use serde::{Deserialize, Serialize};

use crate::types::{Position, PositionStatus, Side};
use crate::wallets::etherscan_tx_url;

/// Every field is optional; `None` matches all
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionFilter {
    pub venue: Option<String>,
    pub side: Option<Side>,
    pub status: Option<PositionStatus>,
}

impl PositionFilter {
    pub fn matches(&self, position: &Position) -> bool {
        if let Some(venue) = &self.venue {
            if &position.venue != venue {
                return false;
            }
        }
        if let Some(side) = self.side {
            if position.side != side {
                return false;
            }
        }
        if let Some(status) = self.status {
            if position.status != status {
                return false;
            }
        }
        true
    }
}

/// Table row: the position plus a link to its opening transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRow {
    #[serde(flatten)]
    pub position: Position,
    pub explorer_url: String,
}

impl From<Position> for PositionRow {
    fn from(position: Position) -> Self {
        Self {
            explorer_url: etherscan_tx_url(&position.tx_hash),
            position,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsView {
    pub positions: Vec<PositionRow>,
    pub shown: usize,
    pub total: usize,
    pub total_pnl: f64,
    pub total_size: f64,
    /// Distinct venues across all positions, first seen first
    pub venues: Vec<String>,
}

pub fn distinct_venues(positions: &[Position]) -> Vec<String> {
    let mut venues: Vec<String> = Vec::new();
    for p in positions {
        if !venues.contains(&p.venue) {
            venues.push(p.venue.clone());
        }
    }
    venues
}

pub fn view(all: &[Position], filter: &PositionFilter) -> PositionsView {
    let shown: Vec<&Position> = all.iter().filter(|p| filter.matches(p)).collect();
    PositionsView {
        shown: shown.len(),
        total: all.len(),
        total_pnl: shown.iter().map(|p| p.unrealized_pnl).sum(),
        total_size: shown.iter().map(|p| p.size_usdc).sum(),
        venues: distinct_venues(all),
        positions: shown.into_iter().cloned().map(PositionRow::from).collect(),
    }
}
