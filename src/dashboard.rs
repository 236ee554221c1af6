//! Public dashboard figures derived from the program stats

use serde::{Deserialize, Serialize};

use crate::types::ProgramStats;

/// Venue leaderboards linked from the dashboard
pub const LEADERBOARDS: [(&str, &str); 2] = [
    ("Hyperliquid", "https://app.hyperliquid.xyz/leaderboard"),
    ("Pacifica", "https://pacifica.trade/leaderboard"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaderboard {
    pub venue: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub stats: ProgramStats,
    /// Share neither held by holders nor the treasury
    pub other_percent: f64,
    pub total_volume_display: String,
    pub leaderboards: Vec<Leaderboard>,
}

/// `2847650.0` -> `$2.85M`
pub fn format_volume(volume: f64) -> String {
    format!("${:.2}M", volume / 1_000_000.0)
}

pub fn view(stats: ProgramStats) -> DashboardView {
    DashboardView {
        other_percent: (100.0 - stats.holders_percent - stats.treasury_percent).max(0.0),
        total_volume_display: format_volume(stats.total_volume),
        leaderboards: LEADERBOARDS
            .iter()
            .map(|(venue, url)| Leaderboard {
                venue: venue.to_string(),
                url: url.to_string(),
            })
            .collect(),
        stats,
    }
}
