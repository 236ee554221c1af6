//! VikingsFarm - synchronized multi-wallet, multi-DEX perp farming simulator
//!
//! Positions, transaction hashes and P&L are simulated in memory; nothing
//! touches a chain. One trade configuration fans out to every wallet on
//! every selected venue, and positions move Open -> Closing -> removed.

pub mod activity;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod lifecycle;
pub mod orchestrator;
pub mod positions;
pub mod seed;
pub mod state;
pub mod timer;
pub mod types;
pub mod wallets;
pub mod websocket;

pub use config::FarmConfig;
pub use error::{FarmError, FarmResult};
pub use ids::{IdSource, RandomIds, SequentialIds};
pub use lifecycle::EmergencyReport;
pub use orchestrator::{OperationBatch, OperationPreview};
pub use state::FarmState;
pub use types::*;
