//! Wallet display helpers and explorer links

use serde::{Deserialize, Serialize};

use crate::types::Wallet;

pub const DEFAULT_TAG: &str = "TAG";

/// Chains supported by the DeBank profile page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Eth,
    Arb,
    Bsc,
    Polygon,
}

impl Chain {
    pub fn debank_id(&self) -> &'static str {
        match self {
            Chain::Eth => "eth",
            Chain::Arb => "arb",
            Chain::Bsc => "bsc",
            Chain::Polygon => "matic",
        }
    }
}

/// `0xd9a5087a...` -> `0xd9a5...2d14`
///
/// Ten characters or fewer come back unchanged, since head and tail would
/// overlap.
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub fn debank_url(address: &str, chain: Chain) -> String {
    format!(
        "https://debank.com/profile/{}?chain={}",
        address,
        chain.debank_id()
    )
}

pub fn etherscan_address_url(address: &str) -> String {
    format!("https://etherscan.io/address/{address}")
}

pub fn etherscan_tx_url(tx_hash: &str) -> String {
    format!("https://etherscan.io/tx/{tx_hash}")
}

pub fn total_balance(wallets: &[Wallet]) -> f64 {
    wallets.iter().map(|w| w.usdc_balance).sum()
}

/// Blank tags fall back to the default
pub fn normalize_tag(tag: &str) -> String {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        DEFAULT_TAG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Wallet as listed by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletView {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub short_address: String,
    pub tag: String,
    pub debank_url: String,
    pub etherscan_url: String,
}

impl WalletView {
    pub fn new(wallet: &Wallet, tag: Option<String>, chain: Chain) -> Self {
        Self {
            short_address: shorten_address(&wallet.address),
            tag: tag.unwrap_or_else(|| DEFAULT_TAG.to_string()),
            debank_url: debank_url(&wallet.address, chain),
            etherscan_url: etherscan_address_url(&wallet.address),
            wallet: wallet.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletsOverview {
    pub wallets: Vec<WalletView>,
    pub total_balance: f64,
}
