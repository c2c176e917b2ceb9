//! Payload types for the pool observer API.
//!
//! Fields the bridge does not strictly need are optional: the observer API
//! is undocumented and has drifted before, and a partially filled record
//! should degrade the presentation, not fail the decode. Missing-field
//! handling (log once, skip) lives at the call sites.

use serde::Deserialize;

/// Response of the pool info endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolInfo {
    pub sidechain: Option<SidechainStats>,
}

/// The sidechain section of the pool info payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SidechainStats {
    /// Current sidechain tip.
    pub last_block: Option<SideBlock>,
    /// The last block the pool found on the main chain.
    pub last_found: Option<FoundBlock>,
}

/// A sidechain block record, as returned by the pool info endpoint and
/// carried by `side_block` / `orphaned_block` stream events.
#[derive(Debug, Clone, Deserialize)]
pub struct SideBlock {
    pub side_height: Option<u64>,
    pub main_height: Option<u64>,
    /// Hash of the block on the main chain.
    pub main_id: Option<String>,
    pub template_id: Option<String>,
    /// Seconds since epoch.
    pub timestamp: Option<u64>,
    pub difficulty: Option<u64>,
    /// Address of the miner that found this sidechain block.
    pub miner_address: Option<String>,
}

/// Wrapper around the pool's last found main chain block.
#[derive(Debug, Clone, Deserialize)]
pub struct FoundBlock {
    pub main_block: Option<MainBlock>,
}

/// A main chain block found by the pool.
#[derive(Debug, Clone, Deserialize)]
pub struct MainBlock {
    pub height: Option<u64>,
    pub id: Option<String>,
    /// Reward in atomic units.
    pub reward: Option<u64>,
}

/// Response of the miner lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MinerInfo {
    pub id: Option<u64>,
    pub address: Option<String>,
    #[serde(default)]
    pub shares: Vec<MinerShares>,
    pub last_share_height: Option<u64>,
    /// Seconds since epoch.
    pub last_share_timestamp: Option<u64>,
}

/// One entry of a miner's share window.
#[derive(Debug, Clone, Deserialize)]
pub struct MinerShares {
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub uncles: u64,
}

impl MinerInfo {
    /// Sum of shares across the window.
    pub fn total_shares(&self) -> u64 {
        self.shares.iter().map(|s| s.shares).sum()
    }

    /// Sum of uncles across the window.
    pub fn total_uncles(&self) -> u64 {
        self.shares.iter().map(|s| s.uncles).sum()
    }
}
