//! Decoding of pool observer stream events.
//!
//! Each WebSocket text message is one JSON object with a `type`
//! discriminator; the block record sits under a key named after the type.
//! The height key also varies: side and orphaned blocks carry
//! `side_height`, found blocks may carry `side_height` or `height`
//! depending on observer version.

use serde::Deserialize;
use thiserror::Error;

use super::types::{MainBlock, SideBlock};

/// Why an inbound stream message could not be turned into a [`PoolEvent`].
#[derive(Error, Debug)]
pub enum EventError {
    #[error("undecodable event payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event `{0}` carried no block record")]
    MissingRecord(&'static str),

    #[error("unhandled event type `{0}`")]
    Unknown(String),
}

/// A decoded event from the observer stream.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// A new block on the pool sidechain.
    SideBlock(SideBlock),
    /// The pool found a block on the main chain.
    FoundBlock(FoundBlockEvent),
    /// A sidechain block was orphaned off the canonical chain.
    OrphanedBlock(SideBlock),
}

/// Record carried by a `found_block` event.
#[derive(Debug, Clone, Deserialize)]
pub struct FoundBlockEvent {
    pub side_height: Option<u64>,
    /// Some observer versions report the side height under `height`.
    pub height: Option<u64>,
    pub timestamp: Option<u64>,
    pub difficulty: Option<u64>,
    pub miner_address: Option<String>,
    pub main_block: Option<MainBlock>,
}

impl FoundBlockEvent {
    /// The sidechain height of the found block, wherever it was reported.
    pub fn side_height(&self) -> Option<u64> {
        self.side_height.or(self.height)
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    side_block: Option<SideBlock>,
    found_block: Option<FoundBlockEvent>,
    orphaned_block: Option<SideBlock>,
}

impl PoolEvent {
    /// Decode one stream message.
    pub fn decode(text: &str) -> Result<Self, EventError> {
        let raw: RawEvent = serde_json::from_str(text)?;
        match raw.kind.as_str() {
            "side_block" => raw
                .side_block
                .map(PoolEvent::SideBlock)
                .ok_or(EventError::MissingRecord("side_block")),
            "found_block" => raw
                .found_block
                .map(PoolEvent::FoundBlock)
                .ok_or(EventError::MissingRecord("found_block")),
            "orphaned_block" => raw
                .orphaned_block
                .map(PoolEvent::OrphanedBlock)
                .ok_or(EventError::MissingRecord("orphaned_block")),
            _ => Err(EventError::Unknown(raw.kind)),
        }
    }

    /// The event type's wire name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SideBlock(_) => "side_block",
            Self::FoundBlock(_) => "found_block",
            Self::OrphanedBlock(_) => "orphaned_block",
        }
    }
}
