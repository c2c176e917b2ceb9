//! sidewatch: a bridge between a p2pool sidechain observer and Discord.
//!
//! The daemon watches the pool observer's event stream (with a polling
//! fallback), detects new blocks through a shared [`tracker::BlockTracker`],
//! announces them to a Discord channel, and answers `/miner_info` and
//! `/latest_block` slash commands served over Discord's interactions
//! webhook.

pub mod announcer;
pub mod config;
pub mod discord;
pub mod error;
pub mod log_gate;
pub mod observer;
pub mod tracing;
pub mod tracker;
