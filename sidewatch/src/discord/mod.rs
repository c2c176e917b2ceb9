//! Discord integration.
//!
//! Three thin layers over the Discord HTTP API: a REST client for message
//! and webhook delivery ([`rest`]), embed rendering for blocks and miners
//! ([`embed`]), and the interactions endpoint that serves the slash
//! commands ([`interactions`]). None of them touch the block tracker.

pub mod embed;
pub mod interactions;
pub mod rest;
