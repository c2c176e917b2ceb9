//! Delivery of new-block notifications to the configured channel.
//!
//! The stream handler and the poller do not talk to Discord themselves;
//! they push a [`Notice`] onto a channel and this task renders and
//! delivers it. A delivery failure is terminal for that one notification:
//! it is logged and dropped, and never affects the tracked state.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use crate::discord::embed::{self, BlockContext};
use crate::discord::rest::{DeliveryError, DiscordRest};
use crate::log_gate::LogGate;
use crate::observer::events::FoundBlockEvent;
use crate::observer::types::{PoolInfo, SideBlock};

/// A block worth announcing, tagged with which path produced it.
#[derive(Debug)]
pub enum Notice {
    /// New sidechain tip seen on the event stream.
    SideBlock(SideBlock),
    /// Block found on the main chain, seen on the event stream.
    FoundBlock(FoundBlockEvent),
    /// New sidechain tip seen by the poller, with the full pool info
    /// payload for richer formatting.
    Polled(PoolInfo),
}

/// Task consuming notices until shutdown or all producers hang up.
pub async fn task(
    mut notices: mpsc::Receiver<Notice>,
    rest: DiscordRest,
    channel_id: Option<u64>,
    running: CancellationToken,
) {
    trace!("Task started.");
    let mut gate = LogGate::new("announcer");

    loop {
        let notice = tokio::select! {
            notice = notices.recv() => match notice {
                Some(notice) => notice,
                None => break,
            },
            _ = running.cancelled() => break,
        };

        let Some(channel_id) = channel_id else {
            if gate.first("channel-unset") {
                info!("No notification channel configured; discarding block notifications.");
            }
            continue;
        };

        let embed = match &notice {
            Notice::SideBlock(block) => embed::side_block(block),
            Notice::FoundBlock(found) => embed::found_block(found),
            Notice::Polled(info) => embed::pool_block(info, BlockContext::Notification),
        };

        match rest.create_message(channel_id, embed).await {
            Ok(()) => info!(channel_id, "Sent new block notification."),
            Err(DeliveryError::Forbidden) => {
                error!(
                    channel_id,
                    "Permission denied posting notification; check the bot's channel permissions."
                );
            }
            Err(e) => error!(channel_id, error = %e, "Failed to deliver notification."),
        }
    }

    trace!("Task stopped.");
}
