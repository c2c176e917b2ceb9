//! Observer event stream consumption and reconnection.
//!
//! The observer pushes block events over a WebSocket. This task owns the
//! connection for the life of the process: connect, consume until the
//! connection dies, classify the failure, wait out a fixed backoff, and
//! retry forever. A down observer is routine, so repeated failures of the
//! same class log only once per streak (see [`LogGate`]); a successful
//! connection or a differing failure class re-arms the logging.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{error::ProtocolError, Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::events::{EventError, PoolEvent};
use crate::announcer::Notice;
use crate::log_gate::LogGate;
use crate::tracker::{BlockTracker, Outcome};

/// Fixed wait between reconnection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Bound on connection establishment.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Classification of a dead or unreachable stream connection.
///
/// Used as the suppression key, so an unbroken run of identical failures
/// logs once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum StreamFailure {
    /// Peer closed the connection with a proper handshake.
    ClosedClean,
    /// Connection dropped without a closing handshake.
    ClosedError,
    Refused,
    Timeout,
    Other,
}

impl StreamFailure {
    pub fn key(self) -> &'static str {
        self.into()
    }
}

fn classify(err: &WsError) -> StreamFailure {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => StreamFailure::ClosedClean,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            StreamFailure::ClosedError
        }
        WsError::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
            StreamFailure::Refused
        }
        WsError::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => StreamFailure::Timeout,
        WsError::Io(_) => StreamFailure::ClosedError,
        _ => StreamFailure::Other,
    }
}

/// Feeds stream observations into the tracker and emits notices.
pub struct EventHandler {
    tracker: Arc<BlockTracker>,
    notices: mpsc::Sender<Notice>,
}

impl EventHandler {
    pub fn new(tracker: Arc<BlockTracker>, notices: mpsc::Sender<Notice>) -> Self {
        Self { tracker, notices }
    }

    /// Handle one inbound text message. Decode failures are logged and
    /// swallowed; they must never take the connection down.
    async fn handle_text(&self, text: &str) {
        let event = match PoolEvent::decode(text) {
            Ok(event) => event,
            Err(EventError::Unknown(kind)) => {
                debug!(kind, "Ignoring unhandled event type.");
                return;
            }
            Err(e) => {
                error!(error = %e, "Failed to decode stream event; skipping.");
                return;
            }
        };

        match event {
            PoolEvent::SideBlock(block) => {
                let Some(height) = block.side_height else {
                    warn!("Side block event carried no height; skipping.");
                    return;
                };
                self.observe(height, "side_block", Notice::SideBlock(block))
                    .await;
            }
            PoolEvent::FoundBlock(found) => {
                let Some(height) = found.side_height() else {
                    warn!("Found block event carried no height; skipping.");
                    return;
                };
                self.observe(height, "found_block", Notice::FoundBlock(found))
                    .await;
            }
            PoolEvent::OrphanedBlock(block) => {
                info!(
                    side_height = block.side_height,
                    "Sidechain block was orphaned."
                );
            }
        }
    }

    /// Run one observation through the tracker, emitting `notice` only for
    /// a genuinely new block.
    async fn observe(&self, height: u64, kind: &'static str, notice: Notice) {
        match self.tracker.evaluate(height) {
            Outcome::Initialized => {
                info!(height, "Initialized last known side height from stream.");
            }
            Outcome::NewBlock { delta } => {
                info!(height, delta, kind, "New block on the event stream.");
                if self.notices.send(notice).await.is_err() {
                    warn!("Announcer is gone; dropping notification.");
                }
            }
            Outcome::NoChange => {
                debug!(height, kind, "Height already known; skipping notification.");
            }
            Outcome::Regression { delta } => {
                warn!(
                    height,
                    delta, kind, "Height regressed; possible reorg. Resynchronized to stream value."
                );
            }
        }
    }
}

/// Consume messages until the connection ends or shutdown is requested.
///
/// Returns `None` on shutdown, otherwise the failure classification of the
/// dead connection.
async fn consume<S>(
    stream: &mut S,
    handler: &EventHandler,
    running: &CancellationToken,
) -> Option<StreamFailure>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => handler.handle_text(&text).await,
                Some(Ok(Message::Close(_))) | None => return Some(StreamFailure::ClosedClean),
                Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                Some(Err(e)) => {
                    debug!(error = %e, "Event stream read error.");
                    return Some(classify(&e));
                }
            },
            _ = running.cancelled() => return None,
        }
    }
}

/// Task owning the stream connection for the life of the process.
pub async fn task(ws_url: String, handler: EventHandler, running: CancellationToken) {
    trace!("Task started.");
    let mut gate = LogGate::new("event-stream");

    while !running.is_cancelled() {
        let failure = match time::timeout(CONNECT_TIMEOUT, connect_async(ws_url.as_str())).await {
            Ok(Ok((mut ws, _response))) => {
                info!(url = %ws_url, "Connected to observer event stream.");
                gate.reset();
                match consume(&mut ws, &handler, &running).await {
                    Some(failure) => failure,
                    None => break,
                }
            }
            Ok(Err(e)) => {
                let failure = classify(&e);
                debug!(error = %e, "Event stream connect failed.");
                failure
            }
            Err(_elapsed) => StreamFailure::Timeout,
        };

        if gate.supersede(failure.key()) {
            warn!(
                failure = failure.key(),
                retry_secs = RECONNECT_DELAY.as_secs(),
                "Event stream down; will keep retrying."
            );
        }

        tokio::select! {
            _ = time::sleep(RECONNECT_DELAY) => {}
            _ = running.cancelled() => break,
        }
    }

    trace!("Task stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn handler_with_channel() -> (EventHandler, Arc<BlockTracker>, mpsc::Receiver<Notice>) {
        let tracker = Arc::new(BlockTracker::new());
        let (tx, rx) = mpsc::channel(8);
        (EventHandler::new(tracker.clone(), tx), tracker, rx)
    }

    fn side_block_json(height: u64) -> String {
        format!(r#"{{"type": "side_block", "side_block": {{"side_height": {height}}}}}"#)
    }

    #[tokio::test]
    async fn malformed_event_does_not_terminate_consumption() {
        let (handler, tracker, _rx) = handler_with_channel();
        let running = CancellationToken::new();

        let mut messages = stream::iter(vec![
            Ok(Message::Text("{ not json".to_string())),
            Ok(Message::Text(side_block_json(500_000))),
            Ok(Message::Close(None)),
        ]);

        let failure = consume(&mut messages, &handler, &running).await;
        assert_eq!(failure, Some(StreamFailure::ClosedClean));
        // The well-formed event after the garbage was still processed.
        assert_eq!(tracker.height(), Some(500_000));
    }

    #[tokio::test]
    async fn first_stream_observation_does_not_notify() {
        let (handler, tracker, mut rx) = handler_with_channel();
        handler.handle_text(&side_block_json(500_000)).await;
        assert_eq!(tracker.height(), Some(500_000));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_height_notifies_and_duplicate_does_not() {
        let (handler, _tracker, mut rx) = handler_with_channel();
        handler.handle_text(&side_block_json(500_000)).await;
        handler.handle_text(&side_block_json(500_001)).await;
        assert!(matches!(rx.try_recv(), Ok(Notice::SideBlock(_))));

        // Same height again, e.g. replayed by the poller path.
        handler.handle_text(&side_block_json(500_001)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn regressed_height_is_adopted_but_not_announced() {
        let (handler, tracker, mut rx) = handler_with_channel();
        handler.handle_text(&side_block_json(500_010)).await;
        handler.handle_text(&side_block_json(500_005)).await;
        assert_eq!(tracker.height(), Some(500_005));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn found_block_event_feeds_the_same_tracker() {
        let (handler, tracker, mut rx) = handler_with_channel();
        handler.handle_text(&side_block_json(500_000)).await;
        handler
            .handle_text(r#"{"type": "found_block", "found_block": {"height": 500002}}"#)
            .await;
        assert_eq!(tracker.height(), Some(500_002));
        assert!(matches!(rx.try_recv(), Ok(Notice::FoundBlock(_))));
    }

    #[tokio::test]
    async fn orphan_event_does_not_touch_the_tracker() {
        let (handler, tracker, mut rx) = handler_with_channel();
        handler.handle_text(&side_block_json(500_000)).await;
        handler
            .handle_text(r#"{"type": "orphaned_block", "orphaned_block": {"side_height": 499000}}"#)
            .await;
        assert_eq!(tracker.height(), Some(500_000));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_interrupts_consumption() {
        let (handler, _tracker, _rx) = handler_with_channel();
        let running = CancellationToken::new();
        running.cancel();

        let mut messages = stream::pending::<Result<Message, WsError>>();
        let failure = consume(&mut messages, &handler, &running).await;
        assert_eq!(failure, None);
    }

    #[test]
    fn failure_classification_keys_are_stable() {
        assert_eq!(StreamFailure::ClosedClean.key(), "closed-clean");
        assert_eq!(StreamFailure::Refused.key(), "refused");
        assert_eq!(
            classify(&WsError::ConnectionClosed),
            StreamFailure::ClosedClean
        );
        assert_eq!(
            classify(&WsError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused
            ))),
            StreamFailure::Refused
        );
        assert_eq!(
            classify(&WsError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe
            ))),
            StreamFailure::ClosedError
        );
    }
}
