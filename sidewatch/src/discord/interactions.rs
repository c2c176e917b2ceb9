//! Slash command serving over Discord's interactions webhook.
//!
//! Discord POSTs every interaction to a public HTTPS endpoint and requires
//! two things of it: Ed25519 verification of each request against the
//! application public key, and a response within three seconds. Commands
//! that need a pool API round trip are therefore acknowledged immediately
//! with a deferred response and resolved from a spawned task through the
//! follow-up webhook.

use std::net::SocketAddr;
use std::sync::LazyLock;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::embed;
use super::rest::DiscordRest;
use crate::error::Error;
use crate::observer::{ObserverClient, ObserverError};

// Interaction types and response types from the Discord API.
const INTERACTION_PING: u8 = 1;
const INTERACTION_COMMAND: u8 = 2;
const RESPONSE_PONG: u8 = 1;
const RESPONSE_DEFERRED: u8 = 5;

/// Message flag making a reply visible only to the requester.
const EPHEMERAL: u64 = 64;

/// Base58 payload of plausible wallet-address length (standard and
/// integrated forms).
static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{95,106}$").unwrap());

/// Shared state for the interactions routes.
#[derive(Clone)]
pub struct AppState {
    pub observer: ObserverClient,
    pub rest: DiscordRest,
    pub app_id: u64,
    pub verify_key: VerifyingKey,
}

/// Parse the hex-encoded application public key from the developer portal.
pub fn parse_verify_key(hex_key: &str) -> crate::error::Result<VerifyingKey> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| Error::Config(format!("invalid application public key: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Config("application public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| Error::Config(format!("invalid application public key: {e}")))
}

/// The command set this bot registers.
pub fn definitions() -> Value {
    json!([
        {
            "name": "miner_info",
            "description": "Look up pool stats for a specific miner address.",
            "options": [{
                "type": 3,
                "name": "miner_address",
                "description": "The wallet address of the miner",
                "required": true,
            }],
        },
        {
            "name": "latest_block",
            "description": "Show the latest block on the pool sidechain.",
        },
    ])
}

/// Verify an interaction request signature.
///
/// Discord signs `timestamp || body` with the application's Ed25519 key
/// and sends the signature hex-encoded in a header.
fn verify_signature(key: &VerifyingKey, timestamp: &str, signature_hex: &str, body: &[u8]) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let signature: [u8; 64] = match signature.as_slice().try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&signature);

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);
    key.verify(&message, &signature).is_ok()
}

fn plausible_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

#[derive(Debug, Deserialize)]
struct Interaction {
    #[serde(rename = "type")]
    kind: u8,
    data: Option<CommandData>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommandData {
    name: String,
    #[serde(default)]
    options: Vec<CommandOption>,
}

#[derive(Debug, Deserialize)]
struct CommandOption {
    name: String,
    value: Value,
}

impl CommandData {
    fn string_option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_str())
    }
}

/// Build the interactions router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/interactions", post(handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers
        .get("x-signature-ed25519")
        .and_then(|v| v.to_str().ok());
    let timestamp = headers
        .get("x-signature-timestamp")
        .and_then(|v| v.to_str().ok());
    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        return (StatusCode::UNAUTHORIZED, "missing request signature").into_response();
    };
    if !verify_signature(&state.verify_key, timestamp, signature, &body) {
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            warn!(error = %e, "Undecodable interaction payload.");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match interaction.kind {
        INTERACTION_PING => Json(json!({ "type": RESPONSE_PONG })).into_response(),
        INTERACTION_COMMAND => {
            let (Some(data), Some(token)) = (interaction.data, interaction.token) else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            debug!(command = %data.name, "Received command interaction.");

            // Resolve after acknowledging; the pool API call can take
            // longer than Discord's response window.
            tokio::spawn(resolve(state, data, token));
            Json(json!({ "type": RESPONSE_DEFERRED, "data": { "flags": EPHEMERAL } }))
                .into_response()
        }
        kind => {
            debug!(kind, "Ignoring unsupported interaction type.");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

/// Resolve a deferred command and deliver the follow-up reply.
async fn resolve(state: AppState, data: CommandData, token: String) {
    let body = match data.name.as_str() {
        "miner_info" => miner_info_reply(&state, &data).await,
        "latest_block" => latest_block_reply(&state).await,
        other => {
            warn!(command = other, "Unknown command.");
            error_reply("Unknown command.")
        }
    };

    if let Err(e) = state.rest.create_followup(state.app_id, &token, body).await {
        error!(command = %data.name, error = %e, "Failed to deliver command reply.");
    }
}

fn error_reply(message: &str) -> Value {
    json!({ "content": format!("Error: {message}"), "flags": EPHEMERAL })
}

fn embed_reply(embed: Value) -> Value {
    json!({ "embeds": [embed], "flags": EPHEMERAL })
}

async fn miner_info_reply(state: &AppState, data: &CommandData) -> Value {
    let Some(address) = data.string_option("miner_address") else {
        return error_reply("A miner address is required.");
    };
    if !plausible_address(address) {
        return error_reply("That does not look like a valid wallet address.");
    }

    match state.observer.miner_info(address).await {
        Ok(info) => embed_reply(embed::miner(address, &info)),
        Err(ObserverError::MinerNotFound) => embed_reply(embed::miner_not_found(address)),
        Err(e) => {
            error!(error = %e, "Miner lookup failed.");
            error_reply(e.user_message())
        }
    }
}

async fn latest_block_reply(state: &AppState) -> Value {
    match state.observer.pool_info().await {
        Ok(info) => embed_reply(embed::pool_block(&info, embed::BlockContext::Latest)),
        Err(e) => {
            error!(error = %e, "Pool info fetch failed.");
            error_reply(e.user_message())
        }
    }
}

/// Serve the interactions endpoint until shutdown.
pub async fn serve(listen: SocketAddr, state: AppState, running: CancellationToken) {
    let app = router(state);
    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%listen, error = %e, "Failed to bind interactions endpoint.");
            return;
        }
    };

    info!(%listen, "Interactions endpoint listening.");
    let shutdown = running.clone().cancelled_owned();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "Interactions server exited with error.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, VerifyingKey) {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let verifying = signing.verifying_key();
        (signing, verifying)
    }

    #[test]
    fn accepts_a_correctly_signed_request() {
        let (signing, verifying) = keypair();
        let timestamp = "1700000000";
        let body = br#"{"type": 1}"#;

        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        let signature = hex::encode(signing.sign(&message).to_bytes());

        assert!(verify_signature(&verifying, timestamp, &signature, body));
    }

    #[test]
    fn rejects_tampered_or_malformed_signatures() {
        let (signing, verifying) = keypair();
        let timestamp = "1700000000";
        let body = br#"{"type": 1}"#;

        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        let signature = hex::encode(signing.sign(&message).to_bytes());

        // Tampered body.
        assert!(!verify_signature(
            &verifying,
            timestamp,
            &signature,
            br#"{"type": 2}"#
        ));
        // Tampered timestamp.
        assert!(!verify_signature(&verifying, "1700000001", &signature, body));
        // Not hex at all.
        assert!(!verify_signature(&verifying, timestamp, "zz-not-hex", body));
        // Wrong length.
        assert!(!verify_signature(&verifying, timestamp, "abcd", body));
    }

    #[test]
    fn parse_verify_key_round_trips() {
        let (_, verifying) = keypair();
        let parsed = parse_verify_key(&hex::encode(verifying.as_bytes())).unwrap();
        assert_eq!(parsed, verifying);

        assert!(parse_verify_key("not hex").is_err());
        assert!(parse_verify_key("abcd").is_err());
    }

    #[test]
    fn address_validation_accepts_plausible_addresses() {
        let standard = "4".repeat(95);
        assert!(plausible_address(&standard));
        let integrated = "4".repeat(106);
        assert!(plausible_address(&integrated));

        assert!(!plausible_address("short"));
        // 0, O, I and l are not in the base58 alphabet.
        assert!(!plausible_address(&"0".repeat(95)));
        assert!(!plausible_address(&"4".repeat(200)));
    }

    #[test]
    fn string_option_finds_named_option() {
        let data: CommandData = serde_json::from_str(
            r#"{"name": "miner_info", "options": [{"name": "miner_address", "value": "abc"}]}"#,
        )
        .unwrap();
        assert_eq!(data.string_option("miner_address"), Some("abc"));
        assert_eq!(data.string_option("missing"), None);
    }

    #[test]
    fn command_definitions_cover_both_commands() {
        let defs = definitions();
        let names: Vec<_> = defs
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["miner_info", "latest_block"]);
    }
}
