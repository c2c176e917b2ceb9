//! Configuration for sidewatch.
//!
//! Everything comes from the environment, matching how the daemon is
//! deployed (systemd unit or container env). Only the bot token is
//! required; each optional piece disables its feature with a warning
//! instead of failing startup, while a value that is present but
//! unparseable is a fatal configuration error.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://mini.p2pool.observer/api";
pub const DEFAULT_WS_URL: &str = "wss://mini.p2pool.observer/api/events";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8787";

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token used for REST authentication.
    pub discord_token: String,

    /// Channel receiving new-block notifications. Absent means
    /// notifications are disabled.
    pub notify_channel_id: Option<u64>,

    /// Guild to scope command registration to. Guild commands propagate
    /// immediately; global ones can take up to an hour.
    pub guild_id: Option<u64>,

    /// Application id, required for the command layer.
    pub app_id: Option<u64>,

    /// Hex-encoded application public key, required for the command layer.
    pub public_key: Option<String>,

    /// Observer API base URL.
    pub api_url: String,

    /// Observer event stream URL.
    pub ws_url: String,

    /// Bind address for the interactions endpoint.
    pub listen_addr: SocketAddr,

    /// Poll period for the fallback poller. Absent means the poller is
    /// disabled and only the event stream feeds the tracker.
    pub poll_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let discord_token = required("DISCORD_TOKEN")?;
        let notify_channel_id = optional_u64("NOTIFY_CHANNEL_ID")?;
        let guild_id = optional_u64("GUILD_ID")?;
        let app_id = optional_u64("DISCORD_APP_ID")?;
        let public_key = optional("DISCORD_PUBLIC_KEY");

        let api_url = optional("OBSERVER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let ws_url = optional("OBSERVER_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());

        let listen_addr = optional("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .map_err(|e| Error::Config(format!("invalid LISTEN_ADDR: {e}")))?;

        let poll_interval = optional_u64("POLL_INTERVAL_SECS")?
            .map(|secs| {
                if secs == 0 {
                    Err(Error::Config(
                        "POLL_INTERVAL_SECS must be positive".to_string(),
                    ))
                } else {
                    Ok(Duration::from_secs(secs))
                }
            })
            .transpose()?;

        Ok(Self {
            discord_token,
            notify_channel_id,
            guild_id,
            app_id,
            public_key,
            api_url,
            ws_url,
            listen_addr,
            poll_interval,
        })
    }

    /// The command-layer credentials, when both halves are configured.
    pub fn command_credentials(&self) -> Option<(u64, &str)> {
        match (self.app_id, self.public_key.as_deref()) {
            (Some(app_id), Some(key)) => Some((app_id, key)),
            _ => None,
        }
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| Error::Config(format!("{name} is not set")))
}

fn optional_u64(name: &str) -> Result<Option<u64>> {
    optional(name)
        .map(|v| {
            v.parse()
                .map_err(|_| Error::Config(format!("{name} must be an integer, got `{v}`")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        "DISCORD_TOKEN",
        "NOTIFY_CHANNEL_ID",
        "GUILD_ID",
        "DISCORD_APP_ID",
        "DISCORD_PUBLIC_KEY",
        "OBSERVER_API_URL",
        "OBSERVER_WS_URL",
        "LISTEN_ADDR",
        "POLL_INTERVAL_SECS",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn token_is_required() {
        clear_env();
        assert!(matches!(Config::from_env(), Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn minimal_config_uses_defaults() {
        clear_env();
        std::env::set_var("DISCORD_TOKEN", "token");

        let config = Config::from_env().unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert!(config.notify_channel_id.is_none());
        assert!(config.poll_interval.is_none());
        assert!(config.command_credentials().is_none());
    }

    #[test]
    #[serial]
    fn full_config_parses_every_field() {
        clear_env();
        std::env::set_var("DISCORD_TOKEN", "token");
        std::env::set_var("NOTIFY_CHANNEL_ID", "123456789");
        std::env::set_var("GUILD_ID", "42");
        std::env::set_var("DISCORD_APP_ID", "777");
        std::env::set_var("DISCORD_PUBLIC_KEY", "ab");
        std::env::set_var("OBSERVER_API_URL", "http://localhost:9327/api");
        std::env::set_var("OBSERVER_WS_URL", "ws://localhost:9327/api/events");
        std::env::set_var("LISTEN_ADDR", "127.0.0.1:9000");
        std::env::set_var("POLL_INTERVAL_SECS", "60");

        let config = Config::from_env().unwrap();
        assert_eq!(config.notify_channel_id, Some(123_456_789));
        assert_eq!(config.guild_id, Some(42));
        assert_eq!(config.command_credentials(), Some((777, "ab")));
        assert_eq!(config.poll_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.listen_addr.port(), 9000);
        clear_env();
    }

    #[test]
    #[serial]
    fn unparseable_values_are_fatal() {
        clear_env();
        std::env::set_var("DISCORD_TOKEN", "token");
        std::env::set_var("NOTIFY_CHANNEL_ID", "not-a-number");
        assert!(matches!(Config::from_env(), Err(Error::Config(_))));

        std::env::set_var("NOTIFY_CHANNEL_ID", "1");
        std::env::set_var("POLL_INTERVAL_SECS", "0");
        assert!(matches!(Config::from_env(), Err(Error::Config(_))));
        clear_env();
    }
}
