//! Minimal Discord REST client.
//!
//! Covers exactly the three calls the daemon makes: posting a channel
//! message, posting an interaction follow-up, and bulk-registering the
//! application commands at startup.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

const DISCORD_API: &str = "https://discord.com/api/v10";

/// Bound on every Discord request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How a Discord delivery failed. Notifications are never retried; the
/// caller logs and drops.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The bot lacks permission for the destination.
    #[error("forbidden")]
    Forbidden,

    #[error("discord returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Discord REST client, cheap to clone.
#[derive(Debug, Clone)]
pub struct DiscordRest {
    http: reqwest::Client,
    token: String,
}

impl DiscordRest {
    pub fn new(token: &str) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            token: token.to_string(),
        })
    }

    /// Post an embed to a channel.
    pub async fn create_message(&self, channel_id: u64, embed: Value) -> Result<(), DeliveryError> {
        let url = format!("{DISCORD_API}/channels/{channel_id}/messages");
        self.post_checked(&url, &json!({ "embeds": [embed] }), true)
            .await
    }

    /// Post the follow-up reply for a deferred interaction.
    ///
    /// Follow-ups authenticate through the interaction token in the URL,
    /// not the bot token.
    pub async fn create_followup(
        &self,
        app_id: u64,
        interaction_token: &str,
        body: Value,
    ) -> Result<(), DeliveryError> {
        let url = format!("{DISCORD_API}/webhooks/{app_id}/{interaction_token}");
        self.post_checked(&url, &body, false).await
    }

    /// Replace the application's command set.
    ///
    /// Registers against the guild when one is given; guild commands
    /// propagate immediately, while global registration can take up to an
    /// hour to be visible everywhere.
    pub async fn register_commands(
        &self,
        app_id: u64,
        guild_id: Option<u64>,
        commands: &Value,
    ) -> Result<(), DeliveryError> {
        let url = match guild_id {
            Some(guild) => {
                format!("{DISCORD_API}/applications/{app_id}/guilds/{guild}/commands")
            }
            None => format!("{DISCORD_API}/applications/{app_id}/commands"),
        };

        debug!(%url, "Registering application commands.");
        let response = self
            .http
            .put(&url)
            .header(AUTHORIZATION, self.bot_auth())
            .json(commands)
            .send()
            .await?;
        check_status(response.status())
    }

    async fn post_checked(
        &self,
        url: &str,
        body: &Value,
        authenticate: bool,
    ) -> Result<(), DeliveryError> {
        let mut request = self.http.post(url).json(body);
        if authenticate {
            request = request.header(AUTHORIZATION, self.bot_auth());
        }
        let response = request.send().await?;
        check_status(response.status())
    }

    fn bot_auth(&self) -> String {
        format!("Bot {}", self.token)
    }
}

fn check_status(status: StatusCode) -> Result<(), DeliveryError> {
    if status == StatusCode::FORBIDDEN {
        Err(DeliveryError::Forbidden)
    } else if !status.is_success() {
        Err(DeliveryError::Status(status.as_u16()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_classified_apart_from_other_statuses() {
        assert!(matches!(
            check_status(StatusCode::FORBIDDEN),
            Err(DeliveryError::Forbidden)
        ));
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS),
            Err(DeliveryError::Status(429))
        ));
        assert!(check_status(StatusCode::NO_CONTENT).is_ok());
        assert!(check_status(StatusCode::OK).is_ok());
    }
}
