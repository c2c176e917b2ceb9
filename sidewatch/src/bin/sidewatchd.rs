use std::sync::Arc;

use tokio::signal::unix::{self, SignalKind};
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use sidewatch::announcer;
use sidewatch::config::Config;
use sidewatch::discord::interactions::{self, AppState};
use sidewatch::discord::rest::DiscordRest;
use sidewatch::observer::stream::EventHandler;
use sidewatch::observer::{poller, stream, ObserverClient};
use sidewatch::tracing::{self, prelude::*};
use sidewatch::tracker::BlockTracker;

#[tokio::main]
async fn main() {
    tracing::init_journald_or_stdout();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Cannot start.");
            std::process::exit(1);
        }
    };

    // Command credentials parse up front so a bad public key fails startup
    // rather than the first interaction.
    let commands = match config.command_credentials() {
        Some((app_id, key_hex)) => match interactions::parse_verify_key(key_hex) {
            Ok(key) => Some((app_id, key)),
            Err(e) => {
                error!(error = %e, "Cannot start.");
                std::process::exit(1);
            }
        },
        None => {
            warn!("DISCORD_APP_ID / DISCORD_PUBLIC_KEY not set; slash commands are disabled.");
            None
        }
    };

    let (observer, rest) = match (
        ObserverClient::new(&config.api_url),
        DiscordRest::new(&config.discord_token),
    ) {
        (Ok(observer), Ok(rest)) => (observer, rest),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "Cannot start.");
            std::process::exit(1);
        }
    };

    if config.notify_channel_id.is_none() {
        warn!("NOTIFY_CHANNEL_ID not set; new block notifications will not be sent.");
    }

    let tracker = Arc::new(BlockTracker::new());
    let (notice_tx, notice_rx) = mpsc::channel(16);
    let running = CancellationToken::new();
    let tasks = TaskTracker::new();

    tasks.spawn(announcer::task(
        notice_rx,
        rest.clone(),
        config.notify_channel_id,
        running.clone(),
    ));

    let handler = EventHandler::new(tracker.clone(), notice_tx.clone());
    tasks.spawn(stream::task(
        config.ws_url.clone(),
        handler,
        running.clone(),
    ));

    match config.poll_interval {
        Some(period) => {
            tasks.spawn(poller::task(
                observer.clone(),
                tracker.clone(),
                notice_tx.clone(),
                period,
                running.clone(),
            ));
        }
        None => info!("Polling fallback disabled; relying on the event stream."),
    }
    drop(notice_tx);

    if let Some((app_id, verify_key)) = commands {
        match rest
            .register_commands(app_id, config.guild_id, &interactions::definitions())
            .await
        {
            Ok(()) => match config.guild_id {
                Some(guild) => info!(guild, "Commands registered to guild."),
                None => info!("Commands registered globally; propagation can take up to an hour."),
            },
            Err(e) => error!(error = %e, "Failed to register commands; continuing without."),
        }

        let state = AppState {
            observer,
            rest,
            app_id,
            verify_key,
        };
        tasks.spawn(interactions::serve(
            config.listen_addr,
            state,
            running.clone(),
        ));
    }

    tasks.close();
    info!("Started.");

    let mut sigint = unix::signal(SignalKind::interrupt()).unwrap();
    let mut sigterm = unix::signal(SignalKind::terminate()).unwrap();
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }

    trace!("Shutting down.");
    running.cancel();

    tasks.wait().await;
    info!("Exiting.");
}
