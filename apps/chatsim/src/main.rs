mod config;
mod logging;
mod view;

use std::{process::ExitCode, sync::Arc, time::Duration};

use chat_core::{ChatError, InjectionState, Topic, TopicValue};
use chat_mock::MockBackend;
use chat_runtime::{ChatRuntimeHandle, MonotonicClock, spawn_runtime};
use config::ChatsimConfig;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use view::ScreenSnapshot;

const RENDER_INTERVAL: Duration = Duration::from_secs(1);
const GREETING_DELAY: Duration = Duration::from_millis(1_500);
const START_CHANNEL: &str = "1";
const GREETING: &str = "Hello from chatsim!";

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    info!("starting chatsim");

    let config = match ChatsimConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    debug!(?config, "configuration loaded");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = %err.code, message = %err.message, "chatsim failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ChatsimConfig) -> Result<(), ChatError> {
    let backend = Arc::new(MockBackend::new(
        config.backend_config(),
        Arc::new(MonotonicClock::new()),
    )?);
    let handle = spawn_runtime(config.runtime_config(), backend);

    let _acks = handle.subscribe(Topic::SendStatus, |value| {
        let TopicValue::SendStatus(Some(ack)) = value else {
            return;
        };
        match &ack.error_code {
            None => info!(
                correlation_id = %ack.correlation_id,
                message_id = ?ack.message_id,
                "message delivered"
            ),
            Some(code) => warn!(
                correlation_id = %ack.correlation_id,
                %code,
                "message not delivered"
            ),
        }
    });

    handle.open_channel(START_CHANNEL).await?;
    if config.injection {
        handle.set_injection_enabled(true).await?;
    }

    let sender = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(GREETING_DELAY).await;
        if let Err(err) = sender.send_user_message(START_CHANNEL, GREETING).await {
            warn!(code = %err.code, "greeting was not delivered");
        }
    });

    let started = Instant::now();
    let halfway = config.run_for / 2;
    let mut switched = false;
    let mut render = tokio::time::interval(RENDER_INTERVAL);
    while started.elapsed() < config.run_for {
        render.tick().await;
        let screen = current_screen(&handle, &config.user_name);
        println!("{screen}");

        if !switched
            && started.elapsed() >= halfway
            && let Some(next) = screen.sidebar.iter().find(|row| row.unread)
        {
            info!(channel_id = %next.channel_id, "switching to channel with unread messages");
            handle.open_channel(next.channel_id.clone()).await?;
            switched = true;
        }
    }

    handle.shutdown().await;
    info!("chatsim finished");
    Ok(())
}

fn current_screen(handle: &ChatRuntimeHandle, own_user: &str) -> ScreenSnapshot {
    let channels = match handle.snapshot(&Topic::Channels) {
        TopicValue::Channels(views) => views,
        _ => Vec::new(),
    };
    let recent = match handle.snapshot(&Topic::RecentActivity) {
        TopicValue::RecentActivity(entries) => entries,
        _ => Vec::new(),
    };
    let progress = match handle.snapshot(&Topic::InjectionProgress) {
        TopicValue::InjectionProgress(state) => state,
        _ => InjectionState::IDLE,
    };
    let timeline = channels
        .iter()
        .find(|view| view.is_open)
        .map(
            |view| match handle.snapshot(&Topic::timeline(&view.channel.id)) {
                TopicValue::Timeline(messages) => messages,
                _ => Vec::new(),
            },
        )
        .unwrap_or_default();

    ScreenSnapshot::build(&channels, &recent, &progress, &timeline, own_user)
}
