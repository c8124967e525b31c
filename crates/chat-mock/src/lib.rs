//! In-memory [`ChatBackend`] serving fixture channels with simulated latency.

use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use chat_core::{
    ChannelSummary, ChatBackend, ChatError, ChatErrorCategory, Clock, Message,
    session::DEFAULT_USER_NAME,
};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_HISTORY_LATENCY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_SEND_LATENCY: Duration = Duration::from_millis(500);
pub const DEFAULT_DIRECTORY_LATENCY: Duration = Duration::from_millis(800);

/// Id prefix of messages accepted by the mock server.
pub const SERVER_ID_PREFIX: &str = "srv-";

const CHANNELS_FIXTURE: &str = include_str!("../fixtures/channels.json");
const MESSAGES_FIXTURE: &str = include_str!("../fixtures/messages.json");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockBackendConfig {
    /// Author recorded on accepted sends.
    pub user_name: String,
    pub history_latency: Duration,
    pub send_latency: Duration,
    pub directory_latency: Duration,
    /// Start with sends failing.
    pub fail_sends: bool,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            user_name: DEFAULT_USER_NAME.to_owned(),
            history_latency: DEFAULT_HISTORY_LATENCY,
            send_latency: DEFAULT_SEND_LATENCY,
            directory_latency: DEFAULT_DIRECTORY_LATENCY,
            fail_sends: false,
        }
    }
}

impl MockBackendConfig {
    /// Same fixtures, no artificial delay.
    pub fn instant() -> Self {
        Self {
            history_latency: Duration::ZERO,
            send_latency: Duration::ZERO,
            directory_latency: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Channel directory shipped with the crate.
pub fn fixture_channels() -> Result<Vec<ChannelSummary>, ChatError> {
    parse_fixture("channels.json", CHANNELS_FIXTURE)
}

/// Seed messages shipped with the crate.
pub fn fixture_messages() -> Result<Vec<Message>, ChatError> {
    parse_fixture("messages.json", MESSAGES_FIXTURE)
}

fn parse_fixture<T: DeserializeOwned>(name: &str, raw: &str) -> Result<T, ChatError> {
    serde_json::from_str(raw).map_err(|err| {
        ChatError::new(
            ChatErrorCategory::Internal,
            "invalid_fixture",
            format!("failed to parse fixture {name}: {err}"),
        )
    })
}

/// Mock chat server holding channels and messages in memory.
pub struct MockBackend {
    config: MockBackendConfig,
    clock: Arc<dyn Clock>,
    channels: Vec<ChannelSummary>,
    messages: RwLock<HashMap<String, Vec<Message>>>,
    fail_sends: AtomicBool,
    history_requests: AtomicUsize,
    send_requests: AtomicUsize,
}

impl MockBackend {
    /// Backend seeded with the embedded fixtures.
    pub fn new(config: MockBackendConfig, clock: Arc<dyn Clock>) -> Result<Self, ChatError> {
        let channels = fixture_channels()?;
        let messages = fixture_messages()?;
        Ok(Self::with_data(config, clock, channels, messages))
    }

    /// Backend seeded with caller-provided data.
    pub fn with_data(
        config: MockBackendConfig,
        clock: Arc<dyn Clock>,
        channels: Vec<ChannelSummary>,
        messages: Vec<Message>,
    ) -> Self {
        let mut by_channel: HashMap<String, Vec<Message>> = HashMap::new();
        for message in messages {
            by_channel
                .entry(message.channel_id.clone())
                .or_default()
                .push(message);
        }
        debug!(
            channels = channels.len(),
            seeded_channels = by_channel.len(),
            "mock backend seeded"
        );

        Self {
            fail_sends: AtomicBool::new(config.fail_sends),
            config,
            clock,
            channels,
            messages: RwLock::new(by_channel),
            history_requests: AtomicUsize::new(0),
            send_requests: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fails_sends(&self) -> bool {
        self.fail_sends.load(Ordering::SeqCst)
    }

    /// Number of history fetches served so far.
    pub fn history_requests(&self) -> usize {
        self.history_requests.load(Ordering::SeqCst)
    }

    /// Number of send attempts received so far, failed ones included.
    pub fn send_requests(&self) -> usize {
        self.send_requests.load(Ordering::SeqCst)
    }

    /// Stored messages of a channel, without latency.
    pub fn stored_messages(&self, channel_id: &str) -> Vec<Message> {
        self.read_messages()
            .get(channel_id)
            .cloned()
            .unwrap_or_default()
    }

    fn read_messages(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Message>>> {
        self.messages.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_messages(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Message>>> {
        self.messages.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChatBackend for MockBackend {
    async fn list_channels(&self) -> Vec<ChannelSummary> {
        sleep(self.config.directory_latency).await;
        self.channels.clone()
    }

    async fn fetch_channel_history(&self, channel_id: &str) -> Vec<Message> {
        self.history_requests.fetch_add(1, Ordering::SeqCst);
        sleep(self.config.history_latency).await;
        let history = self.stored_messages(channel_id);
        debug!(%channel_id, count = history.len(), "served channel history");
        history
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<Message, ChatError> {
        self.send_requests.fetch_add(1, Ordering::SeqCst);
        sleep(self.config.send_latency).await;

        if self.fails_sends() {
            warn!(%channel_id, "rejecting send, failure mode enabled");
            return Err(ChatError::send_failed(format!(
                "simulated send failure for channel {channel_id}"
            )));
        }

        let message = Message {
            id: format!("{SERVER_ID_PREFIX}{}", Uuid::new_v4()),
            text: text.to_owned(),
            user: self.config.user_name.clone(),
            timestamp: self.clock.now(),
            channel_id: channel_id.to_owned(),
            pending: false,
        };
        self.write_messages()
            .entry(channel_id.to_owned())
            .or_default()
            .push(message.clone());
        debug!(%channel_id, message_id = %message.id, "accepted message");
        Ok(message)
    }
}
