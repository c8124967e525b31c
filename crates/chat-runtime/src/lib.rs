//! Async runtime that owns a [`ChatSession`] and serializes every mutation
//! through a single command loop.

use std::{collections::HashSet, sync::Arc, time::Duration};

use chat_core::{
    Broadcaster, ChannelSummary, ChatBackend, ChatError, ChatSession, ClientCommand, Clock,
    Message, RandomSource, RetryPolicy, RngSource, SessionConfig, Subscription, Topic,
    TopicValue, scheduler::DEFAULT_TICK_INTERVAL,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Clock driven by tokio time.
pub mod clock;

pub use clock::MonotonicClock;

const INPUT_BUFFER: usize = 256;

/// Runtime tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub session: SessionConfig,
    /// Cadence of injection progress ticks.
    pub tick_interval: Duration,
    /// Backoff applied to failed sends.
    pub retry_policy: RetryPolicy,
    /// Fixed seed for reproducible injection; entropy-seeded when `None`.
    pub rng_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            retry_policy: RetryPolicy::default(),
            rng_seed: None,
        }
    }
}

type SendReply = oneshot::Sender<Result<Message, ChatError>>;

enum RuntimeInput {
    Command(ClientCommand),
    Send {
        channel_id: String,
        text: String,
        reply: SendReply,
    },
    DirectoryLoaded(Vec<ChannelSummary>),
    HistoryLoaded {
        channel_id: String,
        messages: Vec<Message>,
    },
    SendCompleted {
        channel_id: String,
        correlation_id: String,
        result: Result<Message, ChatError>,
        reply: SendReply,
    },
    InjectionTick,
}

/// Cloneable front door to a running session.
#[derive(Clone, Debug)]
pub struct ChatRuntimeHandle {
    inputs: mpsc::Sender<RuntimeInput>,
    broadcaster: Broadcaster,
    stop: CancellationToken,
}

impl ChatRuntimeHandle {
    /// Observe a topic. The callback runs on the runtime task.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(&TopicValue) + Send + Sync + 'static,
    {
        self.broadcaster.subscribe(topic, callback)
    }

    /// Latest published value of a topic.
    pub fn snapshot(&self, topic: &Topic) -> TopicValue {
        self.broadcaster.snapshot(topic)
    }

    pub async fn command(&self, command: ClientCommand) -> Result<(), ChatError> {
        self.inputs
            .send(RuntimeInput::Command(command))
            .await
            .map_err(|_| ChatError::runtime_closed())
    }

    /// Fetch a channel's history unless it is loaded or a fetch is in flight.
    pub async fn load_channel(&self, channel_id: impl Into<String>) -> Result<(), ChatError> {
        self.command(ClientCommand::LoadChannel {
            channel_id: channel_id.into(),
        })
        .await
    }

    /// Navigate into a channel, loading its history on first open.
    pub async fn open_channel(&self, channel_id: impl Into<String>) -> Result<(), ChatError> {
        self.command(ClientCommand::OpenChannel {
            channel_id: channel_id.into(),
        })
        .await
    }

    pub async fn mark_visited(&self, channel_id: impl Into<String>) -> Result<(), ChatError> {
        self.command(ClientCommand::MarkVisited {
            channel_id: channel_id.into(),
        })
        .await
    }

    pub async fn set_injection_enabled(&self, enabled: bool) -> Result<(), ChatError> {
        self.command(ClientCommand::SetInjectionEnabled { enabled })
            .await
    }

    /// Send a message as the local user.
    ///
    /// A pending copy appears in the timeline right away. Resolves with the
    /// server's message, or with the final error after retries, in which case
    /// the pending copy has been removed again.
    pub async fn send_user_message(
        &self,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Message, ChatError> {
        let (reply, response) = oneshot::channel();
        self.inputs
            .send(RuntimeInput::Send {
                channel_id: channel_id.into(),
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| ChatError::runtime_closed())?;
        response.await.map_err(|_| ChatError::runtime_closed())?
    }

    pub fn is_running(&self) -> bool {
        !self.inputs.is_closed()
    }

    /// Stop the command loop and the injection ticker, and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.stop.cancel();
        self.inputs.closed().await;
    }
}

/// Start a runtime on the current tokio runtime with wall-clock time.
pub fn spawn_runtime<B: ChatBackend>(config: RuntimeConfig, backend: Arc<B>) -> ChatRuntimeHandle {
    let rng: Box<dyn RandomSource> = match config.rng_seed {
        Some(seed) => Box::new(RngSource::seeded(seed)),
        None => Box::new(RngSource::from_os_entropy()),
    };
    spawn_runtime_with(config, backend, Arc::new(MonotonicClock::new()), rng)
}

/// Start a runtime with an explicit clock and random source.
pub fn spawn_runtime_with<B: ChatBackend>(
    config: RuntimeConfig,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    rng: Box<dyn RandomSource>,
) -> ChatRuntimeHandle {
    let (inputs, inputs_rx) = mpsc::channel(INPUT_BUFFER);
    let broadcaster = Broadcaster::new();
    let stop = CancellationToken::new();

    let session = ChatSession::new(config.session.clone(), clock, rng, broadcaster.clone());
    let runtime = ChatRuntime {
        session,
        backend,
        inputs: inputs.downgrade(),
        inputs_rx,
        stop: stop.clone(),
        in_flight: HashSet::new(),
        ticker: None,
        tick_interval: config.tick_interval,
        retry_policy: config.retry_policy,
    };
    tokio::spawn(async move {
        runtime.run().await;
    });

    ChatRuntimeHandle {
        inputs,
        broadcaster,
        stop,
    }
}

struct ChatRuntime<B> {
    session: ChatSession,
    backend: Arc<B>,
    inputs: mpsc::WeakSender<RuntimeInput>,
    inputs_rx: mpsc::Receiver<RuntimeInput>,
    stop: CancellationToken,
    in_flight: HashSet<String>,
    ticker: Option<CancellationToken>,
    tick_interval: Duration,
    retry_policy: RetryPolicy,
}

impl<B: ChatBackend> ChatRuntime<B> {
    async fn run(mut self) {
        info!("chat runtime started");
        self.request_directory();

        loop {
            let input = tokio::select! {
                _ = self.stop.cancelled() => break,
                input = self.inputs_rx.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
            };
            self.handle_input(input);
        }

        self.stop_ticker();
        info!("chat runtime stopped");
    }

    fn handle_input(&mut self, input: RuntimeInput) {
        match input {
            RuntimeInput::Command(command) => self.handle_command(command),
            RuntimeInput::Send {
                channel_id,
                text,
                reply,
            } => self.handle_send(channel_id, text, reply),
            RuntimeInput::DirectoryLoaded(channels) => self.session.set_directory(channels),
            RuntimeInput::HistoryLoaded {
                channel_id,
                messages,
            } => {
                self.in_flight.remove(&channel_id);
                debug!(%channel_id, count = messages.len(), "channel history loaded");
                self.session.on_authoritative_load(&channel_id, messages);
            }
            RuntimeInput::SendCompleted {
                channel_id,
                correlation_id,
                result,
                reply,
            } => {
                let result = match result {
                    Ok(confirmed) => {
                        self.session
                            .confirm_send(&channel_id, &correlation_id, confirmed.clone());
                        Ok(confirmed)
                    }
                    Err(error) => {
                        self.session
                            .fail_send(&channel_id, &correlation_id, error.clone());
                        Err(error)
                    }
                };
                if reply.send(result).is_err() {
                    trace!(%correlation_id, "send caller went away before completion");
                }
            }
            RuntimeInput::InjectionTick => {
                self.session.tick_injection();
            }
        }
    }

    fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::LoadChannel { channel_id } => self.request_history(channel_id),
            ClientCommand::OpenChannel { channel_id } => {
                if self.session.open_channel(&channel_id) {
                    self.request_history(channel_id);
                }
            }
            ClientCommand::MarkVisited { channel_id } => self.session.mark_visited(&channel_id),
            ClientCommand::SetInjectionEnabled { enabled } => {
                if !self.session.set_injection_enabled(enabled) {
                    trace!(enabled, "injection already in requested state");
                } else if enabled {
                    self.start_ticker();
                } else {
                    self.stop_ticker();
                }
            }
        }
    }

    fn handle_send(&mut self, channel_id: String, text: String, reply: SendReply) {
        let provisional = match self.session.begin_send(&channel_id, &text) {
            Ok(provisional) => provisional,
            Err(err) => {
                let _ = reply.send(Err(err));
                return;
            }
        };
        let Some(inputs) = self.inputs.upgrade() else {
            return;
        };

        let backend = Arc::clone(&self.backend);
        let policy = self.retry_policy;
        let correlation_id = provisional.id;
        let text = provisional.text;
        tokio::spawn(async move {
            let result = send_with_retry(backend.as_ref(), &channel_id, &text, policy).await;
            let _ = inputs
                .send(RuntimeInput::SendCompleted {
                    channel_id,
                    correlation_id,
                    result,
                    reply,
                })
                .await;
        });
    }

    fn request_directory(&self) {
        let Some(inputs) = self.inputs.upgrade() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let channels = backend.list_channels().await;
            let _ = inputs.send(RuntimeInput::DirectoryLoaded(channels)).await;
        });
    }

    fn request_history(&mut self, channel_id: String) {
        if self.session.has_snapshot(&channel_id) || self.in_flight.contains(&channel_id) {
            trace!(%channel_id, "history already loaded or in flight");
            return;
        }
        let Some(inputs) = self.inputs.upgrade() else {
            return;
        };

        debug!(%channel_id, "fetching channel history");
        self.in_flight.insert(channel_id.clone());
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let messages = backend.fetch_channel_history(&channel_id).await;
            let _ = inputs
                .send(RuntimeInput::HistoryLoaded {
                    channel_id,
                    messages,
                })
                .await;
        });
    }

    fn start_ticker(&mut self) {
        if self.ticker.is_some() {
            return;
        }

        let stop = self.stop.child_token();
        let stop_child = stop.clone();
        let inputs = self.inputs.clone();
        let period = self.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_child.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(inputs) = inputs.upgrade() else {
                            break;
                        };
                        if inputs.send(RuntimeInput::InjectionTick).await.is_err() {
                            break;
                        }
                    }
                }
            }
            trace!("injection ticker exited");
        });

        debug!(period_ms = period.as_millis() as u64, "injection ticker started");
        self.ticker = Some(stop);
    }

    fn stop_ticker(&mut self) {
        // Ticks already queued are ignored by the idle scheduler.
        if let Some(stop) = self.ticker.take() {
            stop.cancel();
            debug!("injection ticker stopped");
        }
    }
}

async fn send_with_retry<B: ChatBackend>(
    backend: &B,
    channel_id: &str,
    text: &str,
    policy: RetryPolicy,
) -> Result<Message, ChatError> {
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        match backend.send_message(channel_id, text).await {
            Ok(message) => return Ok(message),
            Err(err) if err.is_retryable() && policy.should_retry(attempts) => {
                let delay = policy.delay_for_attempt(attempts - 1, err.retry_after_ms);
                warn!(
                    %channel_id,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    code = %err.code,
                    "send failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
