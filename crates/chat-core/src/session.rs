//! Per-session context owning every store, ledger and the injection loop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    activity::{
        DEFAULT_RECENT_CAPACITY, RecentActivityLedger, VisitedChannelLedger, compute_unread,
        order_channels,
    },
    broadcast::{Broadcaster, Topic, TopicValue},
    clock::{Clock, RandomSource},
    error::ChatError,
    generator::{pick_channel, synthesize_message},
    normalization::{SendOutcome, normalize_send_outcome, provisional_message},
    pending::PendingBuffer,
    reconcile::{ReconcileOutcome, Reconciler},
    scheduler::{InjectionBounds, InjectionScheduler, SchedulerStep},
    timeline::{DEFAULT_TIMELINE_MAX_ITEMS, TimelineStore},
    types::{ChannelSummary, ChannelView, InjectionState, Message, SendAck},
};

/// Display name used for the local user's own messages.
pub const DEFAULT_USER_NAME: &str = "John Doe";

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Author name attached to optimistic sends.
    pub user_name: String,
    /// Capacity of the recent-activity feed.
    pub recent_capacity: usize,
    /// Per-channel timeline retention cap.
    pub timeline_max_items: usize,
    /// Delay range between injected messages.
    pub injection_bounds: InjectionBounds,
    /// Channels injected messages are spread over.
    pub injection_channels: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_name: DEFAULT_USER_NAME.to_owned(),
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            timeline_max_items: DEFAULT_TIMELINE_MAX_ITEMS,
            injection_bounds: InjectionBounds::default(),
            injection_channels: (1..=5).map(|id| id.to_string()).collect(),
        }
    }
}

/// Client session state. Mutated only through its methods, which publish
/// every visible change through the session's [`Broadcaster`].
pub struct ChatSession {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    rng: Box<dyn RandomSource>,
    broadcaster: Broadcaster,
    timelines: TimelineStore,
    pending: PendingBuffer,
    recent: RecentActivityLedger,
    visited: VisitedChannelLedger,
    scheduler: InjectionScheduler,
    directory: Vec<ChannelSummary>,
    open_channel: Option<String>,
}

impl ChatSession {
    /// Create a session and publish initial snapshots for the global topics.
    pub fn new(
        config: SessionConfig,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RandomSource>,
        broadcaster: Broadcaster,
    ) -> Self {
        let session = Self {
            timelines: TimelineStore::new(config.timeline_max_items),
            pending: PendingBuffer::new(),
            recent: RecentActivityLedger::new(config.recent_capacity),
            visited: VisitedChannelLedger::default(),
            scheduler: InjectionScheduler::new(config.injection_bounds),
            directory: Vec::new(),
            open_channel: None,
            config,
            clock,
            rng,
            broadcaster,
        };
        session.publish_recent();
        session.publish_visited();
        session.publish_progress(session.scheduler.state());
        session.publish_channels();
        session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn timeline(&self, channel_id: &str) -> &[Message] {
        self.timelines.get(channel_id)
    }

    pub fn has_snapshot(&self, channel_id: &str) -> bool {
        self.timelines.has_snapshot(channel_id)
    }

    /// Messages waiting for a channel's history to load.
    pub fn pending_for(&self, channel_id: &str) -> &[Message] {
        self.pending.get(channel_id)
    }

    pub fn recent(&self) -> &RecentActivityLedger {
        &self.recent
    }

    pub fn visited(&self) -> &VisitedChannelLedger {
        &self.visited
    }

    pub fn scheduler(&self) -> &InjectionScheduler {
        &self.scheduler
    }

    pub fn injection_state(&self) -> InjectionState {
        self.scheduler.state()
    }

    pub fn open_channel_id(&self) -> Option<&str> {
        self.open_channel.as_deref()
    }

    pub fn directory(&self) -> &[ChannelSummary] {
        &self.directory
    }

    /// Current value of a topic, computed from session state.
    pub fn snapshot(&self, topic: &Topic) -> TopicValue {
        match topic {
            Topic::Timeline(channel_id) => TopicValue::Timeline(self.timeline(channel_id).to_vec()),
            Topic::RecentActivity => TopicValue::RecentActivity(self.recent.entries().to_vec()),
            Topic::InjectionProgress => TopicValue::InjectionProgress(self.scheduler.state()),
            Topic::Visited => TopicValue::Visited(self.visited.visits().clone()),
            Topic::Channels => TopicValue::Channels(self.channel_views()),
            Topic::SendStatus => self.broadcaster.snapshot(topic),
        }
    }

    /// Replace the channel directory used for sidebar rows.
    pub fn set_directory(&mut self, channels: Vec<ChannelSummary>) {
        debug!(count = channels.len(), "channel directory replaced");
        self.directory = channels;
        self.publish_channels();
    }

    /// Route one message into the channel timeline (or the pending buffer).
    pub fn reconcile(&mut self, channel_id: &str, message: Message) -> ReconcileOutcome {
        let outcome = self.reconciler().reconcile(channel_id, message);
        if outcome == (ReconcileOutcome::Committed { changed: true }) {
            self.publish_timeline(channel_id);
        }
        outcome
    }

    /// Install fetched history for a channel.
    pub fn on_authoritative_load(&mut self, channel_id: &str, server_messages: Vec<Message>) {
        self.reconciler()
            .on_authoritative_load(channel_id, server_messages);
        self.publish_timeline(channel_id);
    }

    /// Commit a live message (injected or confirmed) and record it as activity.
    pub fn commit_live(&mut self, channel_id: &str, message: Message) -> ReconcileOutcome {
        let recorded = self.recent.record(channel_id, message.clone());
        let outcome = self.reconcile(channel_id, message);
        if recorded {
            self.publish_recent();
            self.publish_channels();
        }
        outcome
    }

    /// First phase of a user send: show a pending message immediately.
    pub fn begin_send(&mut self, channel_id: &str, text: &str) -> Result<Message, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::empty_message(channel_id));
        }
        let provisional =
            provisional_message(channel_id, text, &self.config.user_name, self.clock.now());
        debug!(%channel_id, correlation_id = %provisional.id, "optimistic send started");
        self.reconcile(channel_id, provisional.clone());
        Ok(provisional)
    }

    /// Second phase: swap the provisional entry for the server's message.
    pub fn confirm_send(
        &mut self,
        channel_id: &str,
        correlation_id: &str,
        mut confirmed: Message,
    ) -> SendAck {
        confirmed.pending = false;
        let withdrawn = self.reconciler().withdraw(channel_id, correlation_id);
        let outcome = SendOutcome::Confirmed {
            message: confirmed.clone(),
        };

        let recorded = self.recent.record(channel_id, confirmed.clone());
        let routed = self.reconciler().reconcile(channel_id, confirmed);
        if self.timelines.has_snapshot(channel_id)
            && (withdrawn.is_some() || routed == (ReconcileOutcome::Committed { changed: true }))
        {
            self.publish_timeline(channel_id);
        }
        if recorded {
            self.publish_recent();
            self.publish_channels();
        }

        self.publish_ack(normalize_send_outcome(correlation_id, channel_id, &outcome))
    }

    /// Failed send: roll the provisional entry back and report the error.
    pub fn fail_send(&mut self, channel_id: &str, correlation_id: &str, error: ChatError) -> SendAck {
        warn!(%channel_id, %correlation_id, code = %error.code, "send failed, rolling back");
        let removed = self.reconciler().withdraw(channel_id, correlation_id);
        if let Some(removed) = removed
            && self.timelines.has_snapshot(channel_id)
        {
            debug!(message_id = %removed.id, "provisional message removed from timeline");
            self.publish_timeline(channel_id);
        }
        let outcome = SendOutcome::Failed { error };
        self.publish_ack(normalize_send_outcome(correlation_id, channel_id, &outcome))
    }

    /// Record a visit to a channel at the current time.
    pub fn mark_visited(&mut self, channel_id: &str) {
        self.visited.mark(channel_id, self.clock.now_ms());
        self.publish_visited();
        self.publish_channels();
    }

    /// Navigate into a channel. Returns `true` if its history still needs loading.
    pub fn open_channel(&mut self, channel_id: &str) -> bool {
        self.visited.mark(channel_id, self.clock.now_ms());
        self.open_channel = Some(channel_id.to_owned());
        self.publish_visited();
        self.publish_channels();
        !self.timelines.has_snapshot(channel_id)
    }

    /// Leave the open channel without opening another.
    pub fn close_channel(&mut self) {
        if self.open_channel.take().is_some() {
            self.publish_channels();
        }
    }

    pub fn compute_unread(&self, channel_id: &str, open_channel_id: Option<&str>) -> bool {
        compute_unread(&self.recent, &self.visited, channel_id, open_channel_id)
    }

    /// Sidebar rows for the directory, most recently active first.
    pub fn channel_views(&self) -> Vec<ChannelView> {
        order_channels(
            &self.directory,
            &self.recent,
            &self.visited,
            self.open_channel.as_deref(),
        )
    }

    /// Start or stop the injection loop. Returns `true` if the loop changed state.
    pub fn set_injection_enabled(&mut self, enabled: bool) -> bool {
        let changed = if enabled {
            let now_ms = self.clock.now_ms();
            self.scheduler.enable(now_ms, self.rng.as_mut())
        } else {
            self.scheduler.disable()
        };

        match changed {
            Some(state) => {
                info!(enabled, "message injection toggled");
                self.publish_progress(state);
                true
            }
            None => false,
        }
    }

    /// Advance the injection countdown; returns the injected message on expiry.
    pub fn tick_injection(&mut self) -> Option<Message> {
        let now = self.clock.now();
        match self.scheduler.tick(now.timestamp_millis()) {
            SchedulerStep::Unchanged => None,
            SchedulerStep::Progress(state) => {
                self.publish_progress(state);
                None
            }
            SchedulerStep::Fire => {
                let channel_id =
                    pick_channel(&self.config.injection_channels, self.rng.as_mut())
                        .map(str::to_owned);
                let injected = match channel_id {
                    Some(channel_id) => {
                        let message = synthesize_message(&channel_id, now, self.rng.as_mut());
                        debug!(%channel_id, message_id = %message.id, "injecting simulated message");
                        self.commit_live(&channel_id, message.clone());
                        Some(message)
                    }
                    None => {
                        warn!("no injection channels configured, skipping message");
                        None
                    }
                };

                if let Some(state) = self
                    .scheduler
                    .rearm(now.timestamp_millis(), self.rng.as_mut())
                {
                    self.publish_progress(state);
                }
                injected
            }
        }
    }

    fn reconciler(&mut self) -> Reconciler<'_> {
        Reconciler::new(&mut self.timelines, &mut self.pending)
    }

    fn publish_timeline(&self, channel_id: &str) {
        self.broadcaster.publish(
            Topic::timeline(channel_id),
            TopicValue::Timeline(self.timelines.get(channel_id).to_vec()),
        );
    }

    fn publish_recent(&self) {
        self.broadcaster.publish(
            Topic::RecentActivity,
            TopicValue::RecentActivity(self.recent.entries().to_vec()),
        );
    }

    fn publish_visited(&self) {
        self.broadcaster.publish(
            Topic::Visited,
            TopicValue::Visited(self.visited.visits().clone()),
        );
    }

    fn publish_channels(&self) {
        self.broadcaster
            .publish(Topic::Channels, TopicValue::Channels(self.channel_views()));
    }

    fn publish_progress(&self, state: InjectionState) {
        self.broadcaster.publish(
            Topic::InjectionProgress,
            TopicValue::InjectionProgress(state),
        );
    }

    fn publish_ack(&self, ack: SendAck) -> SendAck {
        self.broadcaster
            .publish(Topic::SendStatus, TopicValue::SendStatus(Some(ack.clone())));
        ack
    }
}
