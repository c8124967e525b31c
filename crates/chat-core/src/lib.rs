//! Client-side cache engine for the chat simulation.
//!
//! This crate holds the per-channel timelines, the pending buffer and the
//! reconciler that merges authoritative history, optimistic sends and
//! injected messages, plus activity tracking, the injection state machine,
//! and the topic broadcaster that UI adapters subscribe to.

/// Recent-activity feed, visits, unread flags and channel ordering.
pub mod activity;
/// Contract for the remote chat service.
pub mod backend;
/// Topic-keyed observer registry.
pub mod broadcast;
/// Injectable clock and random sources.
pub mod clock;
/// Stable error type surfaced to UI collaborators.
pub mod error;
/// Simulated message synthesis.
pub mod generator;
/// Optimistic send helpers and send acknowledgements.
pub mod normalization;
/// Buffer for messages that beat their channel's history.
pub mod pending;
/// Merge of history, pending, optimistic and injected messages.
pub mod reconcile;
/// Backoff policy for send retries.
pub mod retry;
/// Injection countdown state machine.
pub mod scheduler;
/// Session context owning all state.
pub mod session;
/// Per-channel timeline store.
pub mod timeline;
/// Shared data model.
pub mod types;

pub use activity::{RecentActivityLedger, VisitedChannelLedger, compute_unread, order_channels};
pub use backend::ChatBackend;
pub use broadcast::{Broadcaster, Subscription, Topic, TopicValue, UnknownTopic};
pub use clock::{Clock, ManualClock, RandomSource, RngSource, SequenceRandom, SystemClock};
pub use error::{ChatError, ChatErrorCategory};
pub use normalization::{SendOutcome, normalize_send_outcome};
pub use pending::PendingBuffer;
pub use reconcile::{ReconcileOutcome, Reconciler, merge_messages};
pub use retry::RetryPolicy;
pub use scheduler::{InjectionBounds, InjectionPhase, InjectionScheduler, SchedulerStep};
pub use session::{ChatSession, SessionConfig};
pub use timeline::TimelineStore;
pub use types::{
    ChannelSummary, ChannelView, ClientCommand, InjectionState, Message, RecentEntry, SendAck,
};
