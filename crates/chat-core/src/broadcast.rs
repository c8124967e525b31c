use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use thiserror::Error;

use crate::types::{ChannelView, InjectionState, Message, RecentEntry, SendAck};

const TIMELINE_PREFIX: &str = "timeline:";

/// Named subscription topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Message list of one channel (`timeline:<channelId>`).
    Timeline(String),
    /// Global most-recent-first activity feed (`recentActivity`).
    RecentActivity,
    /// Injection countdown (`injectionProgress`).
    InjectionProgress,
    /// Visited-channel ledger (`visited`).
    Visited,
    /// Ordered sidebar rows with unread flags (`channels`).
    Channels,
    /// Latest send acknowledgement (`sendStatus`).
    SendStatus,
}

impl Topic {
    pub fn timeline(channel_id: impl Into<String>) -> Self {
        Self::Timeline(channel_id.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeline(channel_id) => write!(f, "{TIMELINE_PREFIX}{channel_id}"),
            Self::RecentActivity => f.write_str("recentActivity"),
            Self::InjectionProgress => f.write_str("injectionProgress"),
            Self::Visited => f.write_str("visited"),
            Self::Channels => f.write_str("channels"),
            Self::SendStatus => f.write_str("sendStatus"),
        }
    }
}

/// Error returned when parsing an unknown topic name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown topic '{0}'")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if let Some(channel_id) = raw.strip_prefix(TIMELINE_PREFIX)
            && !channel_id.is_empty()
        {
            return Ok(Self::Timeline(channel_id.to_owned()));
        }
        match raw {
            "recentActivity" => Ok(Self::RecentActivity),
            "injectionProgress" => Ok(Self::InjectionProgress),
            "visited" => Ok(Self::Visited),
            "channels" => Ok(Self::Channels),
            "sendStatus" => Ok(Self::SendStatus),
            other => Err(UnknownTopic(other.to_owned())),
        }
    }
}

/// Value delivered to subscribers of a topic.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicValue {
    Timeline(Vec<Message>),
    RecentActivity(Vec<RecentEntry>),
    InjectionProgress(InjectionState),
    Visited(BTreeMap<String, i64>),
    Channels(Vec<ChannelView>),
    SendStatus(Option<SendAck>),
}

impl TopicValue {
    /// Value reported for a topic that has never been published.
    pub fn empty_for(topic: &Topic) -> Self {
        match topic {
            Topic::Timeline(_) => Self::Timeline(Vec::new()),
            Topic::RecentActivity => Self::RecentActivity(Vec::new()),
            Topic::InjectionProgress => Self::InjectionProgress(InjectionState::IDLE),
            Topic::Visited => Self::Visited(BTreeMap::new()),
            Topic::Channels => Self::Channels(Vec::new()),
            Topic::SendStatus => Self::SendStatus(None),
        }
    }
}

/// Subscriber callback. Runs synchronously on the publishing thread.
pub type Callback = Arc<dyn Fn(&TopicValue) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<Topic, Vec<(u64, Callback)>>,
    latest: HashMap<Topic, TopicValue>,
}

/// Topic-keyed observer registry shared between the session and UI adapters.
#[derive(Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        f.debug_struct("Broadcaster")
            .field("topics", &registry.subscribers.len())
            .field("snapshots", &registry.latest.len())
            .finish()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for a topic. Callbacks are invoked in registration order.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(&TopicValue) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .subscribers
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            id,
            topic,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Record `value` as the latest snapshot of `topic` and deliver it.
    ///
    /// The subscriber list is copied before delivery, so callbacks that
    /// subscribe or unsubscribe only affect later publishes.
    pub fn publish(&self, topic: Topic, value: TopicValue) {
        let callbacks: Vec<Callback> = {
            let mut registry = self.lock();
            registry.latest.insert(topic.clone(), value.clone());
            registry
                .subscribers
                .get(&topic)
                .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };

        tracing::trace!(%topic, subscribers = callbacks.len(), "publishing topic");
        for callback in callbacks {
            callback(&value);
        }
    }

    /// Latest published value, or the topic's empty value.
    pub fn snapshot(&self, topic: &Topic) -> TopicValue {
        self.lock()
            .latest
            .get(topic)
            .cloned()
            .unwrap_or_else(|| TopicValue::empty_for(topic))
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.lock().subscribers.get(topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by [`Broadcaster::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    topic: Topic,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the callback. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(subs) = registry.subscribers.get_mut(&self.topic) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(id, _)| *id != self.id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            registry.subscribers.remove(&self.topic);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_factory = Arc::clone(&log);
        let factory = move |label: &str| -> Callback {
            let log = Arc::clone(&log_for_factory);
            let label = label.to_owned();
            Arc::new(move |_value: &TopicValue| log.lock().expect("log lock").push(label.clone()))
        };
        (log, factory)
    }

    #[test]
    fn topic_names_round_trip_through_strings() {
        for raw in [
            "timeline:3",
            "recentActivity",
            "injectionProgress",
            "visited",
            "channels",
            "sendStatus",
        ] {
            let topic: Topic = raw.parse().expect("known topic");
            assert_eq!(topic.to_string(), raw);
        }
        assert_eq!(
            "timeline:".parse::<Topic>(),
            Err(UnknownTopic("timeline:".into()))
        );
        assert!("bogus".parse::<Topic>().is_err());
    }

    #[test]
    fn delivers_in_registration_order_per_topic() {
        let broadcaster = Broadcaster::new();
        let (log, make) = recorder();
        let first = make("first");
        let second = make("second");
        let other = make("other");
        broadcaster.subscribe(Topic::RecentActivity, move |v| first(v));
        broadcaster.subscribe(Topic::RecentActivity, move |v| second(v));
        broadcaster.subscribe(Topic::Visited, move |v| other(v));

        broadcaster.publish(
            Topic::RecentActivity,
            TopicValue::RecentActivity(Vec::new()),
        );

        assert_eq!(*log.lock().expect("log lock"), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let broadcaster = Broadcaster::new();
        let (log, make) = recorder();
        let cb = make("a");
        let sub = broadcaster.subscribe(Topic::Visited, move |v| cb(v));
        assert_eq!(broadcaster.subscriber_count(&Topic::Visited), 1);

        assert!(sub.unsubscribe());
        broadcaster.publish(Topic::Visited, TopicValue::Visited(BTreeMap::new()));

        assert!(log.lock().expect("log lock").is_empty());
        assert_eq!(broadcaster.subscriber_count(&Topic::Visited), 0);
    }

    #[test]
    fn subscribing_from_a_callback_takes_effect_on_next_publish() {
        let broadcaster = Broadcaster::new();
        let (log, make) = recorder();
        let late = make("late");
        let inner = broadcaster.clone();
        let late = Arc::new(Mutex::new(Some(late)));
        broadcaster.subscribe(Topic::Channels, move |_| {
            if let Some(cb) = late.lock().expect("late lock").take() {
                inner.subscribe(Topic::Channels, move |v| cb(v));
            }
        });

        broadcaster.publish(Topic::Channels, TopicValue::Channels(Vec::new()));
        assert!(log.lock().expect("log lock").is_empty());

        broadcaster.publish(Topic::Channels, TopicValue::Channels(Vec::new()));
        assert_eq!(*log.lock().expect("log lock"), vec!["late"]);
    }

    #[test]
    fn unsubscribing_from_a_callback_takes_effect_on_next_publish() {
        let broadcaster = Broadcaster::new();
        let (log, make) = recorder();
        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let remover = make("remover");
        let slot = Arc::clone(&victim_slot);
        broadcaster.subscribe(Topic::Channels, move |v| {
            remover(v);
            if let Some(sub) = slot.lock().expect("slot lock").take() {
                assert!(sub.unsubscribe());
            }
        });
        let victim = make("victim");
        let sub = broadcaster.subscribe(Topic::Channels, move |v| victim(v));
        *victim_slot.lock().expect("slot lock") = Some(sub);

        broadcaster.publish(Topic::Channels, TopicValue::Channels(Vec::new()));
        assert_eq!(*log.lock().expect("log lock"), vec!["remover", "victim"]);
        assert_eq!(broadcaster.subscriber_count(&Topic::Channels), 1);

        broadcaster.publish(Topic::Channels, TopicValue::Channels(Vec::new()));
        assert_eq!(
            *log.lock().expect("log lock"),
            vec!["remover", "victim", "remover"]
        );
    }

    #[test]
    fn snapshot_falls_back_to_empty_value() {
        let broadcaster = Broadcaster::new();
        assert_eq!(
            broadcaster.snapshot(&Topic::InjectionProgress),
            TopicValue::InjectionProgress(InjectionState::IDLE)
        );

        let state = InjectionState {
            progress_percent: 40.0,
            seconds_remaining: 3,
            active: true,
        };
        broadcaster.publish(
            Topic::InjectionProgress,
            TopicValue::InjectionProgress(state),
        );
        assert_eq!(
            broadcaster.snapshot(&Topic::InjectionProgress),
            TopicValue::InjectionProgress(state)
        );
    }
}
