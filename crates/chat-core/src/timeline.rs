use std::collections::HashMap;

use crate::types::Message;

/// Default per-channel retention cap.
pub const DEFAULT_TIMELINE_MAX_ITEMS: usize = 1_200;

/// Per-channel ordered message collections.
///
/// A channel is present once authoritative history has been installed for
/// it; absent channels read as empty.
#[derive(Debug, Clone)]
pub struct TimelineStore {
    timelines: HashMap<String, Vec<Message>>,
    max_items: usize,
}

impl Default for TimelineStore {
    fn default() -> Self {
        Self::new(DEFAULT_TIMELINE_MAX_ITEMS)
    }
}

impl TimelineStore {
    /// Create a store with a per-channel item cap (`max_items >= 1`).
    pub fn new(max_items: usize) -> Self {
        Self {
            timelines: HashMap::new(),
            max_items: max_items.max(1),
        }
    }

    /// Messages of one channel in ascending timestamp order.
    pub fn get(&self, channel_id: &str) -> &[Message] {
        self.timelines
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether authoritative history has been installed for the channel.
    pub fn has_snapshot(&self, channel_id: &str) -> bool {
        self.timelines.contains_key(channel_id)
    }

    pub fn contains(&self, channel_id: &str, message_id: &str) -> bool {
        self.get(channel_id).iter().any(|m| m.id == message_id)
    }

    /// Insert one message, keeping ids unique and timestamps ordered.
    ///
    /// Returns `false` (and changes nothing) if the id is already present or
    /// the channel has no authoritative snapshot yet.
    pub fn commit(&mut self, channel_id: &str, message: Message) -> bool {
        let Some(timeline) = self.timelines.get_mut(channel_id) else {
            return false;
        };
        if timeline.iter().any(|m| m.id == message.id) {
            return false;
        }
        // Equal timestamps keep arrival order.
        let index = timeline.partition_point(|m| m.timestamp <= message.timestamp);
        timeline.insert(index, message);
        trim_oldest(timeline, self.max_items);
        true
    }

    /// Replace a channel's timeline. Callers pass deduplicated, sorted input.
    pub fn install(&mut self, channel_id: &str, mut messages: Vec<Message>) {
        trim_oldest(&mut messages, self.max_items);
        self.timelines.insert(channel_id.to_owned(), messages);
    }

    /// Remove one message by id.
    pub fn remove(&mut self, channel_id: &str, message_id: &str) -> Option<Message> {
        let timeline = self.timelines.get_mut(channel_id)?;
        let index = timeline.iter().position(|m| m.id == message_id)?;
        Some(timeline.remove(index))
    }
}

fn trim_oldest(items: &mut Vec<Message>, max_items: usize) {
    if items.len() <= max_items {
        return;
    }
    let excess = items.len() - max_items;
    items.drain(0..excess);
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn message(id: &str, offset_secs: i64) -> Message {
        Message {
            id: id.to_owned(),
            text: format!("body {id}"),
            user: "Jane Smith".to_owned(),
            timestamp: base() + Duration::seconds(offset_secs),
            channel_id: "1".to_owned(),
            pending: false,
        }
    }

    #[test]
    fn unknown_channel_reads_empty_without_snapshot() {
        let store = TimelineStore::default();
        assert!(store.get("9").is_empty());
        assert!(!store.has_snapshot("9"));
    }

    #[test]
    fn commit_without_snapshot_is_rejected() {
        let mut store = TimelineStore::default();
        assert!(!store.commit("9", message("x", 0)));
        assert!(!store.has_snapshot("9"));
        assert!(store.get("9").is_empty());
    }

    #[test]
    fn commit_dedupes_by_id_and_keeps_first_attributes() {
        let mut store = TimelineStore::default();
        store.install("1", Vec::new());
        assert!(store.commit("1", message("a", 0)));

        let mut duplicate = message("a", 60);
        duplicate.text = "changed".to_owned();
        assert!(!store.commit("1", duplicate));

        assert_eq!(store.get("1").len(), 1);
        assert_eq!(store.get("1")[0].text, "body a");
    }

    #[test]
    fn commit_inserts_in_timestamp_order() {
        let mut store = TimelineStore::default();
        store.install("1", Vec::new());
        store.commit("1", message("late", 30));
        store.commit("1", message("early", 10));
        store.commit("1", message("tie", 30));

        let ids: Vec<&str> = store.get("1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late", "tie"]);
    }

    #[test]
    fn trims_oldest_when_over_max_items() {
        let mut store = TimelineStore::new(2);
        store.install("1", Vec::new());
        store.commit("1", message("$1", 1));
        store.commit("1", message("$2", 2));
        store.commit("1", message("$3", 3));

        let ids: Vec<&str> = store.get("1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["$2", "$3"]);
    }

    #[test]
    fn remove_returns_the_removed_message() {
        let mut store = TimelineStore::default();
        store.install("1", vec![message("a", 0), message("b", 1)]);

        let removed = store.remove("1", "a").expect("a should exist");
        assert_eq!(removed.id, "a");
        assert!(store.remove("1", "a").is_none());
        assert!(store.remove("2", "b").is_none());
        assert!(store.contains("1", "b"));
    }
}
