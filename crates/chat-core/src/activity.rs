//! Recent-activity feed, visit tracking, unread flags and sidebar ordering.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{ChannelSummary, ChannelView, Message, RecentEntry};

/// Default capacity of the recent-activity feed.
pub const DEFAULT_RECENT_CAPACITY: usize = 10;

/// Bounded most-recent-first feed of live messages across all channels.
#[derive(Debug, Clone)]
pub struct RecentActivityLedger {
    entries: Vec<RecentEntry>,
    capacity: usize,
}

impl Default for RecentActivityLedger {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

impl RecentActivityLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a committed message. Returns `false` if its id is already listed.
    pub fn record(&mut self, channel_id: &str, message: Message) -> bool {
        if self
            .entries
            .iter()
            .any(|e| e.message.id == message.id && e.channel_id == channel_id)
        {
            return false;
        }

        // Newest first; equal timestamps put the latest arrival first.
        let index = self
            .entries
            .partition_point(|e| e.message.timestamp > message.timestamp);
        self.entries.insert(
            index,
            RecentEntry {
                channel_id: channel_id.to_owned(),
                message,
            },
        );
        self.entries.truncate(self.capacity);
        true
    }

    pub fn entries(&self) -> &[RecentEntry] {
        &self.entries
    }

    pub fn for_channel<'a>(&'a self, channel_id: &'a str) -> impl Iterator<Item = &'a RecentEntry> {
        self.entries.iter().filter(move |e| e.channel_id == channel_id)
    }

    /// Timestamp of the newest entry for a channel.
    pub fn last_activity(&self, channel_id: &str) -> Option<DateTime<Utc>> {
        self.for_channel(channel_id).next().map(|e| e.message.timestamp)
    }
}

/// Last-visit time per channel, in epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitedChannelLedger {
    visits: BTreeMap<String, i64>,
}

impl VisitedChannelLedger {
    pub fn mark(&mut self, channel_id: &str, at_ms: i64) {
        self.visits.insert(channel_id.to_owned(), at_ms);
    }

    pub fn last_visit(&self, channel_id: &str) -> Option<i64> {
        self.visits.get(channel_id).copied()
    }

    pub fn visits(&self) -> &BTreeMap<String, i64> {
        &self.visits
    }
}

/// Whether a channel should show the unread indicator.
///
/// The open channel is never flagged. Otherwise a channel is unread when the
/// feed holds one of its messages and it was either never visited or that
/// message is newer than the last visit.
pub fn compute_unread(
    recent: &RecentActivityLedger,
    visited: &VisitedChannelLedger,
    channel_id: &str,
    open_channel_id: Option<&str>,
) -> bool {
    if open_channel_id == Some(channel_id) {
        return false;
    }

    let mut entries = recent.for_channel(channel_id).peekable();
    if entries.peek().is_none() {
        return false;
    }

    let Some(last_visit) = visited.last_visit(channel_id) else {
        return true;
    };
    entries.any(|e| e.message.timestamp_ms() > last_visit)
}

/// Sidebar rows ordered by descending last activity.
///
/// Channels with no feed entries sort last; ties keep directory order.
pub fn order_channels(
    directory: &[ChannelSummary],
    recent: &RecentActivityLedger,
    visited: &VisitedChannelLedger,
    open_channel_id: Option<&str>,
) -> Vec<ChannelView> {
    let mut rows: Vec<ChannelView> = directory
        .iter()
        .map(|channel| ChannelView {
            channel: channel.clone(),
            last_activity: recent.last_activity(&channel.id),
            unread: compute_unread(recent, visited, &channel.id, open_channel_id),
            is_open: open_channel_id == Some(channel.id.as_str()),
        })
        .collect();

    rows.sort_by_key(|row| {
        std::cmp::Reverse(row.last_activity.map_or(0, |ts| ts.timestamp_millis()))
    });
    rows
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn message(id: &str, channel_id: &str, offset_secs: i64) -> Message {
        Message {
            id: id.to_owned(),
            text: "Coffee break in 10 minutes?".to_owned(),
            user: "Maya Patel".to_owned(),
            timestamp: t0() + Duration::seconds(offset_secs),
            channel_id: channel_id.to_owned(),
            pending: false,
        }
    }

    fn directory() -> Vec<ChannelSummary> {
        ["general", "random", "dev-team"]
            .iter()
            .enumerate()
            .map(|(i, name)| ChannelSummary {
                id: (i + 1).to_string(),
                name: (*name).to_owned(),
                is_private: false,
            })
            .collect()
    }

    #[test]
    fn ledger_is_newest_first_and_capped() {
        let mut ledger = RecentActivityLedger::new(3);
        for (i, offset) in [5, 1, 9, 3].into_iter().enumerate() {
            ledger.record("1", message(&format!("m{i}"), "1", offset));
        }

        let ids: Vec<&str> = ledger.entries().iter().map(|e| e.message.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m0", "m3"]);
    }

    #[test]
    fn ledger_ignores_repeated_ids() {
        let mut ledger = RecentActivityLedger::default();
        assert!(ledger.record("1", message("a", "1", 0)));
        assert!(!ledger.record("1", message("a", "1", 0)));
        assert_eq!(ledger.entries().len(), 1);
    }

    #[test]
    fn unread_follows_visit_and_open_channel_rules() {
        let mut recent = RecentActivityLedger::default();
        let mut visited = VisitedChannelLedger::default();

        // No activity at all.
        assert!(!compute_unread(&recent, &visited, "2", Some("1")));

        // Visited at T, injected at T+5s.
        visited.mark("2", t0().timestamp_millis());
        recent.record("2", message("fake-1", "2", 5));
        assert!(compute_unread(&recent, &visited, "2", Some("1")));
        assert!(!compute_unread(&recent, &visited, "2", Some("2")));

        // Revisit after the message.
        visited.mark("2", (t0() + Duration::seconds(6)).timestamp_millis());
        assert!(!compute_unread(&recent, &visited, "2", Some("1")));
    }

    #[test]
    fn never_visited_channel_with_activity_is_unread() {
        let mut recent = RecentActivityLedger::default();
        recent.record("3", message("fake-2", "3", 0));
        assert!(compute_unread(
            &recent,
            &VisitedChannelLedger::default(),
            "3",
            None
        ));
    }

    #[test]
    fn channels_order_by_latest_activity_with_inactive_last() {
        let mut recent = RecentActivityLedger::default();
        recent.record("3", message("a", "3", 10));
        recent.record("2", message("b", "2", 20));
        let visited = VisitedChannelLedger::default();

        let rows = order_channels(&directory(), &recent, &visited, Some("2"));
        let order: Vec<&str> = rows.iter().map(|r| r.channel.id.as_str()).collect();
        assert_eq!(order, vec!["2", "3", "1"]);
        assert!(rows[0].is_open);
        assert!(!rows[0].unread);
        assert!(rows[1].unread);
        assert_eq!(rows[2].last_activity, None);
    }
}
