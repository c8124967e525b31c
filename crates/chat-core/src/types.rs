use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat message as held in channel timelines and the activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID. Provisional sends use the `local-` prefix.
    pub id: String,
    /// Display-ready text body.
    pub text: String,
    /// Author display name.
    pub user: String,
    /// Creation time, serialized as RFC 3339.
    pub timestamp: DateTime<Utc>,
    /// Owning channel ID.
    pub channel_id: String,
    /// `true` while an optimistic send awaits server confirmation.
    #[serde(default)]
    pub pending: bool,
}

impl Message {
    /// Timestamp in milliseconds since Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Static channel directory entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Recent-activity ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecentEntry {
    pub channel_id: String,
    pub message: Message,
}

/// Countdown state of the message injection loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InjectionState {
    /// Progress toward the next injected message, `0.0..=100.0`.
    pub progress_percent: f64,
    /// Whole seconds until the next injected message.
    pub seconds_remaining: u64,
    /// Whether the injection loop is running.
    pub active: bool,
}

impl InjectionState {
    /// State reported while injection is disabled.
    pub const IDLE: Self = Self {
        progress_percent: 0.0,
        seconds_remaining: 0,
        active: false,
    };
}

/// Sidebar row: a directory channel plus derived activity flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    pub channel: ChannelSummary,
    /// Timestamp of the newest ledger entry for this channel.
    pub last_activity: Option<DateTime<Utc>>,
    /// Whether the unread indicator should be shown.
    pub unread: bool,
    /// Whether this is the currently open channel.
    pub is_open: bool,
}

/// Normalized outcome of a user send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendAck {
    /// ID of the provisional message the send started with.
    pub correlation_id: String,
    pub channel_id: String,
    /// Confirmed message ID on success.
    pub message_id: Option<String>,
    /// Stable error code on failure.
    pub error_code: Option<String>,
}

impl SendAck {
    pub fn is_success(&self) -> bool {
        self.error_code.is_none()
    }
}

/// Commands accepted by the session runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientCommand {
    /// Fetch authoritative history for a channel unless it is loaded or in flight.
    LoadChannel { channel_id: String },
    /// Navigate into a channel: mark it visited, make it the open channel, load it.
    OpenChannel { channel_id: String },
    /// Record a visit without changing the open channel.
    MarkVisited { channel_id: String },
    /// Start or stop the injection loop.
    SetInjectionEnabled { enabled: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_reads_camel_case_wire_shape_without_pending_flag() {
        let raw = r#"{
            "id": "2",
            "text": "Thanks for the warm welcome!",
            "user": "Jane Smith",
            "timestamp": "2024-01-15T09:15:00Z",
            "channelId": "1"
        }"#;

        let message: Message = serde_json::from_str(raw).expect("message should parse");

        assert_eq!(message.channel_id, "1");
        assert!(!message.pending);
        assert_eq!(message.timestamp_ms(), 1_705_310_100_000);
    }

    #[test]
    fn injection_state_serializes_progress_fields() {
        let state = InjectionState {
            progress_percent: 25.0,
            seconds_remaining: 6,
            active: true,
        };
        let json = serde_json::to_value(state).expect("state should serialize");
        assert_eq!(json["progressPercent"], 25.0);
        assert_eq!(json["secondsRemaining"], 6);
        assert_eq!(json["active"], true);
    }
}
