//! Text rendering of the chat surfaces from published topic snapshots.

use std::fmt;

use chat_core::{ChannelView, InjectionState, Message, RecentEntry};
use chrono::{DateTime, Utc};

/// Number of recent-activity entries shown in the sidebar preview.
pub const RECENT_PREVIEW_LIMIT: usize = 5;
const PROGRESS_BAR_WIDTH: usize = 20;
const PREVIEW_TEXT_MAX_CHARS: usize = 48;

/// Sidebar channel row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarRow {
    pub channel_id: String,
    pub label: String,
    pub is_private: bool,
    pub unread: bool,
    pub is_open: bool,
}

/// Recent-activity preview row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentRow {
    pub channel_label: String,
    pub user: String,
    pub text: String,
    pub time: String,
}

/// Timeline message row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub user: String,
    pub text: String,
    pub time: String,
    pub is_own: bool,
    pub is_pending: bool,
}

/// Everything the client would show at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSnapshot {
    pub progress_label: String,
    pub progress_percent: f64,
    pub sidebar: Vec<SidebarRow>,
    pub recent: Vec<RecentRow>,
    pub open_channel: Option<SidebarRow>,
    pub timeline: Vec<MessageRow>,
}

impl ScreenSnapshot {
    pub fn build(
        channels: &[ChannelView],
        recent: &[RecentEntry],
        progress: &InjectionState,
        timeline: &[Message],
        own_user: &str,
    ) -> Self {
        let sidebar = sidebar_rows(channels);
        let open_channel = sidebar.iter().find(|row| row.is_open).cloned();
        Self {
            progress_label: progress_label(progress),
            progress_percent: progress.progress_percent,
            recent: recent_rows(recent, channels, RECENT_PREVIEW_LIMIT),
            timeline: if open_channel.is_some() {
                message_rows(timeline, own_user)
            } else {
                Vec::new()
            },
            sidebar,
            open_channel,
        }
    }
}

pub fn sidebar_rows(channels: &[ChannelView]) -> Vec<SidebarRow> {
    channels
        .iter()
        .map(|view| SidebarRow {
            channel_id: view.channel.id.clone(),
            label: view.channel.name.clone(),
            is_private: view.channel.is_private,
            unread: view.unread,
            is_open: view.is_open,
        })
        .collect()
}

/// First `limit` ledger entries, labelled with their channel's name.
pub fn recent_rows(
    entries: &[RecentEntry],
    channels: &[ChannelView],
    limit: usize,
) -> Vec<RecentRow> {
    entries
        .iter()
        .take(limit)
        .map(|entry| RecentRow {
            channel_label: channel_label(channels, &entry.channel_id),
            user: entry.message.user.clone(),
            text: truncate_chars(&entry.message.text, PREVIEW_TEXT_MAX_CHARS),
            time: clock_time(entry.message.timestamp),
        })
        .collect()
}

pub fn message_rows(messages: &[Message], own_user: &str) -> Vec<MessageRow> {
    messages
        .iter()
        .map(|message| MessageRow {
            user: message.user.clone(),
            text: message.text.clone(),
            time: clock_time(message.timestamp),
            is_own: message.user == own_user,
            is_pending: message.pending,
        })
        .collect()
}

/// Countdown caption: `Initializing...` while idle, else whole seconds left.
pub fn progress_label(state: &InjectionState) -> String {
    if state.active {
        format!("{}s", state.seconds_remaining)
    } else {
        "Initializing...".to_owned()
    }
}

fn channel_label(channels: &[ChannelView], channel_id: &str) -> String {
    channels
        .iter()
        .find(|view| view.channel.id == channel_id)
        .map(|view| view.channel.name.clone())
        .unwrap_or_else(|| format!("channel-{channel_id}"))
}

fn clock_time(at: DateTime<Utc>) -> String {
    at.format("%H:%M:%S").to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

fn progress_bar(percent: f64) -> String {
    let fraction = percent.clamp(0.0, 100.0) / 100.0;
    let filled = (fraction * PROGRESS_BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

impl fmt::Display for ScreenSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "next message {} {}",
            progress_bar(self.progress_percent),
            self.progress_label
        )?;

        writeln!(f, "channels")?;
        for row in &self.sidebar {
            let cursor = if row.is_open { '>' } else { ' ' };
            let sigil = if row.is_private { '*' } else { '#' };
            let badge = if row.unread { "  (new)" } else { "" };
            writeln!(f, " {cursor} {sigil}{}{badge}", row.label)?;
        }

        writeln!(f, "recent activity")?;
        if self.recent.is_empty() {
            writeln!(f, "   (nothing yet)")?;
        }
        for row in &self.recent {
            writeln!(
                f,
                "   {} #{} {}: {}",
                row.time, row.channel_label, row.user, row.text
            )?;
        }

        if let Some(open) = &self.open_channel {
            writeln!(f, "#{}", open.label)?;
            for row in &self.timeline {
                let state = if row.is_pending { " (sending)" } else { "" };
                let author = if row.is_own { "you" } else { row.user.as_str() };
                writeln!(f, "   {} {author}: {}{state}", row.time, row.text)?;
            }
        }
        Ok(())
    }
}
