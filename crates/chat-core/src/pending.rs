use std::collections::HashMap;

use crate::types::Message;

/// Messages that arrived before their channel's authoritative history.
///
/// An entry exists only while it holds at least one message.
#[derive(Debug, Clone, Default)]
pub struct PendingBuffer {
    buffered: HashMap<String, Vec<Message>>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one early arrival for a channel.
    pub fn push(&mut self, channel_id: &str, message: Message) {
        self.buffered
            .entry(channel_id.to_owned())
            .or_default()
            .push(message);
    }

    /// Buffered messages for a channel in arrival order.
    pub fn get(&self, channel_id: &str) -> &[Message] {
        self.buffered
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Take and clear everything buffered for a channel.
    pub fn drain(&mut self, channel_id: &str) -> Vec<Message> {
        self.buffered.remove(channel_id).unwrap_or_default()
    }

    /// Drop one buffered message by id.
    pub fn remove(&mut self, channel_id: &str, message_id: &str) -> Option<Message> {
        let entries = self.buffered.get_mut(channel_id)?;
        let index = entries.iter().position(|m| m.id == message_id)?;
        let removed = entries.remove(index);
        if entries.is_empty() {
            self.buffered.remove(channel_id);
        }
        Some(removed)
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }

    /// Total buffered messages across channels.
    pub fn len(&self) -> usize {
        self.buffered.values().map(Vec::len).sum()
    }
}
