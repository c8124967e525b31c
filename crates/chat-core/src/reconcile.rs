use std::collections::HashSet;

use tracing::{debug, trace};

use crate::{pending::PendingBuffer, timeline::TimelineStore, types::Message};

/// Result of routing one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Channel history is still loading; the message waits in the pending buffer.
    Buffered,
    /// Merged into the channel timeline. `changed` is false for a pure duplicate.
    Committed { changed: bool },
}

/// Merge message sources into one id-unique, timestamp-ascending sequence.
///
/// Sources are scanned in order and the first message seen for an id wins.
/// The sort is stable, so equal timestamps keep scan order.
pub fn merge_messages<I>(sources: I) -> Vec<Message>
where
    I: IntoIterator<Item = Message>,
{
    let mut seen = HashSet::new();
    let mut merged: Vec<Message> = sources
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    merged
}

/// Routes messages between the pending buffer and the timeline store.
///
/// Every timeline mutation for a channel goes through one of these two
/// entry points, each of which reads the latest committed state before
/// writing.
#[derive(Debug)]
pub struct Reconciler<'a> {
    timelines: &'a mut TimelineStore,
    pending: &'a mut PendingBuffer,
}

impl<'a> Reconciler<'a> {
    pub fn new(timelines: &'a mut TimelineStore, pending: &'a mut PendingBuffer) -> Self {
        Self { timelines, pending }
    }

    /// Route one incoming message (injected, optimistic or confirmed).
    pub fn reconcile(&mut self, channel_id: &str, incoming: Message) -> ReconcileOutcome {
        if !self.timelines.has_snapshot(channel_id) {
            trace!(%channel_id, message_id = %incoming.id, "buffering message until history loads");
            self.pending.push(channel_id, incoming);
            return ReconcileOutcome::Buffered;
        }

        // Leftovers from before the snapshot go first so they win id ties.
        let mut changed = false;
        for buffered in self.pending.drain(channel_id) {
            changed |= self.timelines.commit(channel_id, buffered);
        }
        changed |= self.timelines.commit(channel_id, incoming);
        ReconcileOutcome::Committed { changed }
    }

    /// Install fetched history, folding in anything buffered meanwhile.
    ///
    /// Messages already in the timeline from an earlier load are kept.
    pub fn on_authoritative_load(&mut self, channel_id: &str, server_messages: Vec<Message>) {
        let drained = self.pending.drain(channel_id);
        let existing = self.timelines.get(channel_id).to_vec();
        debug!(
            %channel_id,
            server = server_messages.len(),
            buffered = drained.len(),
            existing = existing.len(),
            "installing authoritative history"
        );

        let merged = merge_messages(server_messages.into_iter().chain(existing).chain(drained));
        self.timelines.install(channel_id, merged);
    }

    /// Remove a provisional message from wherever it currently lives.
    pub fn withdraw(&mut self, channel_id: &str, message_id: &str) -> Option<Message> {
        self.timelines
            .remove(channel_id, message_id)
            .or_else(|| self.pending.remove(channel_id, message_id))
    }
}
