use std::future::Future;

use crate::{
    error::ChatError,
    types::{ChannelSummary, Message},
};

/// Remote side of the chat: channel directory, history and message sends.
///
/// Implementations are shared across spawned tasks, so the returned futures
/// must be `Send`.
pub trait ChatBackend: Send + Sync + 'static {
    /// Static channel directory.
    fn list_channels(&self) -> impl Future<Output = Vec<ChannelSummary>> + Send;

    /// Full history of a channel. Unknown channels yield an empty list.
    fn fetch_channel_history(&self, channel_id: &str)
    -> impl Future<Output = Vec<Message>> + Send;

    /// Submit a message. The server assigns its id and timestamp.
    fn send_message(
        &self,
        channel_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<Message, ChatError>> + Send;
}
