use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::ChatError,
    types::{Message, SendAck},
};

/// Id prefix of optimistic (not yet confirmed) messages.
pub const PROVISIONAL_ID_PREFIX: &str = "local-";

/// Send result before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Server accepted the message and assigned its id and timestamp.
    Confirmed { message: Message },
    /// Send failed for good (after any retries).
    Failed { error: ChatError },
}

/// Build the optimistic entry shown while a send is in flight.
///
/// Its id doubles as the correlation id used to replace it later.
pub fn provisional_message(
    channel_id: &str,
    text: &str,
    user: &str,
    now: DateTime<Utc>,
) -> Message {
    Message {
        id: format!("{PROVISIONAL_ID_PREFIX}{}", Uuid::new_v4()),
        text: text.to_owned(),
        user: user.to_owned(),
        timestamp: now,
        channel_id: channel_id.to_owned(),
        pending: true,
    }
}

/// Convert a send outcome to a stable [`SendAck`].
pub fn normalize_send_outcome(
    correlation_id: impl Into<String>,
    channel_id: impl Into<String>,
    outcome: &SendOutcome,
) -> SendAck {
    let correlation_id = correlation_id.into();
    let channel_id = channel_id.into();
    match outcome {
        SendOutcome::Confirmed { message } => SendAck {
            correlation_id,
            channel_id,
            message_id: Some(message.id.clone()),
            error_code: None,
        },
        SendOutcome::Failed { error } => SendAck {
            correlation_id,
            channel_id,
            message_id: None,
            error_code: Some(error.code.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_messages_are_pending_with_local_ids() {
        let msg = provisional_message("1", "hello", "John Doe", Utc::now());
        assert!(msg.pending);
        assert!(msg.id.starts_with(PROVISIONAL_ID_PREFIX));
        assert_eq!(msg.user, "John Doe");
    }

    #[test]
    fn maps_confirmation_to_ack() {
        let mut confirmed = provisional_message("1", "hello", "John Doe", Utc::now());
        confirmed.id = "srv-1".to_owned();
        confirmed.pending = false;

        let ack = normalize_send_outcome(
            "local-1",
            "1",
            &SendOutcome::Confirmed { message: confirmed },
        );
        assert_eq!(ack.correlation_id, "local-1");
        assert_eq!(ack.message_id.as_deref(), Some("srv-1"));
        assert!(ack.is_success());
    }

    #[test]
    fn maps_failure_to_ack_with_stable_error_code() {
        let ack = normalize_send_outcome(
            "local-2",
            "3",
            &SendOutcome::Failed {
                error: ChatError::send_failed("offline"),
            },
        );
        assert_eq!(ack.channel_id, "3");
        assert_eq!(ack.message_id, None);
        assert_eq!(ack.error_code.as_deref(), Some("send_failed"));
        assert!(!ack.is_success());
    }
}
