use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{clock::RandomSource, types::Message};

/// Display names used for simulated authors.
pub const FAKE_USERS: [&str; 12] = [
    "Alex Turner",
    "Emma Watson",
    "Ryan Gosling",
    "Sophie Chen",
    "Marcus Johnson",
    "Lisa Park",
    "David Kim",
    "Rachel Green",
    "Chris Evans",
    "Maya Patel",
    "Jordan Smith",
    "Nina Rodriguez",
];

/// Bodies used for simulated messages.
pub const FAKE_MESSAGES: [&str; 20] = [
    "Anyone up for lunch today?",
    "Great work on the presentation!",
    "Just finished the quarterly review",
    "The new design looks fantastic",
    "Has anyone seen the latest analytics?",
    "Coffee break in 10 minutes?",
    "I love the new feature we shipped",
    "The client meeting went really well",
    "Working on the bug fixes now",
    "The team sync was productive",
    "Just deployed the hotfix",
    "Thanks for the quick turnaround",
    "The performance improvements are noticeable",
    "Great job everyone!",
    "Weekend plans anyone?",
    "The documentation is very helpful",
    "Just merged the PR",
    "The tests are all passing now",
    "Really excited about this project",
    "The user feedback has been positive",
];

/// Id prefix of simulated messages.
pub const FAKE_ID_PREFIX: &str = "fake-";

/// Pick one channel uniformly. Returns `None` for an empty set.
pub fn pick_channel<'a>(channels: &'a [String], rng: &mut dyn RandomSource) -> Option<&'a str> {
    if channels.is_empty() {
        return None;
    }
    Some(channels[rng.pick_index(channels.len())].as_str())
}

/// Build one simulated message from the fixed pools.
pub fn synthesize_message(
    channel_id: &str,
    now: DateTime<Utc>,
    rng: &mut dyn RandomSource,
) -> Message {
    let user = FAKE_USERS[rng.pick_index(FAKE_USERS.len())];
    let text = FAKE_MESSAGES[rng.pick_index(FAKE_MESSAGES.len())];
    Message {
        id: format!("{FAKE_ID_PREFIX}{}", Uuid::new_v4()),
        text: text.to_owned(),
        user: user.to_owned(),
        timestamp: now,
        channel_id: channel_id.to_owned(),
        pending: false,
    }
}
