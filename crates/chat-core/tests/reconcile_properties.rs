use std::collections::HashSet;

use chat_core::{Message, PendingBuffer, ReconcileOutcome, Reconciler, TimelineStore};
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn base() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T09:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

fn message(id: u8, offset_secs: i64) -> Message {
    Message {
        id: format!("m{id}"),
        text: format!("text {id}"),
        user: "Nina Rodriguez".to_owned(),
        timestamp: base() + Duration::seconds(offset_secs),
        channel_id: "1".to_owned(),
        pending: false,
    }
}

#[derive(Debug, Clone)]
enum Op {
    Reconcile(u8, i64),
    Load(Vec<(u8, i64)>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0_u8..12, -300_i64..300).prop_map(|(id, ts)| Op::Reconcile(id, ts)),
        1 => prop::collection::vec((0_u8..12, -300_i64..300), 0..6).prop_map(Op::Load),
    ]
}

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn timeline_ids_unique_sorted_and_nothing_lost(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut timelines = TimelineStore::default();
        let mut pending = PendingBuffer::new();
        let mut delivered = HashSet::new();

        for op in ops {
            let mut reconciler = Reconciler::new(&mut timelines, &mut pending);
            match op {
                Op::Reconcile(id, ts) => {
                    delivered.insert(format!("m{id}"));
                    reconciler.reconcile("1", message(id, ts));
                }
                Op::Load(batch) => {
                    for (id, _) in &batch {
                        delivered.insert(format!("m{id}"));
                    }
                    let server = batch.into_iter().map(|(id, ts)| message(id, ts)).collect();
                    reconciler.on_authoritative_load("1", server);
                }
            }
        }

        let timeline = timelines.get("1");
        let unique: HashSet<&str> = timeline.iter().map(|m| m.id.as_str()).collect();
        prop_assert_eq!(unique.len(), timeline.len());
        prop_assert!(timeline.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let present: HashSet<String> = timeline
            .iter()
            .chain(pending.get("1"))
            .map(|m| m.id.clone())
            .collect();
        prop_assert_eq!(present, delivered);
        if timelines.has_snapshot("1") {
            prop_assert!(pending.get("1").is_empty());
        }
    }
}

#[test]
fn message_reconciled_during_fetch_survives_the_load() {
    let mut timelines = TimelineStore::default();
    let mut pending = PendingBuffer::new();
    let mut reconciler = Reconciler::new(&mut timelines, &mut pending);

    assert_eq!(reconciler.reconcile("1", message(1, 10)), ReconcileOutcome::Buffered);
    reconciler.on_authoritative_load("1", vec![message(2, 0)]);

    let ids: Vec<&str> = timelines.get("1").iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m1"]);
}

#[test]
fn scenario_channel_one_buffer_then_load() {
    let mut timelines = TimelineStore::default();
    let mut pending = PendingBuffer::new();
    let t = base();
    let a = Message {
        id: "a".to_owned(),
        timestamp: t,
        ..message(0, 0)
    };
    let b = Message {
        id: "b".to_owned(),
        timestamp: t - Duration::seconds(1),
        ..message(0, 0)
    };

    Reconciler::new(&mut timelines, &mut pending).reconcile("1", a);
    assert_eq!(pending.get("1").len(), 1);
    assert!(timelines.get("1").is_empty());
    assert!(!timelines.has_snapshot("1"));

    Reconciler::new(&mut timelines, &mut pending).on_authoritative_load("1", vec![b]);
    let ids: Vec<&str> = timelines.get("1").iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert!(pending.get("1").is_empty());
}
