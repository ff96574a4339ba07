//! What the caller sees: timeouts, routing failures, fire-and-forget.

use std::time::{Duration, Instant};

use serde_json::json;
use schoolbus::{CommandReply, Consumer, Datum, Envelope, ErrorKind, Route};

use crate::support::{config, eventually, TestBus};

#[tokio::test]
async fn no_executor_means_a_degraded_reply_after_the_timeout() {
    let bus = TestBus::idle(config().with_command_timeout(Duration::from_millis(100)));
    let args = vec![Datum::from(json!({ "name": "X", "code": "AB12" }))];

    let started = Instant::now();
    let reply = bus
        .producer
        .send_command("schools", "createSchool", args.clone())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(
        reply,
        CommandReply {
            done: false,
            data: Datum::Array(args),
        }
    );
    assert_eq!(bus.producer.pending_len(), 0);
    // Still on the log: the command may be applied later
    assert_eq!(bus.broker.len(&bus.config.commands_topic), 1);
}

#[tokio::test]
async fn unknown_service_or_method_is_rejected_when_keyed() {
    let bus = TestBus::start(config());

    let unknown_service = bus
        .producer
        .send_command("teachers", "hire", vec![Datum::from("t1")])
        .await
        .unwrap_err();
    assert_eq!(unknown_service.remote().unwrap().kind, ErrorKind::Routing);

    let unknown_method = bus
        .producer
        .send_command("schools", "demolish", vec![])
        .await
        .unwrap_err();
    assert_eq!(unknown_method.remote().unwrap().kind, ErrorKind::Routing);
    assert!(bus.broker.is_empty(&bus.config.failed_topic()));
}

#[tokio::test]
async fn keyless_unknown_route_has_no_side_effect() {
    let bus = TestBus::start(config());

    let route = Route::new("teachers", "hire").unwrap();
    bus.transport
        .send(
            &bus.config.commands_topic,
            &Envelope::command(&route, vec![Datum::from("t1")], None),
        )
        .unwrap();

    let consumer = bus
        .broker
        .consumer(&bus.config.consumer_group, &bus.config.commands_topic);
    assert!(eventually(|| consumer.committed(0).unwrap() == 1).await);

    let stats = bus.stop();
    assert_eq!(stats.primary.dropped, 1);
    assert_eq!(stats.primary.rejected, 0);
}

#[tokio::test]
async fn malformed_records_are_skipped_and_committed() {
    let bus = TestBus::start(config());

    let mut dataless = Envelope::command(
        &Route::new("schools", "createSchool").unwrap(),
        vec![],
        Some("k".into()),
    );
    dataless.data = None;
    bus.transport
        .send(&bus.config.commands_topic, &dataless)
        .unwrap();
    let mut garbage = Envelope::update("noise", vec![]);
    garbage.event = "not-a-route".into();
    bus.transport
        .send(&bus.config.commands_topic, &garbage)
        .unwrap();

    let consumer = bus
        .broker
        .consumer(&bus.config.consumer_group, &bus.config.commands_topic);
    assert!(eventually(|| consumer.committed(0).unwrap() == 2).await);

    let stats = bus.stop();
    assert_eq!(stats.primary.skipped, 1);
    assert_eq!(stats.primary.dropped, 1);
}

#[test]
fn fire_and_forget_never_waits_or_registers() {
    let bus = TestBus::idle(config());

    let started = Instant::now();
    for i in 0..1_000i64 {
        bus.producer
            .send_command_async("audit", "record", vec![Datum::from(i)])
            .unwrap();
    }

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(bus.producer.pending_len(), 0);
    assert_eq!(bus.broker.len(&bus.config.commands_topic), 1_000);
    assert!(bus
        .envelopes(&bus.config.commands_topic)
        .iter()
        .all(|e| e.key.is_some()));
}

#[tokio::test]
async fn batched_commands_share_a_key_and_all_run() {
    let bus = TestBus::start(config());

    let sent = bus
        .producer
        .send_many_commands_async(
            "schools",
            "createSchool",
            vec![
                vec![Datum::from(json!({ "name": "A", "code": "0001" }))],
                vec![Datum::from(json!({ "name": "B", "code": "0002" }))],
                vec![Datum::from(json!({ "name": "C", "code": "0003" }))],
            ],
        )
        .unwrap();

    assert!(sent.iter().all(|e| e.key == sent[0].key));
    assert!(eventually(|| bus.store.count("schools") == 3).await);
}
