//! Infrastructure failures: the failed-retry topic and the dead-letter cap.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use schoolbus::{Datum, ErrorKind};

use crate::support::{config, eventually, TestBus};

fn school(name: &str, code: &str) -> Vec<Datum> {
    vec![Datum::from(json!({ "name": name, "code": code }))]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outage_is_retried_until_the_store_recovers() {
    let bus = Arc::new(TestBus::start(config()));
    bus.store.set_available(false);

    let caller = {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move {
            bus.producer
                .send_command("schools", "createSchool", school("X", "AB12"))
                .await
        })
    };

    // The caller is not told about infrastructure failures
    let failed_topic = bus.config.failed_topic();
    assert!(eventually(|| bus.broker.len(&failed_topic) >= 2).await);
    assert_eq!(bus.producer.pending_len(), 1);

    bus.store.set_available(true);
    let reply = caller.await.unwrap().unwrap();
    assert!(reply.done);
    assert_eq!(reply.data, Datum::from(json!({ "_id": "X_AB12" })));
    assert_eq!(bus.store.count("schools"), 1);

    let retried = bus.envelopes(&failed_topic);
    assert_eq!(retried[0].attempts, 1);
    assert_eq!(retried[0].error.as_ref().unwrap().kind, ErrorKind::Internal);
    assert!(retried.windows(2).all(|w| w[1].attempts == w[0].attempts + 1));
}

#[tokio::test]
async fn exhausted_retries_reject_the_caller_and_dead_letter() {
    let bus = TestBus::start(config().with_max_retry_attempts(3));
    bus.store.set_available(false);

    let failure = bus
        .producer
        .send_command("schools", "createSchool", school("X", "AB12"))
        .await
        .unwrap_err();

    assert_eq!(failure.remote().unwrap().kind, ErrorKind::Internal);
    let dead = bus.envelopes(&bus.config.dead_letter_topic());
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 3);
    assert_eq!(bus.broker.len(&bus.config.failed_topic()), 2);

    let stats = bus.stop();
    assert_eq!(stats.primary.requeued, 1);
    assert_eq!(stats.retry.requeued, 1);
    assert_eq!(stats.retry.dead_lettered, 1);
}

#[tokio::test]
async fn retry_delay_throttles_a_broken_command() {
    let bus = TestBus::start(config().with_retry_delay(Duration::from_millis(100)));
    bus.store.set_available(false);

    bus.producer
        .send_command_async("schools", "createSchool", school("X", "AB12"))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(350)).await;
    let forwarded = bus.broker.len(&bus.config.failed_topic());
    // One from the primary topic, then at most one per delay
    assert!((2..=5).contains(&forwarded), "forwarded {}", forwarded);

    bus.stop();
}
