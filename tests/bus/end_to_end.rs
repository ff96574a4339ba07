//! Commands sent by a producer, executed on worker threads, answered through
//! the correlator.

use chrono::{TimeZone, Utc};
use serde_json::json;
use schoolbus::notifier::{COURSE_CREATED, COURSE_ENROLLMENT, USER_ENROLLED};
use schoolbus::{CommandFailure, CommandReply, Datum, ErrorKind};

use crate::handlers::record::RECORDED;
use crate::support::{config, eventually, TestBus};

fn school(name: &str, code: &str) -> Vec<Datum> {
    vec![Datum::from(json!({ "name": name, "code": code }))]
}

#[tokio::test]
async fn create_school_resolves_with_its_id() {
    let bus = TestBus::start(config());

    let reply = bus
        .producer
        .send_command("schools", "createSchool", school("X", "AB12"))
        .await
        .unwrap();

    assert_eq!(
        reply,
        CommandReply {
            done: true,
            data: Datum::from(json!({ "_id": "X_AB12" })),
        }
    );
    assert_eq!(bus.store.document("schools", "X_AB12").unwrap()["name"], "X");
    assert_eq!(bus.producer.pending_len(), 0);

    // The handler's follow-up command ran too
    assert!(eventually(|| bus.updates(RECORDED).len() == 1).await);

    let stats = bus.stop();
    assert_eq!(stats.primary.committed, 2);
    assert_eq!(stats.primary.errors, 0);
}

#[tokio::test]
async fn replayed_create_is_a_conflict_not_a_second_write() {
    let bus = TestBus::start(config());

    bus.producer
        .send_command("schools", "createSchool", school("X", "AB12"))
        .await
        .unwrap();
    let failure = bus
        .producer
        .send_command("schools", "createSchool", school("X", "AB12"))
        .await
        .unwrap_err();

    let remote = failure.remote().unwrap();
    assert_eq!(remote.kind, ErrorKind::Conflict);
    assert_eq!(remote.message, "schools X_AB12 already exists");
    assert_eq!(bus.store.count("schools"), 1);
    assert!(bus.broker.is_empty(&bus.config.failed_topic()));
}

#[tokio::test]
async fn business_errors_are_rejected() {
    let bus = TestBus::start(config());

    let missing = bus
        .producer
        .send_command("schools", "getSchool", vec![Datum::from("nowhere_0000")])
        .await
        .unwrap_err();
    assert_eq!(missing.remote().unwrap().kind, ErrorKind::NotFound);

    let invalid = bus
        .producer
        .send_command("schools", "createSchool", school(" ", "AB12"))
        .await
        .unwrap_err();
    assert!(matches!(invalid, CommandFailure::Rejected(ref e) if e.kind == ErrorKind::Validation));

    let malformed = bus
        .producer
        .send_command("schools", "createSchool", vec![])
        .await
        .unwrap_err();
    assert_eq!(malformed.remote().unwrap().kind, ErrorKind::Validation);
}

#[tokio::test]
async fn dates_arrive_as_dates() {
    let bus = TestBus::start(config());
    let starts_at = Utc.with_ymd_and_hms(2024, 9, 1, 8, 30, 0).unwrap();

    let reply = bus
        .producer
        .send_command(
            "courses",
            "createCourse",
            vec![Datum::from(json!({
                "_id": "c1",
                "title": "Algebra",
                "startsAt": Datum::from(starts_at).to_json(),
            }))],
        )
        .await
        .unwrap();

    assert!(reply.done);
    assert_eq!(
        reply.data.get("startsAt").and_then(Datum::as_date),
        Some(&starts_at)
    );
    assert_eq!(bus.updates(COURSE_CREATED).len(), 1);
}

#[tokio::test]
async fn enrollment_commits_together_and_publishes_one_batch() {
    let bus = TestBus::start(config());
    let starts_at = Utc.with_ymd_and_hms(2024, 9, 1, 8, 30, 0).unwrap();

    bus.producer
        .send_command(
            "courses",
            "createCourse",
            vec![Datum::from(json!({
                "_id": "c1",
                "title": "Algebra",
                "startsAt": Datum::from(starts_at).to_json(),
            }))],
        )
        .await
        .unwrap();

    let reply = bus
        .producer
        .send_command(
            "courses",
            "enroll",
            vec![Datum::from("c1"), Datum::from(json!(["u1", "u2", "u1"]))],
        )
        .await
        .unwrap();

    assert_eq!(reply.data, Datum::from(json!({ "courseId": "c1", "added": ["u1", "u2"] })));
    assert_eq!(bus.store.count("enrollments"), 2);
    assert_eq!(
        bus.store.document("courses", "c1").unwrap()["users"],
        json!(["u1", "u2"])
    );
    assert_eq!(bus.updates(USER_ENROLLED).len(), 2);
    assert_eq!(bus.updates(COURSE_ENROLLMENT).len(), 1);
    assert!(bus.updates(USER_ENROLLED).iter().all(|e| e.key.is_none()));

    // Enrolling the same users again changes nothing
    let again = bus
        .producer
        .send_command(
            "courses",
            "enroll",
            vec![Datum::from("c1"), Datum::from(json!(["u2"]))],
        )
        .await
        .unwrap();
    assert_eq!(again.data.get("added"), Some(&Datum::from(json!([]))));
    assert_eq!(bus.updates(COURSE_ENROLLMENT).len(), 1);
}

#[tokio::test]
async fn every_unit_of_work_is_disposed() {
    let bus = TestBus::start(config());

    let _ = bus
        .producer
        .send_command("schools", "createSchool", school("Y", "CD34"))
        .await;
    let _ = bus
        .producer
        .send_command("schools", "createSchool", school("Y", "CD34"))
        .await;
    let _ = bus
        .producer
        .send_command("schools", "getSchool", vec![Datum::from("ghost")])
        .await;
    let _ = bus
        .producer
        .send_command("courses", "enroll", vec![Datum::from("ghost"), Datum::from(json!([]))])
        .await;

    let store = bus.store.clone();
    let stats = bus.stop();
    assert!(stats.primary.processed() >= 4);
    assert_eq!(store.open_units(), 0);
}

#[cfg(feature = "emitter")]
#[tokio::test]
async fn works_over_the_event_emitter() {
    use std::sync::Arc;

    use schoolbus::EmitterCorrelator;

    let bus = TestBus::start_with(config(), Arc::new(EmitterCorrelator::new()));

    let reply = bus
        .producer
        .send_command("schools", "createSchool", school("Z", "EF56"))
        .await
        .unwrap();
    assert_eq!(reply.data, Datum::from(json!({ "_id": "Z_EF56" })));

    let failure = bus
        .producer
        .send_command("schools", "createSchool", school("Z", "EF56"))
        .await
        .unwrap_err();
    assert_eq!(failure.remote().unwrap().kind, ErrorKind::Conflict);
}
