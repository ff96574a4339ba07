//! The executor keeps partition order.

use schoolbus::{Consumer, Datum};

use crate::handlers::record::RECORDED;
use crate::support::{config, eventually, TestBus};

fn labels(bus: &TestBus) -> Vec<String> {
    bus.updates(RECORDED)
        .iter()
        .filter_map(|e| e.args().first().and_then(Datum::as_str).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn commands_on_one_partition_run_in_publish_order() {
    let bus = TestBus::start(config());

    // Distinct keys, one partition
    bus.producer
        .send_command_async("audit", "record", vec![Datum::from("A")])
        .unwrap();
    bus.producer
        .send_command_async("audit", "record", vec![Datum::from("B")])
        .unwrap();

    assert!(eventually(|| labels(&bus).len() == 2).await);
    assert_eq!(labels(&bus), vec!["A", "B"]);

    let consumer = bus
        .broker
        .consumer(&bus.config.consumer_group, &bus.config.commands_topic);
    assert!(eventually(|| consumer.committed(0).unwrap() == 2).await);
}

#[tokio::test]
async fn long_runs_stay_in_order() {
    let bus = TestBus::start(config());
    let expected: Vec<String> = (0..50).map(|i| format!("entry-{:02}", i)).collect();

    for label in &expected {
        bus.producer
            .send_command_async("audit", "record", vec![Datum::from(label.as_str())])
            .unwrap();
    }

    assert!(eventually(|| labels(&bus).len() == expected.len()).await);
    assert_eq!(labels(&bus), expected);
}
