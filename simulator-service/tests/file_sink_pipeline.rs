use std::{sync::Arc, time::Duration};

use rust_client::domain::Reading;
use simulator_service::{
    registry,
    sinks::{FileLogSink, ReadingSink},
    DispatchEngine, Stats,
};
use time::macros::datetime;

#[tokio::test]
async fn tick_appends_one_ndjson_line_per_meter_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("meter_readings.jsonl");
    let sink = FileLogSink::open(&path).await.unwrap();

    let sinks: Vec<Arc<dyn ReadingSink>> = vec![Arc::new(sink)];
    let engine = Arc::new(DispatchEngine::new(
        sinks,
        Arc::new(Stats::new()),
        Duration::from_secs(2),
    ));
    let fleet = registry::synthesize(4);

    engine.run_tick(&fleet, datetime!(2024-06-01 13:00:00 UTC)).await;
    engine.run_tick(&fleet, datetime!(2024-06-01 13:00:30 UTC)).await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let readings: Vec<Reading> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(readings.len(), 8);
    assert_eq!(engine.stats().report().file_saves, 8);
    let first_tick = readings
        .iter()
        .filter(|r| r.timestamp == datetime!(2024-06-01 13:00:00 UTC))
        .count();
    assert_eq!(first_tick, 4);

    engine.shutdown().await;
}
