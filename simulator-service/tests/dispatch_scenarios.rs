mod common;

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use common::{FailingSink, RecordingSink};
use rust_client::domain::MeterRole;
use simulator_service::{
    config::AppConfig,
    registry,
    sinks::{ReadingSink, SinkKind},
    DispatchEngine, OperatingMode, Simulator, Stats,
};
use time::macros::datetime;

fn config_with_meters(n: usize) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.simulation.num_meters = n;
    cfg.simulation.sink_timeout_ms = 500;
    cfg
}

#[tokio::test]
async fn full_mode_tick_reaches_every_sink_once_per_meter() {
    let broker = RecordingSink::new(SinkKind::Broker);
    let store = RecordingSink::new(SinkKind::TimeSeriesStore);
    let file = RecordingSink::new(SinkKind::FileLog);
    let sinks: Vec<Arc<dyn ReadingSink>> = vec![broker.clone(), store.clone(), file.clone()];

    let cfg = config_with_meters(4);
    let fleet = registry::synthesize(4);
    let sim = Simulator::with_parts(cfg, fleet, sinks);
    assert_eq!(sim.mode(), OperatingMode::Full);
    assert_eq!(sim.fleet().len(), 4);

    let report = sim.tick().await;

    assert_eq!(report.readings, 4);
    assert_eq!(report.stored, 4);
    assert_eq!(report.undelivered, 0);
    assert_eq!(broker.count(), 4);
    assert_eq!(store.count(), 4);
    assert_eq!(file.count(), 4);

    let snap = sim.report();
    assert_eq!(snap.total_readings, 4);
    assert_eq!(snap.broker_sends, 4);
    assert_eq!(snap.store_inserts, 4);
    assert_eq!(snap.file_saves, 4);
    assert_eq!(snap.ticks, 1);

    let expected: Vec<String> = (1..=4).map(|n| format!("SIM_METER_{n:03}")).collect();
    assert_eq!(broker.meter_ids(), expected);
}

#[tokio::test]
async fn standalone_tick_counts_readings_without_successes() {
    let cfg = config_with_meters(2);
    let fleet = registry::synthesize(2);
    let sim = Simulator::with_parts(cfg, fleet, Vec::new());
    assert_eq!(sim.mode(), OperatingMode::Standalone);

    let report = sim.tick().await;

    assert_eq!(report.readings, 2);
    assert_eq!(report.stored, 0);
    let snap = sim.report();
    assert_eq!(snap.total_readings, 2);
    for kind in SinkKind::ALL {
        assert_eq!(snap.successes(kind), 0);
    }
    sim.shutdown().await;
}

#[tokio::test]
async fn failing_sink_is_isolated_from_the_others() {
    let broker = FailingSink::new(SinkKind::Broker);
    let store = RecordingSink::new(SinkKind::TimeSeriesStore);
    let file = RecordingSink::new(SinkKind::FileLog);
    let sinks: Vec<Arc<dyn ReadingSink>> = vec![broker.clone(), store.clone(), file.clone()];
    let sim = Simulator::with_parts(config_with_meters(3), registry::synthesize(3), sinks);

    let report = sim.tick().await;

    assert_eq!(report.stored, 3);
    // Broker flush is refused; the tick still completes.
    assert_eq!(report.flush_failures, 1);
    assert_eq!(broker.attempts.load(Ordering::SeqCst), 3);
    let snap = sim.report();
    assert_eq!(snap.broker_sends, 0);
    assert_eq!(snap.store_inserts, 3);
    assert_eq!(snap.file_saves, 3);
}

#[tokio::test]
async fn all_sinks_failing_still_processes_every_meter() {
    let broker = FailingSink::new(SinkKind::Broker);
    let file = FailingSink::new(SinkKind::FileLog);
    let sinks: Vec<Arc<dyn ReadingSink>> = vec![broker.clone(), file.clone()];
    let sim = Simulator::with_parts(config_with_meters(5), registry::synthesize(5), sinks);
    assert_eq!(sim.mode(), OperatingMode::Hybrid);

    let report = sim.tick().await;

    assert_eq!(report.readings, 5);
    assert_eq!(report.undelivered, 5);
    assert_eq!(broker.attempts.load(Ordering::SeqCst), 5);
    assert_eq!(file.attempts.load(Ordering::SeqCst), 5);
    assert_eq!(sim.report().undelivered, 5);
}

#[tokio::test]
async fn panicking_sink_only_fails_its_own_delivery() {
    let file = RecordingSink::new(SinkKind::FileLog);
    let crashing = FailingSink::panicking_on(SinkKind::Broker, "SIM_METER_002");
    let sinks: Vec<Arc<dyn ReadingSink>> = vec![file.clone(), crashing.clone()];
    let sim = Simulator::with_parts(config_with_meters(4), registry::synthesize(4), sinks);

    let report = sim.tick().await;

    assert_eq!(report.skipped_meters, 0);
    assert_eq!(report.readings, 4);
    assert_eq!(report.stored, 4);
    assert_eq!(file.count(), 4);
    assert!(file.meter_ids().contains(&"SIM_METER_002".to_string()));
    assert_eq!(crashing.attempts.load(Ordering::SeqCst), 4);

    let snap = sim.report();
    assert_eq!(snap.total_readings, 4);
    assert_eq!(snap.file_saves, 4);
    assert_eq!(snap.broker_sends, 0);
    assert_eq!(snap.ticks, 1);
}

#[tokio::test]
async fn panicking_sink_listed_first_does_not_block_later_sinks() {
    let crashing = FailingSink::panicking_on(SinkKind::Broker, "SIM_METER_002");
    let file = RecordingSink::new(SinkKind::FileLog);
    let sinks: Vec<Arc<dyn ReadingSink>> = vec![crashing, file.clone()];
    let sim = Simulator::with_parts(config_with_meters(4), registry::synthesize(4), sinks);

    let report = sim.tick().await;

    assert_eq!(report.skipped_meters, 0);
    assert_eq!(file.count(), 4);
    assert_eq!(sim.report().file_saves, 4);
}

#[tokio::test]
async fn flush_runs_once_per_tick_after_all_readings() {
    let broker = RecordingSink::new(SinkKind::Broker);
    let sinks: Vec<Arc<dyn ReadingSink>> = vec![broker.clone()];
    let engine = Arc::new(DispatchEngine::new(
        sinks,
        Arc::new(Stats::new()),
        Duration::from_millis(500),
    ));
    let fleet = registry::synthesize(6);

    engine.run_tick(&fleet, datetime!(2024-06-01 12:00:00 UTC)).await;
    engine.run_tick(&fleet, datetime!(2024-06-01 12:00:30 UTC)).await;

    assert_eq!(broker.flushes.load(Ordering::SeqCst), 2);
    assert_eq!(*broker.seen_at_flush.lock().unwrap(), vec![6, 12]);
    assert_eq!(engine.stats().report().ticks, 2);
}

#[tokio::test]
async fn generated_readings_respect_role_invariants_end_to_end() {
    let file = RecordingSink::new(SinkKind::FileLog);
    let sinks: Vec<Arc<dyn ReadingSink>> = vec![file.clone()];
    let engine = Arc::new(DispatchEngine::new(
        sinks,
        Arc::new(Stats::new()),
        Duration::from_millis(500),
    ));
    let fleet = registry::synthesize(10);

    for hour in [0u8, 6, 9, 12, 15, 18, 21] {
        let now = datetime!(2024-06-01 00:00:00 UTC).replace_hour(hour).unwrap();
        engine.run_tick(&fleet, now).await;
    }

    let readings = file.readings.lock().unwrap();
    assert_eq!(readings.len(), 70);
    for r in readings.iter() {
        assert!(r.energy_generated_kwh >= 0.0);
        assert!(r.energy_consumed_kwh >= 0.0);
        match r.role {
            MeterRole::Generator => {
                assert!(r.irradiance_wm2.is_some());
                assert!(r.weather_condition.is_some());
            }
            MeterRole::Consumer => {
                assert_eq!(r.energy_generated_kwh, 0.0);
                assert!(r.irradiance_wm2.is_none());
                assert!(r.weather_condition.is_none());
            }
        }
    }
}

#[tokio::test]
async fn shutdown_closes_sinks_once() {
    let broker = RecordingSink::new(SinkKind::Broker);
    let store = RecordingSink::new(SinkKind::TimeSeriesStore);
    let sinks: Vec<Arc<dyn ReadingSink>> = vec![broker.clone(), store.clone()];
    let sim = Simulator::with_parts(config_with_meters(1), registry::synthesize(1), sinks);

    sim.tick().await;
    sim.shutdown().await;
    sim.shutdown().await;

    assert_eq!(broker.closes.load(Ordering::SeqCst), 1);
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}
