//! Process-wide delivery counters.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::sinks::SinkKind;

/// Monotonic counters shared by every meter task for the process lifetime.
///
/// Each increment is mirrored to the `metrics` facade so the same numbers are
/// visible on the Prometheus endpoint.
#[derive(Debug, Default)]
pub struct Stats {
    total_readings: AtomicU64,
    broker_sends: AtomicU64,
    store_inserts: AtomicU64,
    file_saves: AtomicU64,
    undelivered: AtomicU64,
    ticks: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_reading(&self) {
        self.total_readings.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("meter_readings_generated_total").increment(1);
    }

    pub fn record_success(&self, kind: SinkKind) {
        self.counter_for(kind).fetch_add(1, Ordering::Relaxed);
        metrics::counter!("meter_sink_deliveries_total", "sink" => kind.as_str()).increment(1);
    }

    pub fn record_failure(&self, kind: SinkKind) {
        metrics::counter!("meter_sink_failures_total", "sink" => kind.as_str()).increment(1);
    }

    pub fn record_undelivered(&self) {
        self.undelivered.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("meter_readings_undelivered_total").increment(1);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("simulation_ticks_total").increment(1);
    }

    /// Current values; counters are never reset.
    pub fn report(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_readings: self.total_readings.load(Ordering::Relaxed),
            broker_sends: self.broker_sends.load(Ordering::Relaxed),
            store_inserts: self.store_inserts.load(Ordering::Relaxed),
            file_saves: self.file_saves.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }

    fn counter_for(&self, kind: SinkKind) -> &AtomicU64 {
        match kind {
            SinkKind::Broker => &self.broker_sends,
            SinkKind::TimeSeriesStore => &self.store_inserts,
            SinkKind::FileLog => &self.file_saves,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_readings: u64,
    pub broker_sends: u64,
    pub store_inserts: u64,
    pub file_saves: u64,
    /// Readings no sink accepted.
    pub undelivered: u64,
    pub ticks: u64,
}

impl StatsSnapshot {
    pub fn successes(&self, kind: SinkKind) -> u64 {
        match kind {
            SinkKind::Broker => self.broker_sends,
            SinkKind::TimeSeriesStore => self.store_inserts,
            SinkKind::FileLog => self.file_saves,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation Statistics:")?;
        writeln!(f, "   Ticks: {}", self.ticks)?;
        writeln!(f, "   Total Readings: {}", self.total_readings)?;
        writeln!(f, "   Kafka Sends: {}", self.broker_sends)?;
        writeln!(f, "   Database Stores: {}", self.store_inserts)?;
        writeln!(f, "   File Saves: {}", self.file_saves)?;
        write!(f, "   Undelivered Readings: {}", self.undelivered)
    }
}
