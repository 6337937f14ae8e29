//! Fan-out of readings to every available sink.

use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{future::join_all, FutureExt};
use rust_client::domain::{MeterProfile, Reading};
use time::OffsetDateTime;
use tokio::task::JoinSet;

use crate::{
    generator,
    mode::OperatingMode,
    sinks::{ReadingSink, SinkError, SinkKind, SinkOutcome},
    stats::Stats,
};

/// Per-sink results for one reading.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub meter_id: String,
    pub outcomes: Vec<(SinkKind, SinkOutcome)>,
}

impl DispatchReport {
    /// A reading counts as stored once any sink accepted it.
    pub fn stored(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| o.is_delivered())
    }

    pub fn delivered_to(&self) -> Vec<SinkKind> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_delivered())
            .map(|(k, _)| *k)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub readings: usize,
    pub stored: usize,
    pub undelivered: usize,
    /// Meters whose task died before producing a reading.
    pub skipped_meters: usize,
    pub flush_failures: usize,
}

pub struct DispatchEngine {
    sinks: Vec<Arc<dyn ReadingSink>>,
    stats: Arc<Stats>,
    sink_timeout: Duration,
    closed: AtomicBool,
}

impl DispatchEngine {
    pub fn new(sinks: Vec<Arc<dyn ReadingSink>>, stats: Arc<Stats>, sink_timeout: Duration) -> Self {
        Self {
            sinks,
            stats,
            sink_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn available_kinds(&self) -> Vec<SinkKind> {
        let mut kinds = Vec::with_capacity(self.sinks.len());
        for kind in self.sinks.iter().map(|s| s.kind()) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    pub fn mode(&self) -> OperatingMode {
        OperatingMode::classify(self.available_kinds().len(), SinkKind::ALL.len())
    }

    /// Hand `reading` to every sink concurrently and record the outcome.
    pub async fn dispatch(&self, reading: &Reading) -> DispatchReport {
        self.stats.record_reading();

        let attempts = self
            .sinks
            .iter()
            .map(|sink| deliver_with_timeout(sink.as_ref(), reading, self.sink_timeout));
        let outcomes = join_all(attempts).await;

        for (kind, outcome) in &outcomes {
            match outcome {
                SinkOutcome::Delivered => self.stats.record_success(*kind),
                SinkOutcome::Failed(reason) => {
                    tracing::warn!(meter_id = %reading.meter_id, sink = %kind, reason = %reason, "sink delivery failed");
                    self.stats.record_failure(*kind);
                }
            }
        }

        let report = DispatchReport {
            meter_id: reading.meter_id.clone(),
            outcomes,
        };

        if report.stored() {
            tracing::debug!(meter_id = %reading.meter_id, sinks = ?report.delivered_to(), "reading stored");
        } else {
            tracing::error!(meter_id = %reading.meter_id, "failed to store reading via any sink");
            self.stats.record_undelivered();
        }

        report
    }

    /// One simulation tick: a task per meter generates and dispatches its
    /// reading; once every task has finished, each sink is flushed once.
    pub async fn run_tick(self: &Arc<Self>, fleet: &[MeterProfile], now: OffsetDateTime) -> TickReport {
        tracing::info!(meters = fleet.len(), "generating readings");

        let mut tasks = JoinSet::new();
        for profile in fleet {
            let engine = Arc::clone(self);
            let profile = profile.clone();
            tasks.spawn(async move {
                let reading = generator::generate(&profile, now);
                engine.dispatch(&reading).await
            });
        }

        let mut report = TickReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(dispatched) => {
                    report.readings += 1;
                    if dispatched.stored() {
                        report.stored += 1;
                    } else {
                        report.undelivered += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "meter task failed, meter skipped for this tick");
                    report.skipped_meters += 1;
                }
            }
        }

        report.flush_failures = self.flush_all().await;
        self.stats.record_tick();

        tracing::info!(
            readings = report.readings,
            stored = report.stored,
            undelivered = report.undelivered,
            skipped = report.skipped_meters,
            total_readings = self.stats.report().total_readings,
            "completed meter reading simulation cycle"
        );
        report
    }

    /// Flush every sink; returns how many flushes failed.
    async fn flush_all(&self) -> usize {
        let mut failures = 0;
        for sink in &self.sinks {
            let res = match tokio::time::timeout(self.sink_timeout, sink.flush()).await {
                Ok(res) => res,
                Err(_) => Err(SinkError::Timeout(self.sink_timeout)),
            };
            if let Err(e) = res {
                tracing::error!(sink = %sink.kind(), error = %e, "failed to flush sink");
                failures += 1;
            }
        }
        failures
    }

    /// Close every sink. Only the first call does anything; close errors are
    /// logged and swallowed.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for sink in &self.sinks {
            let res = match tokio::time::timeout(self.sink_timeout, sink.close()).await {
                Ok(res) => res,
                Err(_) => Err(SinkError::Timeout(self.sink_timeout)),
            };
            match res {
                Ok(()) => tracing::debug!(sink = %sink.kind(), "sink closed"),
                Err(e) => tracing::error!(sink = %sink.kind(), error = %e, "error closing sink"),
            }
        }
    }
}

async fn deliver_with_timeout(
    sink: &dyn ReadingSink,
    reading: &Reading,
    timeout: Duration,
) -> (SinkKind, SinkOutcome) {
    // A panic inside one sink is that sink's failure only.
    let attempt = AssertUnwindSafe(tokio::time::timeout(timeout, sink.deliver(reading))).catch_unwind();
    let outcome = match attempt.await {
        Ok(Ok(res)) => SinkOutcome::from(res),
        Ok(Err(_)) => SinkOutcome::from(Err(SinkError::Timeout(timeout))),
        Err(_) => SinkOutcome::Failed("sink panicked".to_string()),
    };
    (sink.kind(), outcome)
}
