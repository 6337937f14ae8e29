//! Startup wiring shared by the binaries.

use std::sync::Arc;

use rust_client::domain::MeterProfile;

use crate::{
    config::AppConfig,
    dispatch::{DispatchEngine, TickReport},
    mode::OperatingMode,
    registry::{self, MeterSource, PgMeterSource},
    sinks::{self, ReadingSink},
    stats::{Stats, StatsSnapshot},
};

pub struct Simulator {
    cfg: AppConfig,
    fleet: Vec<MeterProfile>,
    engine: Arc<DispatchEngine>,
}

impl Simulator {
    /// Load the fleet and probe the sinks. Nothing here fails: unreachable
    /// dependencies only shrink the set of sinks or fall back to a simulated
    /// fleet.
    pub async fn bootstrap(cfg: AppConfig) -> Self {
        let fleet = load_fleet(&cfg).await;
        let sinks = sinks::probe_all(&cfg).await;
        Self::with_parts(cfg, fleet, sinks)
    }

    pub fn with_parts(cfg: AppConfig, fleet: Vec<MeterProfile>, sinks: Vec<Arc<dyn ReadingSink>>) -> Self {
        let engine = Arc::new(DispatchEngine::new(
            sinks,
            Arc::new(Stats::new()),
            cfg.simulation.sink_timeout(),
        ));

        let mode = engine.mode();
        match mode {
            OperatingMode::Standalone => {
                tracing::info!("running in STANDALONE mode - no sink available, readings are only counted")
            }
            OperatingMode::Hybrid => tracing::info!(
                available = engine.available_kinds().len(),
                total = sinks::SinkKind::ALL.len(),
                "running in HYBRID mode"
            ),
            OperatingMode::Full => tracing::info!("running in FULL mode - all sinks available"),
        }

        Self { cfg, fleet, engine }
    }

    pub fn fleet(&self) -> &[MeterProfile] {
        &self.fleet
    }

    pub fn mode(&self) -> OperatingMode {
        self.engine.mode()
    }

    pub async fn tick(&self) -> TickReport {
        self.engine.run_tick(&self.fleet, self.cfg.simulation.now()).await
    }

    pub fn report(&self) -> StatsSnapshot {
        self.engine.stats().report()
    }

    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }

    /// Startup banner printed by the long-running binary.
    pub fn banner(&self) -> String {
        let sim = &self.cfg.simulation;
        [
            "Starting Smart Meter Simulator".to_string(),
            "=".repeat(50),
            format!("Meters: {}", self.fleet().len()),
            format!("Interval: {} seconds", sim.interval().as_secs()),
            format!("Mode: {}", self.mode()),
            format!("Output File: {}", self.cfg.file.output_file.display()),
            "=".repeat(50),
        ]
        .join("\n")
    }
}

async fn load_fleet(cfg: &AppConfig) -> Vec<MeterProfile> {
    let count = cfg.simulation.num_meters;
    if !cfg.registry.enabled {
        return registry::load(count, None).await;
    }

    match PgMeterSource::connect(&cfg.registry.database_url, cfg.simulation.sink_timeout()).await {
        Ok(source) => {
            let fleet = registry::load(count, Some(&source as &dyn MeterSource)).await;
            source.close().await;
            fleet
        }
        Err(e) => {
            tracing::warn!(error = %e, "meter registry database not available");
            registry::load(count, None).await
        }
    }
}
