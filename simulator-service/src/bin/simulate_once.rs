use anyhow::Result;
use simulator_service::{config::AppConfig, observability, Simulator};

/// Run exactly one simulation tick against the configured sinks and print the
/// resulting statistics. Handy for checking a deployment's connectivity.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let sim = Simulator::bootstrap(cfg).await;

    let report = sim.tick().await;
    tracing::info!(
        readings = report.readings,
        stored = report.stored,
        undelivered = report.undelivered,
        flush_failures = report.flush_failures,
        "single tick finished"
    );

    println!("{}", sim.report());
    println!("   Mode: {}", sim.mode());

    sim.shutdown().await;
    Ok(())
}
