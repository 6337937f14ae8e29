use anyhow::Result;
use simulator_service::{config::AppConfig, metrics_server, observability, Simulator};
use tokio::time::MissedTickBehavior;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let interval = cfg.simulation.interval();
    let sim = Simulator::bootstrap(cfg).await;
    println!("{}", sim.banner());

    // The first tick fires immediately.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sim.tick().await;
            }
            res = &mut shutdown => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    tracing::info!("shutting down simulator");
    println!("\n{}", sim.report());
    println!("   Mode: {}", sim.mode());

    sim.shutdown().await;
    tracing::info!("simulator shutdown complete");

    Ok(())
}
