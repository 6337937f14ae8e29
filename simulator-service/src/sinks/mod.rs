pub mod file_log;
pub mod kafka;
pub mod timescale;

pub use file_log::FileLogSink;
pub use kafka::KafkaSink;
pub use timescale::TimescaleSink;

use std::{fmt, sync::Arc, time::Duration};

use rust_client::domain::Reading;

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Broker,
    TimeSeriesStore,
    FileLog,
}

impl SinkKind {
    pub const ALL: [SinkKind; 3] = [SinkKind::Broker, SinkKind::TimeSeriesStore, SinkKind::FileLog];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Broker => "kafka",
            Self::TimeSeriesStore => "timescaledb",
            Self::FileLog => "file",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("broker error: {0}")]
    Broker(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Result of handing one reading to one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Delivered,
    Failed(String),
}

impl SinkOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl From<Result<(), SinkError>> for SinkOutcome {
    fn from(res: Result<(), SinkError>) -> Self {
        match res {
            Ok(()) => Self::Delivered,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// A delivery target for readings.
///
/// Implementations report every internal failure through `SinkError`; a sink
/// never panics on I/O problems.
#[async_trait::async_trait]
pub trait ReadingSink: Send + Sync {
    fn kind(&self) -> SinkKind;

    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError>;

    /// Called once per tick after every reading of the tick was delivered.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Release held connections. Called once at shutdown.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Probe every enabled sink once. Sinks that fail are logged and left out for
/// the rest of the process lifetime.
pub async fn probe_all(cfg: &AppConfig) -> Vec<Arc<dyn ReadingSink>> {
    let timeout = cfg.simulation.sink_timeout();
    let mut sinks: Vec<Arc<dyn ReadingSink>> = Vec::with_capacity(SinkKind::ALL.len());

    if cfg.broker.enabled {
        let res = probe(
            SinkKind::Broker,
            timeout,
            KafkaSink::connect(&cfg.broker.bootstrap_servers, &cfg.broker.topic),
        )
        .await;
        if let Some(sink) = res {
            sinks.push(Arc::new(sink));
        }
    }

    if cfg.store.enabled {
        let res = probe(
            SinkKind::TimeSeriesStore,
            timeout,
            TimescaleSink::connect(&cfg.store.database_url, cfg.store.max_connections, timeout),
        )
        .await;
        if let Some(sink) = res {
            sinks.push(Arc::new(sink));
        }
    }

    if cfg.file.enabled {
        let res = probe(SinkKind::FileLog, timeout, FileLogSink::open(&cfg.file.output_file)).await;
        if let Some(sink) = res {
            sinks.push(Arc::new(sink));
        }
    }

    sinks
}

async fn probe<S, F>(kind: SinkKind, timeout: Duration, connect: F) -> Option<S>
where
    F: std::future::Future<Output = Result<S, SinkError>>,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(sink)) => {
            tracing::info!(sink = %kind, "sink available");
            metrics::gauge!("meter_sink_available", "sink" => kind.as_str()).set(1.0);
            Some(sink)
        }
        Ok(Err(e)) => {
            tracing::warn!(sink = %kind, error = %e, "sink not available, disabled for this run");
            metrics::gauge!("meter_sink_available", "sink" => kind.as_str()).set(0.0);
            None
        }
        Err(_) => {
            tracing::warn!(sink = %kind, ?timeout, "sink probe timed out, disabled for this run");
            metrics::gauge!("meter_sink_available", "sink" => kind.as_str()).set(0.0);
            None
        }
    }
}
