use std::time::Duration;

use rust_client::domain::Reading;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{ReadingSink, SinkError, SinkKind};

const INSERT_READING_SQL: &str = r#"
    INSERT INTO energy_readings (
        time, meter_id, energy_generated, energy_consumed,
        voltage, current, power_factor, frequency, temperature,
        irradiance, weather_condition, grid_connection_status
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

/// One row per reading in the `energy_readings` hypertable.
///
/// A pooled connection is acquired for each delivery and handed back when the
/// guard drops, whether the insert succeeded or not.
pub struct TimescaleSink {
    pool: PgPool,
}

impl TimescaleSink {
    pub async fn connect(uri: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect(uri)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, reading: &Reading) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(INSERT_READING_SQL)
            .bind(reading.timestamp)
            .bind(&reading.meter_id)
            .bind(reading.energy_generated_kwh)
            .bind(reading.energy_consumed_kwh)
            .bind(reading.voltage_v)
            .bind(reading.current_a)
            .bind(reading.power_factor)
            .bind(reading.frequency_hz)
            .bind(reading.temperature_c)
            .bind(reading.irradiance_wm2)
            .bind(reading.weather_condition.map(|w| w.as_str()))
            .bind(&reading.grid_connection_status)
            .execute(&mut *conn)
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl ReadingSink for TimescaleSink {
    fn kind(&self) -> SinkKind {
        SinkKind::TimeSeriesStore
    }

    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        self.insert(reading).await?;
        tracing::debug!(meter_id = %reading.meter_id, "reading stored in timescaledb");
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.pool.close().await;
        tracing::debug!("timescaledb pool closed");
        Ok(())
    }
}
