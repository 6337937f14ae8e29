//! Fleet construction at startup.

use std::{collections::HashSet, time::Duration};

use rand::Rng;
use rust_client::{
    db::meter_registry_queries,
    domain::{MeterProfile, MeterRole, RegisteredMeter},
};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Source of truth for which meters exist.
#[async_trait::async_trait]
pub trait MeterSource: Send + Sync {
    async fn active_meters(&self, limit: usize) -> anyhow::Result<Vec<RegisteredMeter>>;
}

/// Registry backed by the `smart_meters` / `users` tables.
pub struct PgMeterSource {
    pool: PgPool,
}

impl PgMeterSource {
    pub async fn connect(uri: &str, acquire_timeout: Duration) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect(uri)
            .await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl MeterSource for PgMeterSource {
    async fn active_meters(&self, limit: usize) -> anyhow::Result<Vec<RegisteredMeter>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        meter_registry_queries::active_meters(&self.pool, limit).await
    }
}

/// Build the fleet: up to `count` meters from `source`, or `count` synthesized
/// meters when the source is missing, failing or empty.
pub async fn load(count: usize, source: Option<&dyn MeterSource>) -> Vec<MeterProfile> {
    let registered = match source {
        Some(src) => match src.active_meters(count).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load meters from registry, using simulated fleet");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let mut rng = rand::thread_rng();
    let fleet = if registered.is_empty() {
        synthesize_with(&mut rng, count)
    } else {
        from_registered(&mut rng, registered, count)
    };

    tracing::info!(meters = fleet.len(), "initialized meters for simulation");
    fleet
}

pub fn synthesize(count: usize) -> Vec<MeterProfile> {
    synthesize_with(&mut rand::thread_rng(), count)
}

/// Default fleet: even indices are solar prosumers, odd indices consumers.
pub fn synthesize_with<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<MeterProfile> {
    (0..count)
        .map(|i| {
            let n = i + 1;
            let (role, owner_class) = if i % 2 == 0 {
                (MeterRole::Generator, "Prosumer")
            } else {
                (MeterRole::Consumer, "Consumer")
            };
            randomized_profile(
                rng,
                format!("SIM_METER_{n:03}"),
                role,
                format!("Simulated Location {n}"),
                owner_class.to_string(),
            )
        })
        .collect()
}

/// Profiles for registry rows. Duplicate ids keep their first row and the
/// result never exceeds `count`.
fn from_registered<R: Rng + ?Sized>(
    rng: &mut R,
    rows: Vec<RegisteredMeter>,
    count: usize,
) -> Vec<MeterProfile> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut fleet = Vec::with_capacity(rows.len().min(count));

    for row in rows {
        if fleet.len() >= count {
            break;
        }
        if !seen.insert(row.meter_id.clone()) {
            tracing::warn!(meter_id = %row.meter_id, "duplicate meter id in registry, skipping");
            continue;
        }
        let role = row.role();
        fleet.push(randomized_profile(
            rng,
            row.meter_id,
            role,
            row.location.unwrap_or_default(),
            row.user_type.unwrap_or_default(),
        ));
    }

    fleet
}

fn randomized_profile<R: Rng + ?Sized>(
    rng: &mut R,
    meter_id: String,
    role: MeterRole,
    location: String,
    owner_class: String,
) -> MeterProfile {
    let base_generation_kw = if role.is_generator() {
        rng.gen_range(2.0..=8.0)
    } else {
        0.0
    };

    MeterProfile {
        meter_id,
        role,
        location,
        owner_class,
        base_generation_kw,
        base_consumption_kw: rng.gen_range(1.0..=5.0),
        efficiency: rng.gen_range(0.85..=0.95),
        noise_factor: rng.gen_range(0.05..=0.15),
    }
}
