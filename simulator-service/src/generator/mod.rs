//! Stochastic reading model.
//!
//! Values depend only on the meter profile, the hour of `now` and fresh
//! random draws; nothing is carried between calls.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rust_client::domain::{MeterProfile, Reading, WeatherCondition, GRID_CONNECTED};
use time::{OffsetDateTime, UtcOffset};

const NOMINAL_VOLTAGE_V: f64 = 240.0;
const VOLTAGE_STD_V: f64 = 5.0;
const NOMINAL_FREQUENCY_HZ: f64 = 50.0;
const FREQUENCY_STD_HZ: f64 = 0.1;
const AMBIENT_TEMPERATURE_C: f64 = 25.0;
const TEMPERATURE_STD_C: f64 = 3.0;

/// Daylight share of peak solar output for `hour` (0-23).
///
/// Zero outside 06:00-18:00; inside, a linear ramp peaking at noon scaled by a
/// random weather factor in [0.7, 1.0].
pub fn solar_factor<R: Rng + ?Sized>(rng: &mut R, hour: u8) -> f64 {
    if !(6..=18).contains(&hour) {
        return 0.0;
    }
    let hour_factor = 1.0 - (f64::from(hour) - 12.0).abs() / 6.0;
    let weather = rng.gen_range(0.7..=1.0);
    (hour_factor * weather).min(1.0)
}

/// Demand multiplier for `hour`: evening/morning peaks, quiet nights.
pub fn consumption_factor<R: Rng + ?Sized>(rng: &mut R, hour: u8) -> f64 {
    match hour {
        7..=9 | 17..=21 => rng.gen_range(1.2..=1.8),
        22..=23 | 0..=6 => rng.gen_range(0.3..=0.7),
        _ => rng.gen_range(0.8..=1.2),
    }
}

/// Build one reading for `profile` at `now` using the thread-local RNG.
pub fn generate(profile: &MeterProfile, now: OffsetDateTime) -> Reading {
    generate_with(&mut rand::thread_rng(), profile, now)
}

pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    profile: &MeterProfile,
    now: OffsetDateTime,
) -> Reading {
    let hour = now.hour();
    let solar = solar_factor(rng, hour);
    let demand = consumption_factor(rng, hour);
    let is_generator = profile.role.is_generator();

    let energy_generated = if is_generator {
        let base = profile.base_generation_kw * solar * profile.efficiency;
        noisy_non_negative(rng, base, profile.noise_factor)
    } else {
        0.0
    };

    let base_consumed = profile.base_consumption_kw * demand;
    let energy_consumed = noisy_non_negative(rng, base_consumed, profile.noise_factor);

    let voltage = gauss(rng, NOMINAL_VOLTAGE_V, VOLTAGE_STD_V);
    let current = if voltage > 0.0 {
        (energy_generated + energy_consumed) / voltage * 1000.0
    } else {
        0.0
    };
    let power_factor = rng.gen_range(0.90..=0.98);
    let frequency = gauss(rng, NOMINAL_FREQUENCY_HZ, FREQUENCY_STD_HZ);
    let temperature = gauss(rng, AMBIENT_TEMPERATURE_C, TEMPERATURE_STD_C);

    let (irradiance, weather) = if is_generator {
        let irradiance = solar * rng.gen_range(800.0..=1200.0);
        let weather = WeatherCondition::ALL[rng.gen_range(0..WeatherCondition::ALL.len())];
        (Some(round_to(irradiance, 1)), Some(weather))
    } else {
        (None, None)
    };

    Reading {
        timestamp: now.to_offset(UtcOffset::UTC),
        meter_id: profile.meter_id.clone(),
        role: profile.role,
        location: profile.location.clone(),
        owner_class: profile.owner_class.clone(),
        energy_generated_kwh: round_to(energy_generated, 4),
        energy_consumed_kwh: round_to(energy_consumed, 4),
        voltage_v: round_to(voltage, 2),
        current_a: round_to(current, 2),
        power_factor: round_to(power_factor, 3),
        frequency_hz: round_to(frequency, 2),
        temperature_c: round_to(temperature, 1),
        irradiance_wm2: irradiance,
        weather_condition: weather,
        grid_connection_status: GRID_CONNECTED.to_string(),
    }
}

/// `base` plus zero-mean noise proportional to `base`, clamped at zero.
fn noisy_non_negative<R: Rng + ?Sized>(rng: &mut R, base: f64, noise_factor: f64) -> f64 {
    let noise = gauss(rng, 0.0, base * noise_factor);
    (base + noise).max(0.0)
}

/// Normal draw; a degenerate distribution (negative or non-finite spread)
/// collapses to its mean.
fn gauss<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(dist) => dist.sample(rng),
        Err(_) => mean,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
