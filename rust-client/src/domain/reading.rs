use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::MeterRole;

pub const GRID_CONNECTED: &str = "Connected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    Sunny,
    #[serde(rename = "Partly Cloudy")]
    PartlyCloudy,
    Cloudy,
    Overcast,
}

impl WeatherCondition {
    pub const ALL: [WeatherCondition; 4] = [
        WeatherCondition::Sunny,
        WeatherCondition::PartlyCloudy,
        WeatherCondition::Cloudy,
        WeatherCondition::Overcast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunny => "Sunny",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Overcast => "Overcast",
        }
    }
}

/// One telemetry sample for one meter at one instant.
///
/// Serialized as a flat record; the field names on the wire carry their unit
/// suffix (`energy_generated_kWh`, `voltage_V`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub meter_id: String,
    pub role: MeterRole,
    pub location: String,
    pub owner_class: String,
    #[serde(rename = "energy_generated_kWh")]
    pub energy_generated_kwh: f64,
    #[serde(rename = "energy_consumed_kWh")]
    pub energy_consumed_kwh: f64,
    #[serde(rename = "voltage_V")]
    pub voltage_v: f64,
    #[serde(rename = "current_A")]
    pub current_a: f64,
    pub power_factor: f64,
    #[serde(rename = "frequency_Hz")]
    pub frequency_hz: f64,
    #[serde(rename = "temperature_C")]
    pub temperature_c: f64,
    #[serde(rename = "irradiance_Wm2")]
    pub irradiance_wm2: Option<f64>,
    pub weather_condition: Option<WeatherCondition>,
    pub grid_connection_status: String,
}
