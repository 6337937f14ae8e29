use serde::{Deserialize, Serialize};

/// Whether a meter only draws power or also feeds it back (rooftop solar etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeterRole {
    Generator,
    Consumer,
}

impl MeterRole {
    /// Registry `meter_type` values: only `Solar` meters generate.
    pub fn from_meter_type(meter_type: &str) -> Self {
        if meter_type.eq_ignore_ascii_case("solar") {
            Self::Generator
        } else {
            Self::Consumer
        }
    }

    pub fn is_generator(self) -> bool {
        matches!(self, Self::Generator)
    }
}

/// Static description of one simulated meter.
///
/// Numeric fields are drawn once when the fleet is built and never change
/// afterwards; `base_generation_kw` is zero for consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterProfile {
    pub meter_id: String,
    pub role: MeterRole,
    pub location: String,
    pub owner_class: String,
    pub base_generation_kw: f64,
    pub base_consumption_kw: f64,
    pub efficiency: f64,
    pub noise_factor: f64,
}

/// Active meter row as stored in the relational registry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegisteredMeter {
    pub meter_id: String,
    pub meter_type: String,
    pub location: Option<String>,
    pub user_type: Option<String>,
}

impl RegisteredMeter {
    pub fn role(&self) -> MeterRole {
        MeterRole::from_meter_type(&self.meter_type)
    }
}
