pub mod meter_profile;
pub mod reading;

pub use meter_profile::{MeterProfile, MeterRole, RegisteredMeter};
pub use reading::{Reading, WeatherCondition, GRID_CONNECTED};
