pub mod config;
pub mod dispatch;
pub mod generator;
pub mod metrics_server;
pub mod mode;
pub mod observability;
pub mod registry;
pub mod simulator;
pub mod sinks;
pub mod stats;

pub use dispatch::{DispatchEngine, DispatchReport, TickReport};
pub use mode::OperatingMode;
pub use simulator::Simulator;
pub use stats::{Stats, StatsSnapshot};
