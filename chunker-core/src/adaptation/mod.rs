pub mod constraint;
pub mod manager;
pub mod params;
pub mod strategy;

pub use constraint::{ConstraintAdapter, ConstraintAdapterStats, PressureLevel};
pub use manager::{AdaptationManager, EnvironmentHints};
pub use params::TuningParameters;
pub use strategy::StrategyKind;
