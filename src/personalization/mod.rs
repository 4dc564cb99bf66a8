pub mod candidates;
pub mod config;
pub mod difficulty;
pub mod diversify;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod metrics;
pub mod needs;
pub mod performance;
pub mod scoring;
pub mod sessions;
pub mod signals;
pub mod types;

pub use config::EngineConfig;
pub use engine::{EngineBuilder, MaintenanceReport, PersonalizationEngine};
pub use error::EngineError;
pub use types::*;
