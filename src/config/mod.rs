// src/config/mod.rs
pub mod orchestrator;

pub use orchestrator::OrchestratorConfig;
