#![forbid(unsafe_code)]

pub mod app;
pub mod config;
mod methods;

pub use app::{AgentApp, AgentError, ShutdownHandle};
pub use config::{AgeThreshold, AgentConfig, CleanUpPolicy};
