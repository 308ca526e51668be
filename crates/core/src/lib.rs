//! Core utilities for the engine.
//!
//! This crate provides foundational types and utilities used across the engine:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer and performance counters
//! - Configuration management

mod config;
mod error;
mod logging;
mod performance;
mod timer;

pub use config::{ControllerSettings, EngineConfig, GraphicsConfig, LoggingConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use performance::{HISTORY_LEN, PerformanceCounter};
pub use timer::{Timer, Timestep};
