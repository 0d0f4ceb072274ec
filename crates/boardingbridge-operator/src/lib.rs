//! BridgeService operator - wiring for the boardingbridge binary

#![deny(missing_docs)]

pub mod config;
pub mod controller_runner;

pub use config::{ControllerArgs, ControllerConfig};
pub use controller_runner::build_bridge_controller;
