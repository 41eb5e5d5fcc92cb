//! Configuration and process setup for adgate.
//!
//! Loads [`adgate_core::GateConfig`] from files and the environment, installs
//! the tracing subscriber for binaries, and hosts the scripted demo driver
//! behind the `adgate-demo` binary.

pub mod demo;
pub mod loader;
pub mod telemetry;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, GateConfigSource,
    apply_env_overrides, load_from_file, parse_from_str, parse_json,
};
pub use telemetry::init_tracing;
