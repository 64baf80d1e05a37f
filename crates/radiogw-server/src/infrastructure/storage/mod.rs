//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration file, fills in
//! defaults for anything it does not name, and validates the result before
//! the gateway opens any device.

pub mod config;
