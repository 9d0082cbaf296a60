//! Background collector and query CLI for Omnik solar inverters.
//!
//! This crate provides a service that:
//! - Polls one configured inverter on a fixed cadence
//! - Stores every sample in the local database
//! - Keeps the database connection warm with a periodic ping
//! - Answers date-keyed queries from the command line as JSON
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/omnik/service.toml`:
//!
//! ```toml
//! [inverter]
//! address = "192.168.1.40"
//! serial = 1612345678
//! port = 8899
//! connect_timeout = 10
//! read_timeout = 10
//!
//! [polling]
//! interval = 60
//!
//! [storage]
//! path = "~/.local/share/omnik/samples.db"
//! keepalive_interval = 30
//! ```

pub mod collector;
pub mod config;
pub mod query;

pub use collector::{Collector, CollectorStats, FailureLevel, FailureTracker};
pub use config::{
    Config, ConfigError, InverterConfig, PollingConfig, StorageConfig, ValidationError,
};
pub use query::Query;
