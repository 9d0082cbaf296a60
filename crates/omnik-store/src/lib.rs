//! Local persistence for Omnik inverter samples.
//!
//! This crate provides SQLite-based, append-only storage for [`Sample`]s
//! and the read queries used for reporting.
//!
//! # Features
//!
//! - Schema bootstrap on open (idempotent, no migrations)
//! - Insert through a cached prepared statement
//! - Date-keyed queries: month presence, ranges, daily totals, nearest date
//! - Day views with dark-hour readings trimmed
//! - A background keep-alive pinger
//!
//! # Example
//!
//! ```no_run
//! use omnik_store::Store;
//! use time::macros::date;
//!
//! let store = Store::open_default()?;
//!
//! for day in store.daily_kwh_in_range(date!(2024-06-01), date!(2024-06-30))? {
//!     println!("{}: {} kWh", day.date, day.kwh);
//! }
//! # Ok::<(), omnik_store::Error>(())
//! ```
//!
//! [`Sample`]: omnik_types::Sample

mod error;
mod keepalive;
mod schema;
mod store;
mod trim;

pub use error::{Error, Result};
pub use keepalive::KeepAlive;
pub use schema::{SAMPLE_COLUMNS, TABLES};
pub use store::Store;
pub use trim::trim_dark;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/omnik/samples.db`
/// - macOS: `~/Library/Application Support/omnik/samples.db`
/// - Windows: `C:\Users\<user>\AppData\Local\omnik\samples.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("omnik")
        .join("samples.db")
}
