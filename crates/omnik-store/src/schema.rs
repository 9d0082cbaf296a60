//! Database schema bootstrap.
//!
//! The store holds a single append-only table. Bootstrap checks each
//! required table and creates the ones that are missing; an existing table
//! is left untouched, so opening the same database twice is a no-op. There
//! is no migration mechanism.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Tables that must exist before the store is usable.
pub const TABLES: &[&str] = &["samples"];

/// Data columns of the `samples` table, in insert order.
pub const SAMPLE_COLUMNS: [&str; 26] = [
    "time_of_measurement",
    "date",
    "time",
    "temp",
    "total_kwh",
    "today_kwh",
    "total_hours",
    "current_watts",
    "pv_input_voltage_1",
    "pv_input_voltage_2",
    "pv_input_voltage_3",
    "pv_input_amps_1",
    "pv_input_amps_2",
    "pv_input_amps_3",
    "ac_output_voltage_1",
    "ac_output_voltage_2",
    "ac_output_voltage_3",
    "ac_output_amps_1",
    "ac_output_amps_2",
    "ac_output_amps_3",
    "ac_output_frequency_1",
    "ac_output_frequency_2",
    "ac_output_frequency_3",
    "ac_output_watts_1",
    "ac_output_watts_2",
    "ac_output_watts_3",
];

/// Create every missing table in [`TABLES`].
///
/// # Errors
///
/// Returns [`Error::FatalConfiguration`] if a table cannot be created.
pub fn bootstrap(conn: &Connection) -> Result<()> {
    for table in TABLES {
        if table_exists(conn, table)? {
            debug!("Table {} already present", table);
            continue;
        }
        info!("Creating table {}", table);
        create_table(conn, table)?;
    }
    Ok(())
}

/// Check whether `name` exists as a table.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get(0),
        )
        .map_err(|e| Error::FatalConfiguration(format!("cannot inspect schema: {e}")))?;
    Ok(exists)
}

/// Create the table called `name`.
///
/// # Errors
///
/// Returns [`Error::FatalConfiguration`] for a name this store does not
/// know how to create, or if SQLite rejects the statement.
pub fn create_table(conn: &Connection, name: &str) -> Result<()> {
    let sql = match name {
        "samples" => CREATE_SAMPLES,
        other => {
            return Err(Error::FatalConfiguration(format!(
                "unknown table '{other}' in bootstrap list"
            )));
        }
    };

    conn.execute_batch(sql)
        .map_err(|e| Error::FatalConfiguration(format!("cannot create table {name}: {e}")))
}

const CREATE_SAMPLES: &str = r#"
    CREATE TABLE IF NOT EXISTS samples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        time_of_measurement INTEGER NOT NULL,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        temp REAL NOT NULL,
        total_kwh REAL NOT NULL,
        today_kwh REAL NOT NULL,
        total_hours INTEGER NOT NULL,
        current_watts REAL NOT NULL,
        pv_input_voltage_1 REAL NOT NULL,
        pv_input_voltage_2 REAL NOT NULL,
        pv_input_voltage_3 REAL NOT NULL,
        pv_input_amps_1 REAL NOT NULL,
        pv_input_amps_2 REAL NOT NULL,
        pv_input_amps_3 REAL NOT NULL,
        ac_output_voltage_1 REAL NOT NULL,
        ac_output_voltage_2 REAL NOT NULL,
        ac_output_voltage_3 REAL NOT NULL,
        ac_output_amps_1 REAL NOT NULL,
        ac_output_amps_2 REAL NOT NULL,
        ac_output_amps_3 REAL NOT NULL,
        ac_output_frequency_1 REAL NOT NULL,
        ac_output_frequency_2 REAL NOT NULL,
        ac_output_frequency_3 REAL NOT NULL,
        ac_output_watts_1 REAL NOT NULL,
        ac_output_watts_2 REAL NOT NULL,
        ac_output_watts_3 REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_samples_date ON samples(date);
"#;
