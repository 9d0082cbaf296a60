//! Main store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::{debug, info};

use omnik_types::{Adjacency, Sample, TimeKWH};

use crate::error::{Error, Result};
use crate::schema;
use crate::trim::trim_dark;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second]");

const INSERT_SAMPLE: &str = "INSERT INTO samples (
        time_of_measurement, date, time, temp, total_kwh, today_kwh, total_hours, current_watts,
        pv_input_voltage_1, pv_input_voltage_2, pv_input_voltage_3,
        pv_input_amps_1, pv_input_amps_2, pv_input_amps_3,
        ac_output_voltage_1, ac_output_voltage_2, ac_output_voltage_3,
        ac_output_amps_1, ac_output_amps_2, ac_output_amps_3,
        ac_output_frequency_1, ac_output_frequency_2, ac_output_frequency_3,
        ac_output_watts_1, ac_output_watts_2, ac_output_watts_3)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
        ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)";

const SELECT_SAMPLE: &str = "SELECT
        time_of_measurement, date, time, temp, total_kwh, today_kwh, total_hours, current_watts,
        pv_input_voltage_1, pv_input_voltage_2, pv_input_voltage_3,
        pv_input_amps_1, pv_input_amps_2, pv_input_amps_3,
        ac_output_voltage_1, ac_output_voltage_2, ac_output_voltage_3,
        ac_output_amps_1, ac_output_amps_2, ac_output_amps_3,
        ac_output_frequency_1, ac_output_frequency_2, ac_output_frequency_3,
        ac_output_watts_1, ac_output_watts_2, ac_output_watts_3
    FROM samples";

/// SQLite-based store for inverter samples.
///
/// A `Store` is fully initialised when construction returns. The
/// connection sits behind a mutex so one handle can be shared (via `Arc`)
/// between the collector and the [`KeepAlive`](crate::KeepAlive) pinger.
pub struct Store {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a database at the given path and bootstrap its
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreateDirectory`] if the parent directory cannot be
    /// created and [`Error::FatalConfiguration`] if the database cannot be
    /// opened or its tables cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path).map_err(|e| {
            Error::FatalConfiguration(format!("cannot open {}: {e}", path.display()))
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::FatalConfiguration(format!("cannot configure database: {e}")))?;

        schema::bootstrap(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::FatalConfiguration(format!("cannot open in-memory db: {e}")))?;
        schema::bootstrap(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    // === Writes ===

    /// Append a sample and return its row id.
    pub fn insert(&self, sample: &Sample) -> Result<i64> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(INSERT_SAMPLE)?;
        stmt.execute(params![
            sample.timestamp.unix_timestamp(),
            format_date(sample.date)?,
            format_time(sample.time)?,
            f64::from(sample.temperature),
            f64::from(sample.energy_total),
            f64::from(sample.energy_today),
            sample.energy_hours,
            f64::from(sample.power),
            f64::from(sample.pv_voltage[0]),
            f64::from(sample.pv_voltage[1]),
            f64::from(sample.pv_voltage[2]),
            f64::from(sample.pv_current[0]),
            f64::from(sample.pv_current[1]),
            f64::from(sample.pv_current[2]),
            f64::from(sample.ac_voltage[0]),
            f64::from(sample.ac_voltage[1]),
            f64::from(sample.ac_voltage[2]),
            f64::from(sample.ac_current[0]),
            f64::from(sample.ac_current[1]),
            f64::from(sample.ac_current[2]),
            f64::from(sample.ac_frequency[0]),
            f64::from(sample.ac_frequency[1]),
            f64::from(sample.ac_frequency[2]),
            f64::from(sample.ac_power[0]),
            f64::from(sample.ac_power[1]),
            f64::from(sample.ac_power[2]),
        ])?;

        let id = conn.last_insert_rowid();
        debug!("Stored sample {} for {}", id, sample.date);
        Ok(id)
    }

    // === Queries ===

    /// Number of stored samples.
    pub fn count_samples(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Run a trivial query to keep the connection warm.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Whether any sample is dated within `month` of `year`.
    pub fn has_month(&self, year: i32, month: Month) -> Result<bool> {
        let prefix = format!("{year:04}-{:02}%", u8::from(month));
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM samples WHERE date LIKE ?1)",
            [&prefix],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// All samples dated within `[start, end]`, oldest first.
    pub fn samples_in_range(&self, start: Date, end: Date) -> Result<Vec<Sample>> {
        let sql = format!(
            "{SELECT_SAMPLE} WHERE date BETWEEN ?1 AND ?2 ORDER BY date ASC, time_of_measurement ASC"
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let samples = stmt
            .query_map(params![format_date(start)?, format_date(end)?], sample_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("{} samples between {} and {}", samples.len(), start, end);
        Ok(samples)
    }

    /// One total per distinct date within `[start, end]`, oldest first.
    ///
    /// Each total is the highest today-energy reading of that date.
    pub fn daily_kwh_in_range(&self, start: Date, end: Date) -> Result<Vec<TimeKWH>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT date, MAX(today_kwh) FROM samples
             WHERE date BETWEEN ?1 AND ?2
             GROUP BY date ORDER BY date ASC",
        )?;

        let rows = stmt
            .query_map(params![format_date(start)?, format_date(end)?], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, kwh)| {
                Ok(TimeKWH {
                    date: parse_date(&date)?,
                    kwh: kwh as f32,
                })
            })
            .collect()
    }

    /// The most recently measured sample.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the store is empty.
    pub fn latest_sample(&self) -> Result<Sample> {
        let sql = format!("{SELECT_SAMPLE} ORDER BY time_of_measurement DESC, id DESC LIMIT 1");
        let conn = self.conn()?;
        conn.query_row(&sql, [], sample_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound("no samples stored".to_string()))
    }

    /// Samples of `date`, oldest first, with dark-hour readings trimmed
    /// from both ends.
    ///
    /// A date without any producing sample yields an empty vector.
    pub fn samples_for_date(&self, date: Date) -> Result<Vec<Sample>> {
        let sql = format!("{SELECT_SAMPLE} WHERE date = ?1 ORDER BY time_of_measurement ASC, id ASC");
        let samples = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map([format_date(date)?], sample_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let total = samples.len();
        let trimmed = trim_dark(samples);
        debug!(
            "{} of {} samples kept for {} after trimming",
            trimmed.len(),
            total,
            date
        );
        Ok(trimmed)
    }

    /// The nearest stored date strictly before or after `date`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no stored date lies in that direction.
    pub fn adjacent_date(&self, date: Date, direction: Adjacency) -> Result<Date> {
        let sql = match direction {
            Adjacency::Before => "SELECT MAX(date) FROM samples WHERE date < ?1",
            Adjacency::After => "SELECT MIN(date) FROM samples WHERE date > ?1",
        };

        let found: Option<String> = {
            let conn = self.conn()?;
            conn.query_row(sql, [format_date(date)?], |row| row.get(0))?
        };

        match found {
            Some(found) => parse_date(&found),
            None => Err(Error::NotFound(format!("no date {direction} {date}"))),
        }
    }

    /// Like [`adjacent_date`](Self::adjacent_date) with the direction given
    /// by name (`"before"` or `"after"`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for any other direction.
    pub fn adjacent_date_named(&self, date: Date, direction: &str) -> Result<Date> {
        let direction: Adjacency = direction.parse()?;
        self.adjacent_date(date, direction)
    }
}

fn format_date(date: Date) -> Result<String> {
    date.format(DATE_FORMAT)
        .map_err(|e| Error::InvalidTimestamp(format!("{date}: {e}")))
}

fn format_time(time: Time) -> Result<String> {
    time.format(TIME_FORMAT)
        .map_err(|e| Error::InvalidTimestamp(format!("{time}: {e}")))
}

fn parse_date(s: &str) -> Result<Date> {
    Date::parse(s, DATE_FORMAT).map_err(|e| Error::InvalidTimestamp(format!("{s}: {e}")))
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn real(row: &Row<'_>, idx: usize) -> rusqlite::Result<f32> {
    Ok(row.get::<_, f64>(idx)? as f32)
}

fn triple(row: &Row<'_>, first: usize) -> rusqlite::Result<[f32; 3]> {
    Ok([real(row, first)?, real(row, first + 1)?, real(row, first + 2)?])
}

/// Offset under which `instant` reads as `local`, or UTC if the two are
/// further apart than any real offset.
fn recorded_offset(instant: OffsetDateTime, local: PrimitiveDateTime) -> UtcOffset {
    let utc = PrimitiveDateTime::new(instant.date(), instant.time());
    i32::try_from((local - utc).whole_seconds())
        .ok()
        .and_then(|seconds| UtcOffset::from_whole_seconds(seconds).ok())
        .unwrap_or(UtcOffset::UTC)
}

/// Map a row selected with [`SELECT_SAMPLE`] back to a [`Sample`].
///
/// The stored local date and time restore the offset the sample was
/// recorded under.
fn sample_from_row(row: &Row<'_>) -> rusqlite::Result<Sample> {
    let instant = OffsetDateTime::from_unix_timestamp(row.get(0)?)
        .map_err(|e| conversion_error(0, Type::Integer, e))?;
    let date = Date::parse(&row.get::<_, String>(1)?, DATE_FORMAT)
        .map_err(|e| conversion_error(1, Type::Text, e))?;
    let time = Time::parse(&row.get::<_, String>(2)?, TIME_FORMAT)
        .map_err(|e| conversion_error(2, Type::Text, e))?;
    let timestamp = instant.to_offset(recorded_offset(instant, PrimitiveDateTime::new(date, time)));

    Ok(Sample {
        timestamp,
        date,
        time,
        temperature: real(row, 3)?,
        energy_total: real(row, 4)?,
        energy_today: real(row, 5)?,
        energy_hours: row.get(6)?,
        power: real(row, 7)?,
        pv_voltage: triple(row, 8)?,
        pv_current: triple(row, 11)?,
        ac_voltage: triple(row, 14)?,
        ac_current: triple(row, 17)?,
        ac_frequency: triple(row, 20)?,
        ac_power: triple(row, 23)?,
    })
}
