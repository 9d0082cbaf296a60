//! Read-only queries against the sample store, rendered as JSON.

use serde_json::{Value, json};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month};

use omnik_store::Store;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// A query the command line can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// The most recent sample.
    Latest,
    /// One day's samples with dark hours trimmed.
    Day(Date),
    /// Daily totals over an inclusive date range.
    Daily { start: Date, end: Date },
    /// The nearest stored date before or after a date.
    Adjacent { date: Date, direction: String },
    /// Whether any sample falls within a month.
    HasMonth { year: i32, month: Month },
}

impl Query {
    /// Run the query and return its result as JSON.
    pub fn execute(&self, store: &Store) -> omnik_store::Result<Value> {
        let value = match self {
            Query::Latest => json!(store.latest_sample()?),
            Query::Day(date) => json!(store.samples_for_date(*date)?),
            Query::Daily { start, end } => json!(store.daily_kwh_in_range(*start, *end)?),
            Query::Adjacent { date, direction } => {
                json!({ "date": store.adjacent_date_named(*date, direction)? })
            }
            Query::HasMonth { year, month } => json!({
                "month": format!("{year:04}-{:02}", u8::from(*month)),
                "present": store.has_month(*year, *month)?,
            }),
        };
        Ok(value)
    }
}

/// Parse a `YYYY-MM-DD` command-line argument.
pub fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s, DATE_FORMAT).map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}

/// Parse a `YYYY-MM` command-line argument.
pub fn parse_month(s: &str) -> Result<(i32, Month), String> {
    let invalid = || format!("invalid month '{s}' (expected YYYY-MM)");

    let (year, month) = s.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u8 = month.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    Ok((year, month))
}
