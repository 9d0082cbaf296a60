//! Core types for Omnik inverter telemetry.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};

use crate::error::{ParseError, ParseResult};

/// Byte offsets of the fields in an inverter status reply.
///
/// All values are big-endian. 16-bit fields are followed by their
/// divisor where one applies.
pub mod layout {
    /// Inverter temperature, tenths of a degree Celsius.
    pub const TEMPERATURE: usize = 31;
    /// PV input voltage of string 1, tenths of a volt (strings 2 and 3 follow).
    pub const PV_VOLTAGE: usize = 33;
    /// PV input current of string 1, tenths of an ampere.
    pub const PV_CURRENT: usize = 39;
    /// AC output current of phase 1, tenths of an ampere.
    pub const AC_CURRENT: usize = 45;
    /// AC output voltage of phase 1, tenths of a volt.
    pub const AC_VOLTAGE: usize = 51;
    /// AC output frequency of phase 1, hundredths of a hertz.
    ///
    /// Frequency and power are interleaved per phase with a 4 byte stride.
    pub const AC_FREQUENCY: usize = 57;
    /// AC output power of phase 1, watts.
    pub const AC_POWER: usize = 59;
    /// Energy generated today, hundredths of a kWh.
    pub const ENERGY_TODAY: usize = 69;
    /// Energy generated over the inverter's lifetime, tenths of a kWh (32-bit).
    pub const ENERGY_TOTAL: usize = 71;
    /// Operating hours over the inverter's lifetime (32-bit).
    pub const HOURS_TOTAL: usize = 75;
    /// Minimum reply length holding every field above.
    pub const MIN_LEN: usize = 79;
}

/// Identifies one inverter on the network.
///
/// The serial number is printed on the inverter's Wi-Fi module and is the
/// only secret needed to derive its authentication command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InverterInfo {
    /// Host name or IP address of the inverter's Wi-Fi module.
    pub address: String,
    /// Serial number of the Wi-Fi module.
    pub serial: u64,
}

impl InverterInfo {
    /// Create inverter connection info.
    pub fn new(address: impl Into<String>, serial: u64) -> Self {
        Self {
            address: address.into(),
            serial,
        }
    }
}

impl fmt::Display for InverterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (serial {})", self.address, self.serial)
    }
}

/// One telemetry snapshot read from an inverter.
///
/// `date` and `time` are the calendar parts of `timestamp`, kept as
/// separate fields because storage and reporting are keyed by date.
/// Constructors truncate `timestamp` to whole seconds, the resolution the
/// store keeps.
/// Three-element arrays hold per-string (PV) or per-phase (AC) values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// When the reply was received.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Calendar date of the measurement.
    pub date: Date,
    /// Time of day of the measurement.
    pub time: Time,
    /// Inverter temperature in Celsius.
    pub temperature: f32,
    /// Lifetime generated energy in kWh.
    pub energy_total: f32,
    /// Energy generated today in kWh; resets at the start of each day.
    pub energy_today: f32,
    /// Lifetime operating hours.
    pub energy_hours: u32,
    /// Instantaneous output power in watts.
    pub power: f32,
    /// PV input voltage per string in volts.
    pub pv_voltage: [f32; 3],
    /// PV input current per string in amperes.
    pub pv_current: [f32; 3],
    /// AC output voltage per phase in volts.
    pub ac_voltage: [f32; 3],
    /// AC output current per phase in amperes.
    pub ac_current: [f32; 3],
    /// AC output frequency per phase in hertz.
    pub ac_frequency: [f32; 3],
    /// AC output power per phase in watts.
    pub ac_power: [f32; 3],
}

impl Sample {
    /// Create an all-zero sample observed at `timestamp`.
    ///
    /// This is the shape the inverter reports while it is dark.
    #[must_use]
    pub fn at(timestamp: OffsetDateTime) -> Self {
        let timestamp = whole_second(timestamp);
        Self {
            timestamp,
            date: timestamp.date(),
            time: timestamp.time(),
            temperature: 0.0,
            energy_total: 0.0,
            energy_today: 0.0,
            energy_hours: 0,
            power: 0.0,
            pv_voltage: [0.0; 3],
            pv_current: [0.0; 3],
            ac_voltage: [0.0; 3],
            ac_current: [0.0; 3],
            ac_frequency: [0.0; 3],
            ac_power: [0.0; 3],
        }
    }

    /// Decode an inverter status reply received at `observed_at`.
    ///
    /// `payload` is the reply without its trailing newline. Bytes past
    /// [`layout::MIN_LEN`] are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidData`] if `payload` is shorter than
    /// [`layout::MIN_LEN`].
    pub fn from_payload(payload: &[u8], observed_at: OffsetDateTime) -> ParseResult<Self> {
        if payload.len() < layout::MIN_LEN {
            return Err(ParseError::InvalidData(format!(
                "status reply requires {} bytes, got {}",
                layout::MIN_LEN,
                payload.len()
            )));
        }

        let short = |offset: usize, divisor: f32| {
            f32::from(u16::from_be_bytes([payload[offset], payload[offset + 1]])) / divisor
        };
        let long = |offset: usize| {
            u32::from_be_bytes([
                payload[offset],
                payload[offset + 1],
                payload[offset + 2],
                payload[offset + 3],
            ])
        };
        let triple = |first: usize, stride: usize, divisor: f32| {
            [0, 1, 2].map(|i| short(first + i * stride, divisor))
        };

        let ac_power = triple(layout::AC_POWER, 4, 1.0);
        let observed_at = whole_second(observed_at);

        Ok(Self {
            timestamp: observed_at,
            date: observed_at.date(),
            time: observed_at.time(),
            temperature: short(layout::TEMPERATURE, 10.0),
            energy_total: long(layout::ENERGY_TOTAL) as f32 / 10.0,
            energy_today: short(layout::ENERGY_TODAY, 100.0),
            energy_hours: long(layout::HOURS_TOTAL),
            power: ac_power[0],
            pv_voltage: triple(layout::PV_VOLTAGE, 2, 10.0),
            pv_current: triple(layout::PV_CURRENT, 2, 10.0),
            ac_voltage: triple(layout::AC_VOLTAGE, 2, 10.0),
            ac_current: triple(layout::AC_CURRENT, 2, 10.0),
            ac_frequency: triple(layout::AC_FREQUENCY, 4, 100.0),
            ac_power,
        })
    }

    /// Whether the inverter had generated energy today when sampled.
    #[must_use]
    pub fn is_producing(&self) -> bool {
        self.energy_today > 0.0
    }
}

fn whole_second(instant: OffsetDateTime) -> OffsetDateTime {
    instant - time::Duration::nanoseconds(i64::from(instant.nanosecond()))
}

/// Total energy generated on one date.
///
/// `kwh` is the highest today-energy counter observed that date, which is
/// the day's total because the counter only grows until midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeKWH {
    /// The calendar date.
    pub date: Date,
    /// Energy generated that date in kWh.
    pub kwh: f32,
}

/// Direction of a nearest-date lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Adjacency {
    /// Strictly earlier than the reference date.
    Before,
    /// Strictly later than the reference date.
    After,
}

impl FromStr for Adjacency {
    type Err = ParseError;

    /// Parse a direction, case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use omnik_types::Adjacency;
    ///
    /// assert_eq!("before".parse(), Ok(Adjacency::Before));
    /// assert_eq!("After".parse(), Ok(Adjacency::After));
    /// assert!("sideways".parse::<Adjacency>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "before" => Ok(Adjacency::Before),
            "after" => Ok(Adjacency::After),
            _ => Err(ParseError::InvalidAdjacency(s.to_string())),
        }
    }
}

impl fmt::Display for Adjacency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjacency::Before => write!(f, "before"),
            Adjacency::After => write!(f, "after"),
        }
    }
}
