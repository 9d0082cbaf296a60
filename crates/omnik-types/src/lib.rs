//! Platform-agnostic types for Omnik solar inverter telemetry.
//!
//! This crate provides the shared data model used by the socket client
//! (omnik-core) and the time-series store (omnik-store).
//!
//! # Features
//!
//! - [`Sample`]: one telemetry snapshot, decodable from a raw status reply
//! - [`TimeKWH`]: daily energy totals
//! - [`InverterInfo`]: network address and serial of one inverter
//! - [`Adjacency`]: direction for nearest-date lookups
//!
//! # Example
//!
//! ```
//! use omnik_types::{Adjacency, InverterInfo};
//!
//! let inverter = InverterInfo::new("192.168.1.40", 1_612_345_678);
//! let direction: Adjacency = "before".parse()?;
//! # Ok::<(), omnik_types::ParseError>(())
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{Adjacency, InverterInfo, Sample, TimeKWH, layout};

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
        buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    fn status_reply() -> Vec<u8> {
        let mut buf = vec![0u8; 99];
        put_u16(&mut buf, layout::TEMPERATURE, 312);
        put_u16(&mut buf, layout::PV_VOLTAGE, 2345);
        put_u16(&mut buf, layout::PV_VOLTAGE + 2, 2201);
        put_u16(&mut buf, layout::PV_CURRENT, 35);
        put_u16(&mut buf, layout::AC_CURRENT, 41);
        put_u16(&mut buf, layout::AC_VOLTAGE, 2301);
        put_u16(&mut buf, layout::AC_FREQUENCY, 5001);
        put_u16(&mut buf, layout::AC_POWER, 943);
        put_u16(&mut buf, layout::AC_FREQUENCY + 4, 4998);
        put_u16(&mut buf, layout::ENERGY_TODAY, 1234);
        put_u32(&mut buf, layout::ENERGY_TOTAL, 45678);
        put_u32(&mut buf, layout::HOURS_TOTAL, 9876);
        buf
    }

    // --- Sample decoding tests ---

    #[test]
    fn test_decode_status_reply() {
        let observed = datetime!(2024-06-21 13:45:10 UTC);
        let sample = Sample::from_payload(&status_reply(), observed).unwrap();

        assert_eq!(sample.timestamp, observed);
        assert_eq!(sample.date, date!(2024 - 06 - 21));
        assert_eq!(sample.time, time!(13:45:10));
        assert!((sample.temperature - 31.2).abs() < 0.01);
        assert!((sample.pv_voltage[0] - 234.5).abs() < 0.01);
        assert!((sample.pv_voltage[1] - 220.1).abs() < 0.01);
        assert_eq!(sample.pv_voltage[2], 0.0);
        assert!((sample.pv_current[0] - 3.5).abs() < 0.01);
        assert!((sample.ac_current[0] - 4.1).abs() < 0.01);
        assert!((sample.ac_voltage[0] - 230.1).abs() < 0.01);
        assert!((sample.ac_frequency[0] - 50.01).abs() < 0.001);
        assert!((sample.ac_frequency[1] - 49.98).abs() < 0.001);
        assert_eq!(sample.ac_power[0], 943.0);
        assert_eq!(sample.power, 943.0);
        assert!((sample.energy_today - 12.34).abs() < 0.001);
        assert!((sample.energy_total - 4567.8).abs() < 0.01);
        assert_eq!(sample.energy_hours, 9876);
    }

    #[test]
    fn test_decode_truncates_to_whole_seconds() {
        let observed = datetime!(2024-06-01 13:30:00.25 +02:00);
        let sample = Sample::from_payload(&status_reply(), observed).unwrap();

        assert_eq!(sample.timestamp, datetime!(2024-06-01 13:30:00 +02:00));
        assert_eq!(sample.time, time!(13:30:00));
        assert_eq!(Sample::at(observed).timestamp, sample.timestamp);
    }

    #[test]
    fn test_decode_minimum_length() {
        let reply = vec![0u8; layout::MIN_LEN];
        let sample = Sample::from_payload(&reply, datetime!(2024-01-01 0:00 UTC)).unwrap();
        assert!(!sample.is_producing());
    }

    #[test]
    fn test_decode_insufficient_bytes() {
        let reply = vec![0u8; layout::MIN_LEN - 1];
        let result = Sample::from_payload(&reply, datetime!(2024-01-01 0:00 UTC));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("requires 79 bytes"));
    }

    #[test]
    fn test_decode_empty_payload() {
        assert!(Sample::from_payload(&[], datetime!(2024-01-01 0:00 UTC)).is_err());
    }

    #[test]
    fn test_decode_keeps_observation_offset() {
        let observed = datetime!(2024-03-31 23:30 +02:00);
        let sample = Sample::from_payload(&status_reply(), observed).unwrap();
        assert_eq!(sample.date, date!(2024 - 03 - 31));
        assert_eq!(sample.time, time!(23:30));
    }

    #[test]
    fn test_sample_at_is_dark() {
        let sample = Sample::at(datetime!(2024-01-05 05:00 UTC));
        assert_eq!(sample.date, date!(2024 - 01 - 05));
        assert_eq!(sample.energy_today, 0.0);
        assert!(!sample.is_producing());
    }

    // --- Adjacency tests ---

    #[test]
    fn test_adjacency_from_str() {
        assert_eq!("before".parse::<Adjacency>(), Ok(Adjacency::Before));
        assert_eq!("AFTER".parse::<Adjacency>(), Ok(Adjacency::After));
    }

    #[test]
    fn test_adjacency_rejects_unknown() {
        let err = "above".parse::<Adjacency>().unwrap_err();
        assert_eq!(err, ParseError::InvalidAdjacency("above".to_string()));
        assert!(err.to_string().contains("above"));
    }

    #[test]
    fn test_adjacency_display_roundtrip() {
        for direction in [Adjacency::Before, Adjacency::After] {
            assert_eq!(direction.to_string().parse::<Adjacency>(), Ok(direction));
        }
    }

    // --- InverterInfo tests ---

    #[test]
    fn test_inverter_info_display() {
        let info = InverterInfo::new("10.0.0.7", 1_612_345_678);
        assert_eq!(info.to_string(), "10.0.0.7 (serial 1612345678)");
    }

    // --- Serialization tests ---

    #[test]
    fn test_sample_serialization() {
        let mut sample = Sample::at(datetime!(2024-01-05 12:00 UTC));
        sample.energy_today = 7.5;

        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"timestamp\":\"2024-01-05T12:00:00Z\""));
        assert!(json.contains("\"date\":\"2024-01-05\""));
        assert!(json.contains("\"energy_today\":7.5"));

        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn test_adjacency_serialization() {
        assert_eq!(serde_json::to_string(&Adjacency::Before).unwrap(), "\"before\"");
        assert_eq!(serde_json::to_string(&Adjacency::After).unwrap(), "\"after\"");
    }

    #[test]
    fn test_time_kwh_serialization() {
        let total = TimeKWH {
            date: date!(2024 - 01 - 10),
            kwh: 7.5,
        };
        let json = serde_json::to_string(&total).unwrap();
        assert_eq!(json, r#"{"date":"2024-01-10","kwh":7.5}"#);
    }
}
