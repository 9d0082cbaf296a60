//! Mock inverter for testing.
//!
//! [`MockInverter`] implements [`Inverter`] without any network I/O, so the
//! poller and the collector can be exercised deterministically, including
//! under tokio's paused clock.
//!
//! # Features
//!
//! - **Failure injection**: fail every read, or only the next N reads
//! - **Latency simulation**: delay each read with `tokio::time::sleep`
//! - **Overlap detection**: track the highest number of concurrent reads

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use omnik_types::{InverterInfo, Sample};

use crate::error::{Error, Result};
use crate::traits::Inverter;

/// A mock Omnik inverter.
///
/// # Example
///
/// ```
/// use omnik_core::{Inverter, MockInverter};
///
/// #[tokio::main]
/// async fn main() {
///     let inverter = MockInverter::new();
///     let sample = inverter.read_sample().await.unwrap();
///     assert_eq!(sample.power, 1250.0);
///     assert_eq!(inverter.read_count(), 1);
/// }
/// ```
pub struct MockInverter {
    info: InverterInfo,
    sample: RwLock<Sample>,
    read_count: AtomicU32,
    should_fail: AtomicBool,
    /// Reads to fail before succeeding again.
    remaining_failures: AtomicU32,
    /// Simulated read latency in milliseconds (0 = no delay).
    read_latency_ms: AtomicU64,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl std::fmt::Debug for MockInverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockInverter")
            .field("info", &self.info)
            .field("read_count", &self.read_count.load(Ordering::Relaxed))
            .field("should_fail", &self.should_fail.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockInverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInverter {
    /// Create a mock that returns a daytime sample on every read.
    pub fn new() -> Self {
        Self::with_sample(Self::default_sample())
    }

    /// Create a mock that returns `sample` on every read.
    pub fn with_sample(sample: Sample) -> Self {
        Self {
            info: InverterInfo::new("mock-inverter", 0x601A2B4E),
            sample: RwLock::new(sample),
            read_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            remaining_failures: AtomicU32::new(0),
            read_latency_ms: AtomicU64::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        }
    }

    /// Create a mock whose every read fails with a connection error.
    pub fn failing() -> Self {
        let mock = Self::new();
        mock.set_should_fail(true);
        mock
    }

    fn default_sample() -> Sample {
        let mut sample = Sample::at(OffsetDateTime::UNIX_EPOCH);
        sample.temperature = 38.5;
        sample.energy_total = 10_234.7;
        sample.energy_today = 6.42;
        sample.energy_hours = 21_480;
        sample.power = 1250.0;
        sample.pv_voltage = [312.4, 0.0, 0.0];
        sample.pv_current = [4.1, 0.0, 0.0];
        sample.ac_voltage = [231.2, 0.0, 0.0];
        sample.ac_current = [5.4, 0.0, 0.0];
        sample.ac_frequency = [50.01, 0.0, 0.0];
        sample.ac_power = [1250.0, 0.0, 0.0];
        sample
    }

    /// Replace the sample returned by successful reads.
    pub async fn set_sample(&self, sample: Sample) {
        *self.sample.write().await = sample;
    }

    /// Make every read fail (or succeed again).
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Fail the next `count` reads, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Delay every read by `latency`.
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of reads started, including failed and abandoned ones.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Highest number of reads that were in progress at the same time.
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::Relaxed)
    }

    fn failure(&self) -> Error {
        Error::Connection {
            endpoint: format!("{}:8899", self.info.address),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "mock failure"),
        }
    }

    fn should_fail_now(&self) -> bool {
        let transient = self
            .remaining_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        transient || self.should_fail.load(Ordering::Relaxed)
    }
}

/// Decrements the in-flight counter even when a read is abandoned mid-sleep.
struct InFlight<'a>(&'a AtomicU32);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU32, max: &AtomicU32) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Inverter for MockInverter {
    fn info(&self) -> &InverterInfo {
        &self.info
    }

    async fn read_sample(&self) -> Result<Sample> {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

        let latency = self.read_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.should_fail_now() {
            return Err(self.failure());
        }

        Ok(self.sample.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_sample() {
        let mock = MockInverter::new();
        let sample = mock.read_sample().await.unwrap();
        assert_eq!(sample.power, 1250.0);
        assert!(sample.is_producing());
        assert_eq!(mock.read_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let mock = MockInverter::failing();
        let err = mock.read_sample().await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(mock.read_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_transient_failures() {
        let mock = MockInverter::new();
        mock.set_transient_failures(2);

        assert!(mock.read_sample().await.is_err());
        assert!(mock.read_sample().await.is_err());
        assert!(mock.read_sample().await.is_ok());
        assert_eq!(mock.read_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_set_sample() {
        let mock = MockInverter::new();
        let dark = Sample::at(OffsetDateTime::UNIX_EPOCH);
        mock.set_sample(dark.clone()).await;
        assert_eq!(mock.read_sample().await.unwrap(), dark);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_latency_and_in_flight() {
        let mock = MockInverter::new();
        mock.set_read_latency(Duration::from_millis(100));

        let start = tokio::time::Instant::now();
        let (a, b) = tokio::join!(mock.read_sample(), mock.read_sample());
        assert!(a.is_ok() && b.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(mock.max_in_flight(), 2);
    }
}
