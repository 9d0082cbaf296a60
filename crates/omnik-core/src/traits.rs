//! Trait abstractions for inverter reads.
//!
//! [`Inverter`] abstracts over the real TCP session and the mock used in
//! tests; [`SampleDecoder`] abstracts over how a raw status reply becomes a
//! [`Sample`].

use async_trait::async_trait;
use time::OffsetDateTime;

use omnik_types::{InverterInfo, ParseResult, Sample};

use crate::error::Result;

/// Something that can produce one telemetry sample per call.
///
/// # Example
///
/// ```ignore
/// use omnik_core::{Inverter, Result};
///
/// async fn print_power<I: Inverter>(inverter: &I) -> Result<()> {
///     let sample = inverter.read_sample().await?;
///     println!("{} W", sample.power);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Inverter: Send + Sync {
    /// Connection details of the inverter.
    fn info(&self) -> &InverterInfo;

    /// Perform one authenticate-and-read exchange.
    async fn read_sample(&self) -> Result<Sample>;
}

/// Turns a raw status reply into a [`Sample`].
pub trait SampleDecoder: Send + Sync {
    /// Decode `payload` (the reply without its newline) received at `observed_at`.
    fn decode(&self, payload: &[u8], observed_at: OffsetDateTime) -> ParseResult<Sample>;
}

/// Decoder for the fixed-offset status reply of Omnik inverters.
#[derive(Debug, Clone, Copy, Default)]
pub struct OmnikDecoder;

impl SampleDecoder for OmnikDecoder {
    fn decode(&self, payload: &[u8], observed_at: OffsetDateTime) -> ParseResult<Sample> {
        Sample::from_payload(payload, observed_at)
    }
}
