//! TCP client and poller for Omnik solar inverters.
//!
//! Omnik inverters expose their live telemetry through a Wi-Fi module that
//! listens on TCP port 8899. A client authenticates with a frame derived
//! from the module's serial number and receives a single fixed-layout
//! status reply terminated by a newline.
//!
//! # Features
//!
//! - **Auth frames**: build the serial-derived request ([`AuthCommand`])
//! - **One-shot reads**: connect, send, receive and decode ([`InverterSession`])
//! - **Periodic polling**: one read per tick, never overlapping ([`Poller`])
//! - **Testing**: a network-free [`MockInverter`]
//!
//! # Quick Start
//!
//! ```no_run
//! use omnik_core::{InverterInfo, InverterSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = InverterSession::new(InverterInfo::new("192.168.1.40", 1_612_345_678));
//!     let sample = session.read().await?;
//!     println!("{} W, {} kWh today", sample.power, sample.energy_today);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod mock;
pub mod poller;
pub mod session;
pub mod traits;

pub use auth::AuthCommand;
pub use error::{Error, Result};
pub use mock::MockInverter;
pub use poller::{Poller, PollerHandle, PollerOptions};
pub use session::{
    Clock, InverterSession, REPLY_DELIMITER, SERVICE_PORT, SessionOptions, SessionState,
    local_now,
};
pub use traits::{Inverter, OmnikDecoder, SampleDecoder};

/// Type alias for a shared inverter reference.
///
/// The poller and the collector both hold the inverter behind an `Arc` so
/// the same instance can be read from a background task.
pub type SharedInverter = std::sync::Arc<dyn Inverter>;

// Re-export from omnik-types
pub use omnik_types::{Adjacency, InverterInfo, ParseError, Sample, TimeKWH};
