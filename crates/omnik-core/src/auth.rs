//! Authentication command for Omnik inverters.
//!
//! The inverter's Wi-Fi module answers a status request only if the request
//! carries the module's serial number in a fixed frame:
//!
//! ```text
//! 68 02 40 30 | serial x2, byte-reversed | 01 00 | checksum | 16
//! ```
//!
//! The serial is rendered as lowercase hex, the digit string is doubled, and
//! the doubled string is read back two digits at a time starting from the end.
//! The checksum is `(115 + sum of those bytes) mod 256`.

use core::fmt;

/// Frame header.
pub const HEADER: [u8; 4] = [0x68, 0x02, 0x40, 0x30];

/// Separator between the serial payload and the checksum.
pub const SEPARATOR: [u8; 2] = [0x01, 0x00];

/// Frame terminator.
pub const TERMINATOR: u8 = 0x16;

/// Starting value of the checksum accumulator.
pub const CHECKSUM_SEED: u32 = 115;

/// The authentication command for one serial number.
///
/// Construction is pure; sessions build it once and reuse it for every
/// exchange.
///
/// # Example
///
/// ```
/// use omnik_core::AuthCommand;
///
/// let command = AuthCommand::for_serial(0x601A2B4E);
/// assert_eq!(&command.as_bytes()[..4], &[0x68, 0x02, 0x40, 0x30]);
/// assert_eq!(command.as_bytes().last(), Some(&0x16));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthCommand {
    serial: u64,
    bytes: Vec<u8>,
}

impl AuthCommand {
    /// Build the command for `serial`.
    #[must_use]
    pub fn for_serial(serial: u64) -> Self {
        Self {
            serial,
            bytes: encode(serial),
        }
    }

    /// The serial this command authenticates.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// The full frame as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The doubled, byte-reversed serial between header and separator.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER.len()..self.bytes.len() - SEPARATOR.len() - 2]
    }

    /// The checksum byte.
    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 2]
    }
}

impl fmt::Display for AuthCommand {
    /// Space-separated lowercase hex, e.g. `68 02 40 30 ...`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Encode the authentication command for `serial`.
#[must_use]
pub fn encode(serial: u64) -> Vec<u8> {
    let payload = serial_payload(serial);
    let checksum = checksum(&payload);

    let mut frame = Vec::with_capacity(HEADER.len() + payload.len() + SEPARATOR.len() + 2);
    frame.extend_from_slice(&HEADER);
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&SEPARATOR);
    frame.push(checksum);
    frame.push(TERMINATOR);
    frame
}

/// Decode the doubled hex rendering of `serial` from its last digit pair
/// to its first.
fn serial_payload(serial: u64) -> Vec<u8> {
    let digits: Vec<u8> = format!("{serial:x}").bytes().map(hex_value).collect();
    let doubled: Vec<u8> = digits.iter().chain(digits.iter()).copied().collect();

    // The doubled string always has an even number of digits.
    doubled
        .rchunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect()
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        _ => digit - b'a' + 10,
    }
}

/// `(CHECKSUM_SEED + sum of payload) mod 256`.
fn checksum(payload: &[u8]) -> u8 {
    let sum = payload
        .iter()
        .fold(CHECKSUM_SEED, |acc, &byte| acc + u32::from(byte));
    (sum % 256) as u8
}
