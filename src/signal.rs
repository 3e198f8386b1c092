//! Signal data structures shared across the receive, transmit, and storage paths.

use serde::{Deserialize, Serialize};

/// Hex digits in an address code (24 bits).
pub const ADDRESS_HEX_LEN: usize = 6;
/// Hex digits in a key/button value (8 bits).
pub const KEY_HEX_LEN: usize = 2;

/// Carrier band of a signal.
///
/// Each band has its own transmit driver, receive path, and wire-format
/// configuration. The 433 MHz receive path is a decoding companion module on a
/// UART; the 315 MHz path is an interrupt-capturing pulse driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Mhz433,
    Mhz315,
}

impl Band {
    pub const ALL: [Band; 2] = [Band::Mhz433, Band::Mhz315];

    pub fn label(&self) -> &'static str {
        match self {
            Band::Mhz433 => "433MHz",
            Band::Mhz315 => "315MHz",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A decoded fixed-code remote signal (EV1527/PT2262 class).
///
/// `address` is the 6-hex-digit (24-bit) transmitter identifier, the portion
/// actually modulated onto the carrier. `key` is the 2-hex-digit button value
/// appended by the decoding peripheral; it is not itself transmitted.
///
/// Both fields are canonicalized to upper case on construction. The empty
/// sentinel (both fields empty) is never valid for send or compare operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSignal {
    pub address: String,
    pub key: String,
    pub band: Band,
    /// Wire-format id used when the signal was received.
    pub protocol: u8,
    /// Base pulse unit in microseconds observed at reception.
    pub pulse_us: u16,
}

impl RemoteSignal {
    pub fn new(
        address: impl Into<String>,
        key: impl Into<String>,
        band: Band,
        protocol: u8,
        pulse_us: u16,
    ) -> Self {
        Self {
            address: address.into().to_uppercase(),
            key: key.into().to_uppercase(),
            band,
            protocol,
            pulse_us,
        }
    }

    /// The empty sentinel: no address, no key. Never sendable.
    pub fn empty(band: Band) -> Self {
        Self {
            address: String::new(),
            key: String::new(),
            band,
            protocol: crate::protocol::DEFAULT_PROTOCOL,
            pulse_us: crate::protocol::DEFAULT_PULSE_US,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty() || self.key.is_empty()
    }

    /// A signal is valid when address and key are exactly 6 and 2 hex digits.
    pub fn is_valid(&self) -> bool {
        self.address.len() == ADDRESS_HEX_LEN
            && self.key.len() == KEY_HEX_LEN
            && self.address.chars().all(|c| c.is_ascii_hexdigit())
            && self.key.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Address and key concatenated into the 8-digit textual representation.
    pub fn full_hex(&self) -> String {
        format!("{}{}", self.address, self.key)
    }
}

impl std::fmt::Display for RemoteSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "(empty, {})", self.band)
        } else {
            write!(f, "{}{} ({})", self.address, self.key, self.band)
        }
    }
}

/// A raw pulse train captured when decoding was not possible.
///
/// `timings` holds pulse durations in microseconds, alternating high/low.
/// The vector is owned: every buffer insertion deep-copies it, because the
/// capturing driver reuses its own timing buffer between receptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCapture {
    pub timings: Vec<u32>,
    pub band: Band,
    pub valid: bool,
}

impl RawCapture {
    pub fn new(timings: Vec<u32>, band: Band) -> Self {
        let valid = !timings.is_empty();
        Self {
            timings,
            band,
            valid,
        }
    }

    /// An invalid placeholder with no timing data.
    pub fn invalid(band: Band) -> Self {
        Self {
            timings: Vec::new(),
            band,
            valid: false,
        }
    }

    /// Number of recorded edges.
    pub fn change_count(&self) -> usize {
        self.timings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_to_upper_case() {
        let sig = RemoteSignal::new("62e7e8", "31", Band::Mhz433, 1, 320);
        assert_eq!(sig.address, "62E7E8");
        assert_eq!(sig.key, "31");
        assert_eq!(sig.full_hex(), "62E7E831");
        assert!(sig.is_valid());
    }

    #[test]
    fn empty_sentinel_is_never_valid() {
        let sig = RemoteSignal::empty(Band::Mhz315);
        assert!(sig.is_empty());
        assert!(!sig.is_valid());
    }

    #[test]
    fn wrong_length_is_invalid() {
        let sig = RemoteSignal::new("62E7", "31", Band::Mhz433, 1, 320);
        assert!(!sig.is_valid());
    }

    #[test]
    fn raw_capture_validity_follows_timings() {
        assert!(RawCapture::new(vec![320, 960], Band::Mhz315).valid);
        assert!(!RawCapture::invalid(Band::Mhz315).valid);
        assert_eq!(RawCapture::new(vec![1, 2, 3], Band::Mhz315).change_count(), 3);
    }
}
