//! Receive paths.
//!
//! Two independent paths are polled every scheduler tick: the line-oriented
//! path (433 MHz decoding companion on a UART) and the interrupt-captured
//! path (315 MHz pulse driver). When neither can decode, the interrupt
//! driver's raw pulse train is available for opaque storage.

use crate::line::{parse_line, LineAssembler};
use crate::serial::LineSource;
use crate::signal::{Band, RawCapture, ADDRESS_HEX_LEN, KEY_HEX_LEN};

/// Hardware driver for the interrupt-captured receive path.
///
/// Mirrors the capture peripheral's register interface: a sticky "available"
/// flag with the decoded value, its bit length, the detected wire format,
/// the measured inter-edge delay, and the raw timing buffer. The timing
/// buffer is reused between receptions, so consumers must deep-copy it.
pub trait RxDriver: Send {
    fn available(&self) -> bool;
    fn received_value(&self) -> u32;
    fn received_bits(&self) -> u8;
    fn received_protocol(&self) -> u8;
    fn received_delay_us(&self) -> u16;
    fn received_timings(&self) -> &[u32];
    /// Clear the "available" flag. Called after every read, whether or not
    /// the value was usable, so stale data is never reprocessed.
    fn reset_available(&mut self);
}

/// Shortest decodable value on the interrupt path. Anything smaller cannot
/// carry even one address digit plus a key window and is rejected rather
/// than producing a degenerate decode.
pub const MIN_DECODE_BITS: u8 = 8;

/// Fields read out of the interrupt driver for one decoded reception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseDecode {
    pub address: String,
    pub key: String,
    pub protocol: u8,
    pub pulse_us: u16,
}

/// Split an interrupt-captured value into address/key hex windows.
///
/// The value is formatted as 8 upper-case hex digits. With 24 or more bits
/// the split is the standard 6+2. Below 24 bits the window shrinks to
/// `ceil(bits/4)` digits with clamped substring bounds: a best-effort
/// degraded decode, not an error. Below [`MIN_DECODE_BITS`] the value is
/// rejected.
pub fn decode_value(value: u32, bits: u8) -> Option<(String, String)> {
    if value == 0 || bits == 0 {
        return None;
    }
    if bits < MIN_DECODE_BITS {
        tracing::debug!(value, bits, "rejecting sub-minimum bit length");
        return None;
    }

    let hex = format!("{:08X}", value);
    if usize::from(bits) >= ADDRESS_HEX_LEN * 4 {
        return Some((
            hex[..ADDRESS_HEX_LEN].to_owned(),
            hex[ADDRESS_HEX_LEN..ADDRESS_HEX_LEN + KEY_HEX_LEN].to_owned(),
        ));
    }

    // Degraded window: only ceil(bits/4) digits are meaningful.
    let hex_len = (usize::from(bits) + 3) / 4;
    let addr_end = ADDRESS_HEX_LEN.min(hex_len);
    let key_end = (ADDRESS_HEX_LEN + KEY_HEX_LEN).min(hex_len + KEY_HEX_LEN);
    tracing::debug!(bits, hex_len, "degraded decode window");
    Some((hex[..addr_end].to_owned(), hex[addr_end..key_end].to_owned()))
}

/// Driver with nothing captured. Stands in for the 315 MHz pulse hardware
/// in demo mode.
pub struct IdleRxDriver;

impl RxDriver for IdleRxDriver {
    fn available(&self) -> bool {
        false
    }
    fn received_value(&self) -> u32 {
        0
    }
    fn received_bits(&self) -> u8 {
        0
    }
    fn received_protocol(&self) -> u8 {
        0
    }
    fn received_delay_us(&self) -> u16 {
        0
    }
    fn received_timings(&self) -> &[u32] {
        &[]
    }
    fn reset_available(&mut self) {}
}

/// The line-oriented receive path: byte stream in, parsed address/key out.
pub struct LineReceiver {
    source: Box<dyn LineSource>,
    assembler: LineAssembler,
}

impl LineReceiver {
    pub fn new(source: Box<dyn LineSource>) -> Self {
        Self {
            source,
            assembler: LineAssembler::new(),
        }
    }

    /// Service the byte stream. Returns at most one parsed signal per call;
    /// unread bytes stay queued for the next tick.
    ///
    /// With the channel disabled, pending bytes are drained and discarded so
    /// stale frames never surface once the channel is re-enabled.
    pub fn poll(&mut self, enabled: bool) -> Option<(String, String)> {
        if !enabled {
            while self.source.read_byte().is_some() {}
            self.assembler.reset();
            return None;
        }

        while let Some(byte) = self.source.read_byte() {
            if let Some(line) = self.assembler.push(byte) {
                match parse_line(&line) {
                    Some(pair) => return Some(pair),
                    None => tracing::debug!(%line, "not a signal line, dropped"),
                }
            }
        }
        None
    }
}

/// The interrupt-captured receive path over an [`RxDriver`].
pub struct PulseReceiver {
    driver: Box<dyn RxDriver>,
}

impl PulseReceiver {
    pub fn new(driver: Box<dyn RxDriver>) -> Self {
        Self { driver }
    }

    /// Service the driver's "available" flag. The flag is reset on every
    /// poll that finds it set, decodable or not.
    pub fn poll(&mut self, enabled: bool) -> Option<PulseDecode> {
        if !self.driver.available() {
            return None;
        }
        if !enabled {
            self.driver.reset_available();
            return None;
        }

        let value = self.driver.received_value();
        let bits = self.driver.received_bits();
        let protocol = self.driver.received_protocol();
        let pulse_us = self.driver.received_delay_us();
        self.driver.reset_available();

        decode_value(value, bits).map(|(address, key)| PulseDecode {
            address,
            key,
            protocol,
            pulse_us,
        })
    }

    /// Read the raw pulse train instead of decoding. The timings are
    /// deep-copied out of the driver's reusable buffer.
    pub fn poll_raw(&mut self, band: Band, enabled: bool) -> Option<RawCapture> {
        if !self.driver.available() {
            return None;
        }
        if !enabled {
            self.driver.reset_available();
            return None;
        }

        let timings = self.driver.received_timings().to_vec();
        self.driver.reset_available();
        if timings.is_empty() {
            return None;
        }
        Some(RawCapture::new(timings, band))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_width_split() {
        assert_eq!(
            decode_value(0x62E7_E831, 32),
            Some(("62E7E8".into(), "31".into()))
        );
        assert_eq!(
            decode_value(0x0062_E7E8, 24),
            Some(("0062E7".into(), "E8".into()))
        );
    }

    #[test]
    fn degraded_window_twenty_bits() {
        // 20 bits -> 5 hex digits: address gets 5 chars, key the next 2.
        assert_eq!(
            decode_value(0x000A_BCDE, 20),
            Some(("000AB".into(), "CD".into()))
        );
    }

    #[test]
    fn degraded_window_eight_bits() {
        assert_eq!(
            decode_value(0x0000_00FF, 8),
            Some(("00".into(), "00".into()))
        );
    }

    #[test]
    fn sub_minimum_bits_rejected() {
        assert_eq!(decode_value(0x7, 4), None);
        assert_eq!(decode_value(0x1, 1), None);
    }

    #[test]
    fn zero_value_rejected() {
        assert_eq!(decode_value(0, 24), None);
        assert_eq!(decode_value(5, 0), None);
    }

    struct ScriptedSource(Vec<u8>);

    impl LineSource for ScriptedSource {
        fn read_byte(&mut self) -> Option<u8> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0))
            }
        }
    }

    #[test]
    fn line_receiver_parses_complete_frames() {
        let mut rx = LineReceiver::new(Box::new(ScriptedSource(b"LC:62E7E831\r\n".to_vec())));
        assert_eq!(
            rx.poll(true),
            Some(("62E7E8".into(), "31".into()))
        );
        assert_eq!(rx.poll(true), None);
    }

    #[test]
    fn disabled_line_receiver_drains_without_decoding() {
        let mut rx = LineReceiver::new(Box::new(ScriptedSource(b"LC:62E7E831\n".to_vec())));
        assert_eq!(rx.poll(false), None);
        // Bytes were consumed while disabled; nothing left to decode.
        assert_eq!(rx.poll(true), None);
    }

    pub(crate) struct ScriptedRx {
        pub value: u32,
        pub bits: u8,
        pub protocol: u8,
        pub delay_us: u16,
        pub timings: Vec<u32>,
        pub available: bool,
    }

    impl RxDriver for ScriptedRx {
        fn available(&self) -> bool {
            self.available
        }
        fn received_value(&self) -> u32 {
            self.value
        }
        fn received_bits(&self) -> u8 {
            self.bits
        }
        fn received_protocol(&self) -> u8 {
            self.protocol
        }
        fn received_delay_us(&self) -> u16 {
            self.delay_us
        }
        fn received_timings(&self) -> &[u32] {
            &self.timings
        }
        fn reset_available(&mut self) {
            self.available = false;
        }
    }

    #[test]
    fn pulse_receiver_decodes_and_resets() {
        let mut rx = PulseReceiver::new(Box::new(ScriptedRx {
            value: 0x62E7_E831,
            bits: 32,
            protocol: 1,
            delay_us: 320,
            timings: vec![],
            available: true,
        }));
        let decode = rx.poll(true).unwrap();
        assert_eq!(decode.address, "62E7E8");
        assert_eq!(decode.key, "31");
        assert_eq!(decode.protocol, 1);
        assert_eq!(decode.pulse_us, 320);
        // Flag was reset: a second poll sees nothing.
        assert_eq!(rx.poll(true), None);
    }

    #[test]
    fn pulse_receiver_resets_even_when_undecodable() {
        let mut rx = PulseReceiver::new(Box::new(ScriptedRx {
            value: 0x3,
            bits: 2,
            protocol: 1,
            delay_us: 320,
            timings: vec![],
            available: true,
        }));
        assert_eq!(rx.poll(true), None);
        assert_eq!(rx.poll(true), None);
    }

    #[test]
    fn disabled_pulse_receiver_acknowledges_without_decoding() {
        let mut rx = PulseReceiver::new(Box::new(ScriptedRx {
            value: 0x62E7_E831,
            bits: 32,
            protocol: 1,
            delay_us: 320,
            timings: vec![],
            available: true,
        }));
        assert_eq!(rx.poll(false), None);
        assert_eq!(rx.poll(true), None);
    }

    #[test]
    fn raw_poll_deep_copies_timings() {
        let mut rx = PulseReceiver::new(Box::new(ScriptedRx {
            value: 0,
            bits: 0,
            protocol: 0,
            delay_us: 0,
            timings: vec![320, 960, 320],
            available: true,
        }));
        let raw = rx.poll_raw(Band::Mhz315, true).unwrap();
        assert!(raw.valid);
        assert_eq!(raw.timings, vec![320, 960, 320]);
        assert_eq!(raw.change_count(), 3);
        assert_eq!(rx.poll_raw(Band::Mhz315, true), None);
    }
}
