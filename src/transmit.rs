//! Transmit drivers.
//!
//! The core hands every send to a per-band [`TxDriver`] after re-asserting
//! the driver's protocol/pulse/repeat configuration: shared driver state may
//! have drifted between sends, so it is reprogrammed immediately before each
//! one. An unbound driver slot means sends silently do nothing.

use crate::codec::{self, BitOrder};
use crate::protocol::{build_frame, wire_format, LevelDuration};
use crate::serial::LineSink;
use crate::signal::RemoteSignal;
use crate::hw::OutputPin;

/// Everything a driver needs to emit one signal.
#[derive(Debug, Clone)]
pub struct TxFrame {
    pub address: String,
    pub key: String,
    /// 24-bit transmission code: the top 24 bits of address+key.
    pub code24: u32,
}

impl TxFrame {
    pub fn from_signal(signal: &RemoteSignal) -> Self {
        let full = codec::decode32(&signal.full_hex());
        Self {
            address: signal.address.clone(),
            key: signal.key.clone(),
            code24: codec::extract_code24(full),
        }
    }
}

/// A reusable frequency-specific transmit driver.
pub trait TxDriver: Send {
    /// Reprogram protocol id, base pulse unit, and repeat count. Called
    /// before every send.
    fn configure(&mut self, protocol: u8, pulse_us: u16, repeats: u8);

    /// Emit the 24-bit code. No return value: failure is logged, not raised.
    fn send(&mut self, frame: &TxFrame);

    /// Replay a raw pulse train. Drivers without raw support log and no-op.
    fn send_raw(&mut self, timings: &[u32], repeats: u8) {
        let _ = timings;
        let _ = repeats;
        tracing::warn!("raw transmit not supported by this driver");
    }
}

/// Bit-banged transmitter driving a GPIO output pin directly.
///
/// Timing is approximate on a hosted target (thread sleep granularity); on
/// the device build the pin type provides busy-wait delays.
pub struct PinTransmitter<P: OutputPin> {
    pin: P,
    protocol: u8,
    pulse_us: u16,
    repeats: u8,
    order: BitOrder,
}

impl<P: OutputPin> PinTransmitter<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            protocol: crate::protocol::DEFAULT_PROTOCOL,
            pulse_us: crate::protocol::DEFAULT_PULSE_US,
            repeats: crate::protocol::DEFAULT_REPEATS,
            order: BitOrder::Standard,
        }
    }

    /// Select a legacy bit-order variant. Production configs leave this at
    /// `Standard`.
    pub fn with_order(mut self, order: BitOrder) -> Self {
        self.order = order;
        self
    }

    fn emit(&mut self, pulses: &[LevelDuration]) {
        for pulse in pulses {
            self.pin.set(pulse.level);
            sleep_us(pulse.duration_us);
        }
    }
}

impl<P: OutputPin> TxDriver for PinTransmitter<P> {
    fn configure(&mut self, protocol: u8, pulse_us: u16, repeats: u8) {
        self.protocol = protocol;
        self.pulse_us = pulse_us;
        self.repeats = repeats;
    }

    fn send(&mut self, frame: &TxFrame) {
        let format = wire_format(self.protocol);
        let pulses = build_frame(frame.code24, format, self.pulse_us, self.order);
        tracing::debug!(
            code = %format_args!("{:06X}", frame.code24),
            protocol = format.id,
            pulse_us = self.pulse_us,
            repeats = self.repeats,
            "bit-banging frame"
        );
        for _ in 0..self.repeats.max(1) {
            self.emit(&pulses);
        }
        self.pin.set(false);
    }

    fn send_raw(&mut self, timings: &[u32], repeats: u8) {
        if timings.is_empty() {
            tracing::warn!("empty raw pulse train, nothing sent");
            return;
        }
        let pulses: Vec<LevelDuration> = timings
            .iter()
            .enumerate()
            .map(|(i, &us)| LevelDuration::new(i % 2 == 0, us))
            .collect();
        for _ in 0..repeats.max(1) {
            self.emit(&pulses);
        }
        self.pin.set(false);
    }
}

/// Driver that forwards sends to the companion transmitter module as
/// `TX:<address><key>` lines. Protocol and timing live in the module itself,
/// so `configure` has nothing to program.
pub struct LineTransmitter<S: LineSink> {
    sink: S,
}

impl<S: LineSink> LineTransmitter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: LineSink> TxDriver for LineTransmitter<S> {
    fn configure(&mut self, _protocol: u8, _pulse_us: u16, _repeats: u8) {}

    fn send(&mut self, frame: &TxFrame) {
        let Some(command) = crate::line::format_tx_command(&frame.address, &frame.key) else {
            return;
        };
        if let Err(e) = self.sink.write_line(&command) {
            tracing::warn!(error = %e, "TX command write failed");
        } else {
            tracing::debug!(%command, "sent TX command");
        }
    }
}

/// Driver that only logs. Stands in when no hardware is configured.
pub struct DemoTransmitter;

impl TxDriver for DemoTransmitter {
    fn configure(&mut self, protocol: u8, pulse_us: u16, repeats: u8) {
        tracing::trace!(protocol, pulse_us, repeats, "demo driver configured");
    }

    fn send(&mut self, frame: &TxFrame) {
        tracing::info!(
            code = %format_args!("{:06X}", frame.code24),
            "demo mode: would transmit"
        );
    }

    fn send_raw(&mut self, timings: &[u32], repeats: u8) {
        tracing::info!(edges = timings.len(), repeats, "demo mode: would replay raw");
    }
}

fn sleep_us(us: u32) {
    std::thread::sleep(std::time::Duration::from_micros(u64::from(us)));
}
