//! Pulse wire formats for 1527-style fixed-code transmission.
//!
//! Every duration in a frame is an integer multiple of the configurable pulse
//! unit. A frame is: sync (31 high units, 1 low unit, or inverted), 24 data
//! bits, then a trailing low guard. Bits are PWM-coded at a fixed 1:3 ratio:
//! bit 0 = short high / long low, bit 1 = long high / short low.

use crate::codec::BitOrder;

/// Default wire-format id (the only one used by production transmit).
pub const DEFAULT_PROTOCOL: u8 = 1;
/// Default base pulse unit in microseconds.
pub const DEFAULT_PULSE_US: u16 = 320;
/// Default frame repeat count per send.
pub const DEFAULT_REPEATS: u8 = 5;

/// Bits in a transmission code.
pub const CODE_BITS: u8 = 24;
/// Trailing low guard between frames, microseconds.
pub const GUARD_US: u32 = 10_000;

/// One entry in the closed set of supported wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFormat {
    pub id: u8,
    /// Sync pulse as (high units, low units).
    pub sync: (u32, u32),
    /// Bit 0 as (high units, low units).
    pub zero: (u32, u32),
    /// Bit 1 as (high units, low units).
    pub one: (u32, u32),
    /// Swap high/low throughout the frame (guard excluded).
    pub inverted: bool,
}

/// The closed set of named wire formats. This is not a general protocol
/// registry: only one 24-bit addressing scheme is supported.
pub const WIRE_FORMATS: [WireFormat; 2] = [
    WireFormat {
        id: 1,
        sync: (31, 1),
        zero: (1, 3),
        one: (3, 1),
        inverted: false,
    },
    WireFormat {
        id: 2,
        sync: (31, 1),
        zero: (1, 3),
        one: (3, 1),
        inverted: true,
    },
];

/// Look up a wire format by id, falling back to format 1 for unknown ids.
pub fn wire_format(id: u8) -> &'static WireFormat {
    WIRE_FORMATS
        .iter()
        .find(|f| f.id == id)
        .unwrap_or(&WIRE_FORMATS[0])
}

/// A single level+duration segment of a pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelDuration {
    pub level: bool,
    pub duration_us: u32,
}

impl LevelDuration {
    pub fn new(level: bool, duration_us: u32) -> Self {
        Self { level, duration_us }
    }
}

/// Build one frame for `code24`: sync, 24 data bits, trailing guard.
///
/// Data bits go out MSB first, or LSB first under [`BitOrder::LsbFirst`];
/// value-level reorderings are applied before emission. Frame length is
/// always `2 + 48 + 1` segments.
pub fn build_frame(
    code24: u32,
    format: &WireFormat,
    pulse_us: u16,
    order: BitOrder,
) -> Vec<LevelDuration> {
    let unit = u32::from(pulse_us);
    let code = order.apply(code24);
    let mut frame = Vec::with_capacity(2 + usize::from(CODE_BITS) * 2 + 1);

    frame.push(LevelDuration::new(true, format.sync.0 * unit));
    frame.push(LevelDuration::new(false, format.sync.1 * unit));

    for i in 0..CODE_BITS {
        let shift = if order == BitOrder::LsbFirst {
            i
        } else {
            CODE_BITS - 1 - i
        };
        let bit = (code >> shift) & 1 != 0;
        let (high, low) = if bit { format.one } else { format.zero };
        frame.push(LevelDuration::new(true, high * unit));
        frame.push(LevelDuration::new(false, low * unit));
    }

    if format.inverted {
        for segment in frame.iter_mut() {
            segment.level = !segment.level;
        }
    }

    frame.push(LevelDuration::new(false, GUARD_US));
    frame
}
