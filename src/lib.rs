//! rfreplay: fixed-code 433/315 MHz remote signal capture, storage, and
//! replay.
//!
//! The core of the crate is the signal codec and timing-replay engine:
//! decoding a transmitter's 24-bit address + 8-bit key from serial protocol
//! lines or interrupt-captured pulse values, re-encoding it with
//! protocol-correct pulse widths and repeat counts, and the bounded circular
//! [`history::HistoryBuffer`] of recently seen signals. Around that sit the
//! one-shot [`capture`] state machine, the named [`registry`], key-value
//! [`store`] persistence, and the [`api`] surface the management web layer
//! calls into.
//!
//! Hardware (RF transmit pins, the decoding companion modules on their
//! UARTs, buttons, the LED) lives behind the driver traits in [`hw`],
//! [`serial`], [`transmit`], and [`receive`], with demo implementations so
//! the whole pipeline runs on a host machine.

pub mod api;
pub mod capture;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod history;
pub mod hw;
pub mod line;
pub mod protocol;
pub mod receive;
pub mod registry;
pub mod serial;
pub mod service;
pub mod signal;
pub mod store;
pub mod transmit;
