//! The transceiver core: per-band configuration, receive pipelines, history,
//! capture, counters, and transmit with self-reception suppression.
//!
//! All shared mutable state lives in one [`Transceiver`] guarded by a single
//! mutex ([`SharedTransceiver`]); the receive-polling loop and the
//! button/management contexts both mutate through it. Receive-enabled flags
//! are atomics so transmit drivers and tests can observe them mid-send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::capture::{CaptureController, CaptureMode, ModeListener};
use crate::history::HistoryBuffer;
use crate::receive::{LineReceiver, PulseReceiver};
use crate::signal::{Band, RawCapture, RemoteSignal};
use crate::transmit::{TxDriver, TxFrame};

/// Settle delay after a transmission before the receive path is restored,
/// so the device does not hear its own send.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(200);

/// Per-band wire configuration and receive gate.
pub struct BandConfig {
    pub protocol: u8,
    pub pulse_us: u16,
    pub repeats: u8,
    enabled: Arc<AtomicBool>,
}

impl BandConfig {
    fn new() -> Self {
        Self {
            protocol: crate::protocol::DEFAULT_PROTOCOL,
            pulse_us: crate::protocol::DEFAULT_PULSE_US,
            repeats: crate::protocol::DEFAULT_REPEATS,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Sizing knobs for the core, fed from configuration.
pub struct CoreSettings {
    pub history_size: usize,
    pub raw_history_size: usize,
    pub settle: Duration,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            history_size: 10,
            raw_history_size: 10,
            settle: DEFAULT_SETTLE,
        }
    }
}

/// One reception surfaced by a poll tick. `captured` reports whether an
/// armed capture latched this reception.
#[derive(Debug, Clone)]
pub enum Received {
    Signal { signal: RemoteSignal, captured: bool },
    Raw { raw: RawCapture, captured: bool },
}

type SignalObserver = Box<dyn Fn(&RemoteSignal) + Send>;
type RawObserver = Box<dyn Fn(&RawCapture) + Send>;

pub struct Transceiver {
    cfg433: BandConfig,
    cfg315: BandConfig,
    tx433: Option<Box<dyn TxDriver>>,
    tx315: Option<Box<dyn TxDriver>>,
    line_rx: Option<LineReceiver>,
    pulse_rx: Option<PulseReceiver>,
    history: HistoryBuffer<RemoteSignal>,
    raw_history: HistoryBuffer<RawCapture>,
    capture: CaptureController,
    last_received: Option<RemoteSignal>,
    send_count: u32,
    receive_count: u32,
    observers: Vec<SignalObserver>,
    raw_observers: Vec<RawObserver>,
    settle: Duration,
}

impl Transceiver {
    pub fn new(settings: CoreSettings, capture: CaptureController) -> Self {
        Self {
            cfg433: BandConfig::new(),
            cfg315: BandConfig::new(),
            tx433: None,
            tx315: None,
            line_rx: None,
            pulse_rx: None,
            history: HistoryBuffer::new(settings.history_size),
            raw_history: HistoryBuffer::new(settings.raw_history_size),
            capture,
            last_received: None,
            send_count: 0,
            receive_count: 0,
            observers: Vec::new(),
            raw_observers: Vec::new(),
            settle: settings.settle,
        }
    }

    // ─── Driver binding ──────────────────────────────────────────────────

    pub fn bind_tx(&mut self, band: Band, driver: Box<dyn TxDriver>) {
        match band {
            Band::Mhz433 => self.tx433 = Some(driver),
            Band::Mhz315 => self.tx315 = Some(driver),
        }
    }

    /// Bind the line-oriented receive path (433 MHz companion module).
    pub fn bind_line_rx(&mut self, receiver: LineReceiver) {
        self.line_rx = Some(receiver);
    }

    /// Bind the interrupt-captured receive path (315 MHz pulse driver).
    pub fn bind_pulse_rx(&mut self, receiver: PulseReceiver) {
        self.pulse_rx = Some(receiver);
    }

    // ─── Band configuration ──────────────────────────────────────────────

    fn cfg(&self, band: Band) -> &BandConfig {
        match band {
            Band::Mhz433 => &self.cfg433,
            Band::Mhz315 => &self.cfg315,
        }
    }

    fn cfg_mut(&mut self, band: Band) -> &mut BandConfig {
        match band {
            Band::Mhz433 => &mut self.cfg433,
            Band::Mhz315 => &mut self.cfg315,
        }
    }

    pub fn set_protocol(&mut self, band: Band, protocol: u8) {
        self.cfg_mut(band).protocol = protocol;
    }

    pub fn set_pulse_us(&mut self, band: Band, pulse_us: u16) {
        self.cfg_mut(band).pulse_us = pulse_us;
    }

    pub fn set_repeats(&mut self, band: Band, repeats: u8) {
        self.cfg_mut(band).repeats = repeats;
    }

    pub fn receive_enabled(&self, band: Band) -> bool {
        self.cfg(band).enabled.load(Ordering::SeqCst)
    }

    pub fn set_receive_enabled(&mut self, band: Band, enabled: bool) {
        self.cfg(band).enabled.store(enabled, Ordering::SeqCst);
        tracing::debug!(band = %band, enabled, "receive gate changed");
    }

    /// Handle to the band's receive gate, for services and tests that need
    /// to observe it without locking the core.
    pub fn receive_flag(&self, band: Band) -> Arc<AtomicBool> {
        self.cfg(band).enabled.clone()
    }

    // ─── Receive ─────────────────────────────────────────────────────────

    /// Service both receive paths once. At most one reception is surfaced
    /// per tick; remaining input stays queued for the next tick.
    pub fn poll(&mut self) -> Option<Received> {
        let enabled315 = self.receive_enabled(Band::Mhz315);

        if self.capture.mode() == CaptureMode::ArmedRaw {
            let raw = self
                .pulse_rx
                .as_mut()
                .and_then(|rx| rx.poll_raw(Band::Mhz315, enabled315));
            if let Some(raw) = raw {
                let captured = self.dispatch_raw(&raw);
                return Some(Received::Raw { raw, captured });
            }
        } else {
            let decode = self.pulse_rx.as_mut().and_then(|rx| rx.poll(enabled315));
            if let Some(decode) = decode {
                let signal = RemoteSignal::new(
                    decode.address,
                    decode.key,
                    Band::Mhz315,
                    decode.protocol,
                    decode.pulse_us,
                );
                let captured = self.dispatch(&signal);
                return Some(Received::Signal { signal, captured });
            }
        }

        let enabled433 = self.receive_enabled(Band::Mhz433);
        let parsed = self.line_rx.as_mut().and_then(|rx| rx.poll(enabled433));
        if let Some((address, key)) = parsed {
            let signal = RemoteSignal::new(
                address,
                key,
                Band::Mhz433,
                self.cfg433.protocol,
                self.cfg433.pulse_us,
            );
            let captured = self.dispatch(&signal);
            return Some(Received::Signal { signal, captured });
        }

        None
    }

    /// Post-receive pipeline: capture check first (latch + persist +
    /// mode-listener), then history and last-received bookkeeping, then the
    /// observer callbacks, synchronously on the polling thread.
    fn dispatch(&mut self, signal: &RemoteSignal) -> bool {
        let captured = self.capture.on_signal(signal);
        self.receive_count = self.receive_count.wrapping_add(1);
        self.last_received = Some(signal.clone());
        self.history.push(signal.clone());
        for observer in &self.observers {
            observer(signal);
        }
        captured
    }

    /// Raw receptions are only latched/stored through an armed raw capture.
    fn dispatch_raw(&mut self, raw: &RawCapture) -> bool {
        if self.capture.on_raw(raw) {
            self.raw_history.push(raw.clone());
            for observer in &self.raw_observers {
                observer(raw);
            }
            true
        } else {
            false
        }
    }

    // ─── Transmit ────────────────────────────────────────────────────────

    /// Send a decoded signal on its band.
    ///
    /// The band's receive gate is suppressed for the duration of the
    /// transmission plus the settle delay, then restored to its *prior*
    /// state; a send never force-enables a disabled receiver. The empty
    /// sentinel and malformed signals are refused (logged, no state change).
    pub fn send(&mut self, signal: &RemoteSignal) {
        if !signal.is_valid() {
            tracing::warn!(%signal, "refusing to send invalid signal");
            return;
        }

        let band = signal.band;
        let prior = self.receive_enabled(band);
        self.set_receive_enabled(band, false);

        self.transmit_now(signal);
        std::thread::sleep(self.settle);

        self.set_receive_enabled(band, prior);
    }

    /// Replay a raw pulse train on its band, with the same suppression.
    pub fn send_raw(&mut self, raw: &RawCapture, repeats: u8) {
        if !raw.valid || raw.timings.is_empty() {
            tracing::warn!("refusing to send invalid raw signal");
            return;
        }

        let band = raw.band;
        let prior = self.receive_enabled(band);
        self.set_receive_enabled(band, false);

        self.send_count = self.send_count.wrapping_add(1);
        match self.tx_driver(band) {
            Some(driver) => driver.send_raw(&raw.timings, repeats),
            None => tracing::debug!(band = %band, "transmit driver unbound, raw send dropped"),
        }
        std::thread::sleep(self.settle);

        self.set_receive_enabled(band, prior);
    }

    fn tx_driver(&mut self, band: Band) -> Option<&mut Box<dyn TxDriver>> {
        match band {
            Band::Mhz433 => self.tx433.as_mut(),
            Band::Mhz315 => self.tx315.as_mut(),
        }
    }

    fn transmit_now(&mut self, signal: &RemoteSignal) {
        self.send_count = self.send_count.wrapping_add(1);

        let cfg = self.cfg(signal.band);
        let (protocol, pulse_us, repeats) = (cfg.protocol, cfg.pulse_us, cfg.repeats);
        let frame = TxFrame::from_signal(signal);

        match self.tx_driver(signal.band) {
            Some(driver) => {
                // Shared driver state may have drifted; re-assert before
                // every send.
                driver.configure(protocol, pulse_us, repeats);
                driver.send(&frame);
            }
            None => tracing::debug!(band = %signal.band, "transmit driver unbound, send dropped"),
        }
    }

    // ─── Capture passthrough ─────────────────────────────────────────────

    pub fn start_capture(&mut self) {
        self.capture.arm();
    }

    pub fn start_raw_capture(&mut self) {
        self.capture.arm_raw();
    }

    pub fn disarm_capture(&mut self) {
        self.capture.disarm();
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.capture.mode()
    }

    pub fn captured_signal(&self) -> Option<RemoteSignal> {
        self.capture.captured().cloned()
    }

    pub fn captured_raw(&self) -> Option<RawCapture> {
        self.capture.captured_raw().cloned()
    }

    pub fn clear_captured(&mut self) {
        self.capture.clear();
    }

    pub fn set_capture_listener(&mut self, listener: ModeListener) {
        self.capture.set_mode_listener(listener);
    }

    // ─── History and counters ────────────────────────────────────────────

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_get(&self, index: usize) -> Option<RemoteSignal> {
        self.history.get(index)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn raw_history_len(&self) -> usize {
        self.raw_history.len()
    }

    pub fn raw_history_get(&self, index: usize) -> Option<RawCapture> {
        self.raw_history.get(index)
    }

    pub fn last_received(&self) -> Option<RemoteSignal> {
        self.last_received.clone()
    }

    pub fn send_count(&self) -> u32 {
        self.send_count
    }

    pub fn receive_count(&self) -> u32 {
        self.receive_count
    }

    pub fn reset_counters(&mut self) {
        self.send_count = 0;
        self.receive_count = 0;
    }

    pub fn add_observer(&mut self, observer: SignalObserver) {
        self.observers.push(observer);
    }

    pub fn add_raw_observer(&mut self, observer: RawObserver) {
        self.raw_observers.push(observer);
    }
}

/// The single lock every execution context goes through.
#[derive(Clone)]
pub struct SharedTransceiver(Arc<Mutex<Transceiver>>);

impl SharedTransceiver {
    pub fn new(core: Transceiver) -> Self {
        Self(Arc::new(Mutex::new(core)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Transceiver> {
        self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::LineSource;
    use crate::store::MemoryStore;
    use std::sync::atomic::AtomicUsize;

    fn core() -> Transceiver {
        let capture = CaptureController::new(
            Box::new(MemoryStore::new()),
            RemoteSignal::empty(Band::Mhz433),
        );
        Transceiver::new(
            CoreSettings {
                history_size: 3,
                raw_history_size: 3,
                settle: Duration::ZERO,
            },
            capture,
        )
    }

    fn signal(addr: &str) -> RemoteSignal {
        RemoteSignal::new(addr, "31", Band::Mhz433, 1, 320)
    }

    /// Driver that records sends and snapshots the receive gate mid-send.
    struct SpyDriver {
        sent: Arc<Mutex<Vec<u32>>>,
        configured: Arc<Mutex<Vec<(u8, u16, u8)>>>,
        gate: Arc<AtomicBool>,
        gate_during_send: Arc<AtomicBool>,
    }

    impl TxDriver for SpyDriver {
        fn configure(&mut self, protocol: u8, pulse_us: u16, repeats: u8) {
            self.configured.lock().unwrap().push((protocol, pulse_us, repeats));
        }

        fn send(&mut self, frame: &TxFrame) {
            self.gate_during_send
                .store(self.gate.load(Ordering::SeqCst), Ordering::SeqCst);
            self.sent.lock().unwrap().push(frame.code24);
        }
    }

    fn spy_into(core: &mut Transceiver, band: Band) -> (Arc<Mutex<Vec<u32>>>, Arc<Mutex<Vec<(u8, u16, u8)>>>, Arc<AtomicBool>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let configured = Arc::new(Mutex::new(Vec::new()));
        let gate_during_send = Arc::new(AtomicBool::new(true));
        core.bind_tx(
            band,
            Box::new(SpyDriver {
                sent: sent.clone(),
                configured: configured.clone(),
                gate: core.receive_flag(band),
                gate_during_send: gate_during_send.clone(),
            }),
        );
        (sent, configured, gate_during_send)
    }

    #[test]
    fn send_suppresses_receive_then_restores() {
        let mut core = core();
        let (sent, _, gate_during_send) = spy_into(&mut core, Band::Mhz433);

        assert!(core.receive_enabled(Band::Mhz433));
        core.send(&signal("62E7E8"));

        // The gate was down while the driver ran, and is back up after.
        assert!(!gate_during_send.load(Ordering::SeqCst));
        assert!(core.receive_enabled(Band::Mhz433));
        assert_eq!(*sent.lock().unwrap(), vec![0x62E7E8]);
        assert_eq!(core.send_count(), 1);
    }

    #[test]
    fn send_restores_disabled_gate_as_disabled() {
        let mut core = core();
        let _ = spy_into(&mut core, Band::Mhz433);

        core.set_receive_enabled(Band::Mhz433, false);
        core.send(&signal("62E7E8"));
        assert!(!core.receive_enabled(Band::Mhz433));
    }

    #[test]
    fn send_reasserts_driver_configuration() {
        let mut core = core();
        let (_, configured, _) = spy_into(&mut core, Band::Mhz433);

        core.set_protocol(Band::Mhz433, 2);
        core.set_pulse_us(Band::Mhz433, 450);
        core.set_repeats(Band::Mhz433, 8);
        core.send(&signal("62E7E8"));
        core.send(&signal("62E7E8"));

        assert_eq!(*configured.lock().unwrap(), vec![(2, 450, 8), (2, 450, 8)]);
    }

    #[test]
    fn invalid_signal_is_never_sent() {
        let mut core = core();
        let (sent, _, _) = spy_into(&mut core, Band::Mhz433);

        core.send(&RemoteSignal::empty(Band::Mhz433));
        core.send(&RemoteSignal::new("62E7", "31", Band::Mhz433, 1, 320));

        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(core.send_count(), 0);
    }

    #[test]
    fn unbound_driver_send_is_a_silent_no_op() {
        let mut core = core();
        core.send(&signal("62E7E8"));
        // Counted (the request happened) but nothing crashed.
        assert_eq!(core.send_count(), 1);
        assert!(core.receive_enabled(Band::Mhz433));
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

    fn line_core(bytes: &[u8]) -> Transceiver {
        let mut core = core();
        core.bind_line_rx(LineReceiver::new(Box::new(ScriptedSource(bytes.to_vec()))));
        core
    }

    #[test]
    fn line_reception_runs_full_pipeline() {
        let mut core = line_core(b"LC:62E7E831\n");
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        core.add_observer(Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));

        match core.poll() {
            Some(Received::Signal { signal: sig, captured }) => {
                assert_eq!(sig.address, "62E7E8");
                assert_eq!(sig.key, "31");
                assert_eq!(sig.band, Band::Mhz433);
                assert_eq!(sig.protocol, crate::protocol::DEFAULT_PROTOCOL);
                assert!(!captured);
            }
            other => panic!("expected signal, got {other:?}"),
        }

        assert_eq!(core.receive_count(), 1);
        assert_eq!(core.history_len(), 1);
        assert_eq!(core.last_received().unwrap().address, "62E7E8");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn armed_capture_latches_from_pipeline() {
        let mut core = line_core(b"LC:62E7E831\n");
        core.start_capture();
        match core.poll() {
            Some(Received::Signal { captured, .. }) => assert!(captured),
            other => panic!("expected signal, got {other:?}"),
        }

        assert_eq!(core.capture_mode(), CaptureMode::Idle);
        assert_eq!(core.captured_signal().unwrap().address, "62E7E8");
    }

    #[test]
    fn history_keeps_newest_three() {
        let mut core = line_core(b"LC:11111111\nLC:22222222\nLC:33333333\nLC:44444444\n");
        for _ in 0..4 {
            assert!(core.poll().is_some());
        }
        assert_eq!(core.history_len(), 3);
        assert_eq!(core.history_get(0).unwrap().address, "222222");
        assert_eq!(core.history_get(2).unwrap().address, "444444");
        assert_eq!(core.history_get(3), None);
    }

    #[test]
    fn disabled_band_drops_line_traffic() {
        let mut core = line_core(b"LC:62E7E831\n");
        core.set_receive_enabled(Band::Mhz433, false);
        assert!(core.poll().is_none());
        // Re-enabling does not resurrect the drained bytes.
        core.set_receive_enabled(Band::Mhz433, true);
        assert!(core.poll().is_none());
        assert_eq!(core.receive_count(), 0);
    }

    #[test]
    fn raw_send_requires_validity() {
        let mut core = core();
        core.send_raw(&RawCapture::invalid(Band::Mhz315), 1);
        assert_eq!(core.send_count(), 0);
    }

    struct ScriptedRx {
        value: u32,
        bits: u8,
        timings: Vec<u32>,
        available: bool,
    }

    impl crate::receive::RxDriver for ScriptedRx {
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
            3
        }
        fn received_delay_us(&self) -> u16 {
            410
        }
        fn received_timings(&self) -> &[u32] {
            &self.timings
        }
        fn reset_available(&mut self) {
            self.available = false;
        }
    }

    #[test]
    fn pulse_reception_is_stamped_with_observed_parameters() {
        let mut core = core();
        core.bind_pulse_rx(PulseReceiver::new(Box::new(ScriptedRx {
            value: 0x62E7_E831,
            bits: 32,
            timings: vec![],
            available: true,
        })));

        match core.poll() {
            Some(Received::Signal { signal, .. }) => {
                assert_eq!(signal.band, Band::Mhz315);
                assert_eq!(signal.address, "62E7E8");
                assert_eq!(signal.protocol, 3);
                assert_eq!(signal.pulse_us, 410);
            }
            other => panic!("expected signal, got {other:?}"),
        }
    }

    #[test]
    fn armed_raw_capture_takes_the_pulse_path() {
        let mut core = core();
        core.bind_pulse_rx(PulseReceiver::new(Box::new(ScriptedRx {
            value: 0,
            bits: 0,
            timings: vec![320, 960, 320, 960],
            available: true,
        })));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        core.add_raw_observer(Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));

        core.start_raw_capture();
        match core.poll() {
            Some(Received::Raw { raw, captured }) => {
                assert!(captured);
                assert_eq!(raw.change_count(), 4);
            }
            other => panic!("expected raw, got {other:?}"),
        }

        assert_eq!(core.capture_mode(), CaptureMode::Idle);
        assert_eq!(core.captured_raw().unwrap().timings, vec![320, 960, 320, 960]);
        assert_eq!(core.raw_history_len(), 1);
        assert_eq!(core.raw_history_get(0).unwrap().change_count(), 4);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disarm_and_clear_return_to_baseline() {
        let mut core = line_core(b"LC:62E7E831\n");
        core.start_capture();
        core.disarm_capture();
        assert_eq!(core.capture_mode(), CaptureMode::Idle);

        // Disarmed: the reception flows through without latching.
        core.poll();
        assert!(core.captured_signal().is_none());

        core.clear_captured();
        core.clear_history();
        core.reset_counters();
        assert_eq!(core.history_len(), 0);
        assert_eq!(core.receive_count(), 0);
        assert!(core.last_received().is_some());
    }
}
