//! One-shot capture mode.
//!
//! Arming latches the next decoded signal as the "current" captured signal,
//! persists it, and disarms automatically. A parallel raw-capture arming
//! exists for undecodable signals; the two modes are mutually exclusive,
//! so entering one disarms the other. Arming waits indefinitely; `disarm`
//! is legal at any time.

use crate::signal::{RawCapture, RemoteSignal};
use crate::store::KvStore;

/// Persisted keys for the single-slot captured signal.
const KEY_CAPTURED: &str = "captured";
const KEY_ADDRESS: &str = "address";
const KEY_KEY: &str = "key";

/// Capture arming state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Idle,
    /// Waiting for the next decoded signal.
    Armed,
    /// Waiting for the next raw pulse train.
    ArmedRaw,
}

/// Callback invoked when the armed state changes (`true` = armed).
pub type ModeListener = Box<dyn Fn(bool) + Send>;

/// Owns the capture arming state and the captured-signal singleton.
pub struct CaptureController {
    mode: CaptureMode,
    captured: Option<RemoteSignal>,
    captured_raw: Option<RawCapture>,
    store: Box<dyn KvStore>,
    listener: Option<ModeListener>,
}

impl CaptureController {
    /// Create the controller, restoring a previously persisted capture.
    ///
    /// The single-slot layout keeps only address and key; a restored signal
    /// is stamped with the given defaults for band, protocol, and pulse.
    pub fn new(store: Box<dyn KvStore>, restored_template: RemoteSignal) -> Self {
        let mut controller = Self {
            mode: CaptureMode::Idle,
            captured: None,
            captured_raw: None,
            store,
            listener: None,
        };
        controller.restore(restored_template);
        controller
    }

    fn restore(&mut self, template: RemoteSignal) {
        if self.store.get_bool(KEY_CAPTURED) != Some(true) {
            return;
        }
        let address = self.store.get_str(KEY_ADDRESS).unwrap_or_default();
        let key = self.store.get_str(KEY_KEY).unwrap_or_default();
        if address.is_empty() || key.is_empty() {
            return;
        }
        let signal = RemoteSignal::new(
            address,
            key,
            template.band,
            template.protocol,
            template.pulse_us,
        );
        tracing::info!(%signal, "restored captured signal");
        self.captured = Some(signal);
    }

    pub fn set_mode_listener(&mut self, listener: ModeListener) {
        self.listener = Some(listener);
    }

    fn notify(&self, armed: bool) {
        if let Some(listener) = &self.listener {
            listener(armed);
        }
    }

    /// Arm for the next decoded signal. A no-op while already armed; the
    /// previously captured value is kept until a new one lands.
    pub fn arm(&mut self) {
        if self.mode == CaptureMode::Armed {
            return;
        }
        self.mode = CaptureMode::Armed;
        tracing::info!("capture mode armed");
        self.notify(true);
    }

    /// Arm for the next raw pulse train, disarming decoded capture.
    pub fn arm_raw(&mut self) {
        if self.mode == CaptureMode::ArmedRaw {
            return;
        }
        self.mode = CaptureMode::ArmedRaw;
        tracing::info!("raw capture mode armed");
        self.notify(true);
    }

    /// Return to idle. Always legal; no side effects when already idle.
    pub fn disarm(&mut self) {
        if self.mode == CaptureMode::Idle {
            return;
        }
        self.mode = CaptureMode::Idle;
        tracing::info!("capture mode disarmed");
        self.notify(false);
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn is_armed(&self) -> bool {
        self.mode == CaptureMode::Armed
    }

    pub fn is_raw_armed(&self) -> bool {
        self.mode == CaptureMode::ArmedRaw
    }

    /// Offer a decoded signal. When armed: latch it, persist it, disarm,
    /// notify. Returns whether the signal was captured.
    pub fn on_signal(&mut self, signal: &RemoteSignal) -> bool {
        if self.mode != CaptureMode::Armed {
            return false;
        }
        tracing::info!(%signal, "signal captured");
        self.captured = Some(signal.clone());
        self.mode = CaptureMode::Idle;
        self.persist();
        self.notify(false);
        true
    }

    /// Offer a raw pulse train. Only valid trains are captured.
    pub fn on_raw(&mut self, raw: &RawCapture) -> bool {
        if self.mode != CaptureMode::ArmedRaw || !raw.valid {
            return false;
        }
        tracing::info!(edges = raw.change_count(), "raw signal captured");
        self.captured_raw = Some(raw.clone());
        self.mode = CaptureMode::Idle;
        self.notify(false);
        true
    }

    pub fn captured(&self) -> Option<&RemoteSignal> {
        self.captured.as_ref()
    }

    pub fn has_captured(&self) -> bool {
        self.captured.is_some()
    }

    pub fn captured_raw(&self) -> Option<&RawCapture> {
        self.captured_raw.as_ref()
    }

    pub fn has_captured_raw(&self) -> bool {
        self.captured_raw.is_some()
    }

    /// Forget the captured signals and wipe their persisted copy.
    pub fn clear(&mut self) {
        self.captured = None;
        self.captured_raw = None;
        self.store.remove(KEY_ADDRESS);
        self.store.remove(KEY_KEY);
        self.store.set_bool(KEY_CAPTURED, false);
    }

    fn persist(&mut self) {
        match &self.captured {
            Some(signal) if !signal.is_empty() => {
                self.store.set_str(KEY_ADDRESS, &signal.address);
                self.store.set_str(KEY_KEY, &signal.key);
                self.store.set_bool(KEY_CAPTURED, true);
            }
            _ => {
                self.store.remove(KEY_ADDRESS);
                self.store.remove(KEY_KEY);
                self.store.set_bool(KEY_CAPTURED, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Band;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn controller() -> CaptureController {
        CaptureController::new(
            Box::new(MemoryStore::new()),
            RemoteSignal::empty(Band::Mhz433),
        )
    }

    fn signal(addr: &str) -> RemoteSignal {
        RemoteSignal::new(addr, "31", Band::Mhz433, 1, 320)
    }

    #[test]
    fn arm_then_capture_disarms_and_latches() {
        let mut cap = controller();
        cap.arm();
        assert!(cap.is_armed());

        assert!(cap.on_signal(&signal("62E7E8")));
        assert!(!cap.is_armed());
        assert!(cap.has_captured());
        assert_eq!(cap.captured().unwrap().address, "62E7E8");

        // Unarmed signals pass through without latching.
        assert!(!cap.on_signal(&signal("AAAAAA")));
        assert_eq!(cap.captured().unwrap().address, "62E7E8");
    }

    #[test]
    fn rearm_keeps_prior_capture_until_next_lands() {
        let mut cap = controller();
        cap.arm();
        cap.on_signal(&signal("111111"));
        cap.arm();
        assert_eq!(cap.captured().unwrap().address, "111111");
        cap.on_signal(&signal("222222"));
        assert_eq!(cap.captured().unwrap().address, "222222");
    }

    #[test]
    fn arm_while_armed_is_a_no_op() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let mut cap = controller();
        cap.set_mode_listener(Box::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        cap.arm();
        cap.arm();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disarm_when_idle_is_a_no_op() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let mut cap = controller();
        cap.set_mode_listener(Box::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        cap.disarm();
        assert_eq!(cap.mode(), CaptureMode::Idle);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn raw_and_decoded_arming_are_mutually_exclusive() {
        let mut cap = controller();
        cap.arm();
        cap.arm_raw();
        assert!(cap.is_raw_armed());
        assert!(!cap.is_armed());

        // Decoded signals are not latched while raw-armed.
        assert!(!cap.on_signal(&signal("62E7E8")));

        let raw = RawCapture::new(vec![320, 960], Band::Mhz315);
        assert!(cap.on_raw(&raw));
        assert_eq!(cap.mode(), CaptureMode::Idle);
        assert_eq!(cap.captured_raw().unwrap().change_count(), 2);
    }

    #[test]
    fn invalid_raw_is_not_latched() {
        let mut cap = controller();
        cap.arm_raw();
        assert!(!cap.on_raw(&RawCapture::invalid(Band::Mhz315)));
        assert!(cap.is_raw_armed());
    }

    #[test]
    fn capture_persists_and_restores() {
        let mut store = MemoryStore::new();
        store.set_bool("captured", true);
        store.set_str("address", "62E7E8");
        store.set_str("key", "31");

        let cap = CaptureController::new(Box::new(store), RemoteSignal::empty(Band::Mhz433));
        assert!(cap.has_captured());
        let restored = cap.captured().unwrap();
        assert_eq!(restored.address, "62E7E8");
        assert_eq!(restored.key, "31");
    }

    #[test]
    fn clear_wipes_persisted_copy() {
        let mut cap = controller();
        cap.arm();
        cap.on_signal(&signal("62E7E8"));
        cap.clear();
        assert!(!cap.has_captured());
    }
}
