//! Polling service threads.
//!
//! Two long-lived loops mirror the device firmware's scheduler: a receive
//! service that ticks the transceiver's poll every ~10 ms, and a button
//! service with edge-triggered debounce. Both report through one event
//! channel consumed by the main loop; all shared state is reached through
//! the core's single mutex, never concurrently mutated in place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::{Received, SharedTransceiver};
use crate::hw::ButtonPin;
use crate::signal::{RawCapture, RemoteSignal};

/// Scheduler tick between polls.
pub const POLL_TICK: Duration = Duration::from_millis(10);
/// Button debounce re-check delay.
pub const DEBOUNCE: Duration = Duration::from_millis(50);
/// Heartbeat log period.
pub const HEARTBEAT: Duration = Duration::from_secs(10);

/// Physical trigger buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonId {
    A,
    B,
}

/// Events surfaced to the main loop. `captured` reports whether an armed
/// capture latched the reception.
#[derive(Debug)]
pub enum DeviceEvent {
    Signal { signal: RemoteSignal, captured: bool },
    Raw { raw: RawCapture, captured: bool },
    Button(ButtonId),
}

/// Drives [`crate::core::Transceiver::poll`] on a fixed tick.
pub struct ReceiveService {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveService {
    pub fn spawn(core: SharedTransceiver, events: Sender<DeviceEvent>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = thread::spawn(move || {
            tracing::debug!("receive service started");
            while thread_running.load(Ordering::SeqCst) {
                let received = core.lock().poll();
                if let Some(received) = received {
                    let event = match received {
                        Received::Signal { signal, captured } => {
                            DeviceEvent::Signal { signal, captured }
                        }
                        Received::Raw { raw, captured } => DeviceEvent::Raw { raw, captured },
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                thread::sleep(POLL_TICK);
            }
            tracing::debug!("receive service stopped");
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReceiveService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Edge-triggered button poller with debounce: a press is reported once per
/// physical push, after it survives the 50 ms re-check.
pub struct ButtonService {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ButtonService {
    pub fn spawn(
        button: Box<dyn ButtonPin>,
        id: ButtonId,
        events: Sender<DeviceEvent>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = thread::spawn(move || {
            let mut last = false;
            while thread_running.load(Ordering::SeqCst) {
                let pressed = button.is_pressed();
                if pressed && !last {
                    thread::sleep(DEBOUNCE);
                    if button.is_pressed() {
                        tracing::info!(button = ?id, "button pressed");
                        if events.send(DeviceEvent::Button(id)).is_err() {
                            break;
                        }
                    }
                }
                last = pressed;
                thread::sleep(POLL_TICK);
            }
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ButtonService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureController;
    use crate::core::{CoreSettings, Transceiver};
    use crate::receive::LineReceiver;
    use crate::serial::LineSource;
    use crate::signal::Band;
    use crate::store::MemoryStore;
    use std::sync::mpsc;
    use std::sync::Mutex;

    struct ScriptedSource(Mutex<Vec<u8>>);

    impl LineSource for ScriptedSource {
        fn read_byte(&mut self) -> Option<u8> {
            let mut bytes = self.0.lock().unwrap();
            if bytes.is_empty() {
                None
            } else {
                Some(bytes.remove(0))
            }
        }
    }

    #[test]
    fn receive_service_forwards_signals() {
        let capture = CaptureController::new(
            Box::new(MemoryStore::new()),
            RemoteSignal::empty(Band::Mhz433),
        );
        let mut core = Transceiver::new(
            CoreSettings {
                history_size: 10,
                raw_history_size: 10,
                settle: Duration::ZERO,
            },
            capture,
        );
        core.bind_line_rx(LineReceiver::new(Box::new(ScriptedSource(Mutex::new(
            b"LC:62E7E831\n".to_vec(),
        )))));
        let shared = SharedTransceiver::new(core);

        let (tx, rx) = mpsc::channel();
        let mut service = ReceiveService::spawn(shared.clone(), tx);

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match event {
            DeviceEvent::Signal { signal, captured } => {
                assert_eq!(signal.address, "62E7E8");
                assert!(!captured);
            }
            other => panic!("expected signal event, got {other:?}"),
        }
        service.stop();

        assert_eq!(shared.lock().receive_count(), 1);
    }

    struct PressedOnce(Arc<AtomicBool>);

    impl ButtonPin for PressedOnce {
        fn is_pressed(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn button_service_reports_one_edge_per_press() {
        let state = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();
        let mut service = ButtonService::spawn(
            Box::new(PressedOnce(state.clone())),
            ButtonId::A,
            tx,
        );

        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            DeviceEvent::Button(ButtonId::A) => {}
            other => panic!("expected button event, got {other:?}"),
        }

        // Held down: no further events while the level stays high.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        // Release and press again: a new edge fires.
        state.store(false, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        state.store(true, Ordering::SeqCst);
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());

        service.stop();
    }
}
