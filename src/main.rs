//! Daemon entry point: wires the transceiver core to its drivers (real
//! serial ports when configured, demo drivers otherwise), starts the polling
//! services, and pumps device events: received signals, raw captures, and
//! the trigger buttons that replay stored signals.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rfreplay::api::ManagementApi;
use rfreplay::capture::CaptureController;
use rfreplay::config;
use rfreplay::core::{CoreSettings, SharedTransceiver, Transceiver};
use rfreplay::hw::{ActiveLowLed, DemoButton, DemoPin, LedPin};
use rfreplay::receive::{IdleRxDriver, LineReceiver, PulseReceiver};
use rfreplay::registry::SignalRegistry;
use rfreplay::serial::{DemoLineSource, SerialLine};
use rfreplay::service::{ButtonId, ButtonService, DeviceEvent, ReceiveService, HEARTBEAT};
use rfreplay::signal::{Band, RemoteSignal};
use rfreplay::store::{FileStore, KvStore, MemoryStore};
use rfreplay::transmit::{DemoTransmitter, LineTransmitter, PinTransmitter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long the LED stays lit after a reception.
const LED_BLINK: Duration = Duration::from_millis(100);

fn open_store(storage: &config::Storage, namespace: &str) -> Box<dyn KvStore> {
    match FileStore::open(storage.config_dir(), namespace) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(namespace, error = %e, "falling back to in-memory store");
            Box::new(MemoryStore::new())
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rfreplay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!("starting rfreplay v{VERSION}");

    let storage = config::Storage::new()?;
    let cfg = storage.config.clone();

    // ── Core ─────────────────────────────────────────────────────────────
    let mut restored_template = RemoteSignal::empty(Band::Mhz433);
    restored_template.protocol = cfg.band433.protocol;
    restored_template.pulse_us = cfg.band433.pulse_us;
    let capture = CaptureController::new(open_store(&storage, "rf_replay"), restored_template);
    let mut core = Transceiver::new(
        CoreSettings {
            history_size: cfg.history_size,
            raw_history_size: cfg.raw_history_size,
            settle: cfg.settle(),
        },
        capture,
    );
    core.set_capture_listener(Box::new(|armed| {
        tracing::info!(armed, "capture mode changed");
    }));

    for (band, settings) in [(Band::Mhz433, &cfg.band433), (Band::Mhz315, &cfg.band315)] {
        core.set_protocol(band, settings.protocol);
        core.set_pulse_us(band, settings.pulse_us);
        core.set_repeats(band, settings.repeats);
    }

    // ── Drivers ──────────────────────────────────────────────────────────
    // 433 MHz receive: the decoding companion module on a UART, when
    // configured; otherwise a silent demo source.
    match &cfg.rx_port {
        Some(port) => match SerialLine::open(port, cfg.baud) {
            Ok(serial) => core.bind_line_rx(LineReceiver::new(Box::new(serial))),
            Err(e) => {
                tracing::warn!(%port, error = %e, "receiver port unavailable, demo mode");
                core.bind_line_rx(LineReceiver::new(Box::new(DemoLineSource)));
            }
        },
        None => {
            tracing::info!("no receiver port configured, demo mode");
            core.bind_line_rx(LineReceiver::new(Box::new(DemoLineSource)));
        }
    }

    // 433 MHz transmit: the companion line transmitter when configured,
    // otherwise the bit-banged GPIO path (demo pin on a host build).
    match &cfg.tx_port {
        Some(port) => match SerialLine::open(port, cfg.baud) {
            Ok(serial) => core.bind_tx(Band::Mhz433, Box::new(LineTransmitter::new(serial))),
            Err(e) => {
                tracing::warn!(%port, error = %e, "transmitter port unavailable, demo mode");
                core.bind_tx(Band::Mhz433, Box::new(DemoTransmitter));
            }
        },
        None => {
            core.bind_tx(
                Band::Mhz433,
                Box::new(
                    PinTransmitter::new(DemoPin::new("tx433"))
                        .with_order(cfg.band433.bit_order),
                ),
            );
        }
    }
    core.bind_tx(
        Band::Mhz315,
        Box::new(
            PinTransmitter::new(DemoPin::new("tx315")).with_order(cfg.band315.bit_order),
        ),
    );

    // 315 MHz receive: interrupt pulse driver on the device build; idle
    // stand-in on a host.
    core.bind_pulse_rx(PulseReceiver::new(Box::new(IdleRxDriver)));

    let shared = SharedTransceiver::new(core);

    // ── Registry and management surface ──────────────────────────────────
    let registry = SignalRegistry::open(cfg.max_signals, open_store(&storage, "signal_mgr"));
    let mut mgmt = ManagementApi::new(registry, shared.clone(), open_store(&storage, "boot"));

    // ── Services ─────────────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel();
    let _receive_service = ReceiveService::spawn(shared.clone(), event_tx.clone());
    let _button_a = ButtonService::spawn(Box::new(DemoButton), ButtonId::A, event_tx.clone());
    let _button_b = ButtonService::spawn(Box::new(DemoButton), ButtonId::B, event_tx);

    let mut led: Box<dyn LedPin> = Box::new(ActiveLowLed::new(DemoPin::new("led")));
    let mut led_off_at: Option<Instant> = None;

    tracing::info!(
        signals = mgmt.registry().len(),
        boot_binding = ?mgmt.boot_binding(),
        "initialization complete, entering main loop"
    );

    // ── Main event loop ──────────────────────────────────────────────────
    let started = Instant::now();
    let mut last_heartbeat = Instant::now();

    loop {
        match event_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(DeviceEvent::Signal { signal, captured }) => {
                tracing::info!(%signal, "signal received");
                if captured {
                    // A freshly captured signal goes straight into the
                    // registry so the management list shows it.
                    let response = mgmt.save_captured(None);
                    tracing::info!(message = %response.message, "capture stored");
                }
                led.set_lit(true);
                led_off_at = Some(Instant::now() + LED_BLINK);
            }
            Ok(DeviceEvent::Raw { raw, captured }) => {
                tracing::info!(edges = raw.change_count(), captured, "raw signal received");
                led.set_lit(true);
                led_off_at = Some(Instant::now() + LED_BLINK);
            }
            Ok(DeviceEvent::Button(id)) => {
                // Button A replays the boot-bound signal (stored signal 0
                // when nothing is bound); button B replays signal 1, falling
                // back to 0 when only one is stored.
                let response = match id {
                    ButtonId::A => mgmt.send_bound_or(0),
                    ButtonId::B => {
                        let fallback = if mgmt.registry().len() > 1 { 1 } else { 0 };
                        mgmt.send_index(fallback)
                    }
                };
                if response.code != 200 {
                    tracing::warn!(button = ?id, message = %response.message, "button send failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if let Some(deadline) = led_off_at {
            if Instant::now() >= deadline {
                led.set_lit(false);
                led_off_at = None;
            }
        }

        if last_heartbeat.elapsed() >= HEARTBEAT {
            let core = shared.lock();
            tracing::info!(
                uptime_s = started.elapsed().as_secs(),
                received = core.receive_count(),
                sent = core.send_count(),
                history = core.history_len(),
                stored = mgmt.registry().len(),
                "heartbeat"
            );
            last_heartbeat = Instant::now();
        }
    }

    Ok(())
}
