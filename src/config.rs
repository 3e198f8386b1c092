//! Configuration and on-disk layout.
//!
//! Everything lives under `~/.config/rfreplay/`:
//!
//! ```text
//! ~/.config/rfreplay/
//!   config.ini          — user configuration
//!   rf_replay.json      — persisted captured signal
//!   signal_mgr.json     — persisted named registry
//!   boot.json           — boot-button binding
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use configparser::ini::Ini;

use crate::codec::BitOrder;
use crate::protocol::{DEFAULT_PROTOCOL, DEFAULT_PULSE_US, DEFAULT_REPEATS};

/// Per-band wire settings from the `[band433]` / `[band315]` sections.
#[derive(Debug, Clone)]
pub struct BandSettings {
    pub protocol: u8,
    pub pulse_us: u16,
    pub repeats: u8,
    /// Legacy bit-order variant; production configs leave this `standard`.
    pub bit_order: BitOrder,
}

impl Default for BandSettings {
    fn default() -> Self {
        Self {
            protocol: DEFAULT_PROTOCOL,
            pulse_us: DEFAULT_PULSE_US,
            repeats: DEFAULT_REPEATS,
            bit_order: BitOrder::Standard,
        }
    }
}

/// Application configuration loaded from `config.ini`.
#[derive(Debug, Clone)]
pub struct Config {
    // [general]
    /// Capacity of the decoded-signal history buffer.
    pub history_size: usize,
    /// Capacity of the raw-signal history buffer.
    pub raw_history_size: usize,
    /// Capacity of the named signal registry.
    pub max_signals: usize,
    /// Receive settle delay after a transmission, milliseconds.
    pub settle_ms: u64,

    // [serial]
    /// Serial device of the 433 MHz decoding receiver (empty = demo mode).
    pub rx_port: Option<String>,
    /// Serial device of the companion line transmitter (empty = none).
    pub tx_port: Option<String>,
    pub baud: u32,

    pub band433: BandSettings,
    pub band315: BandSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_size: 10,
            raw_history_size: 10,
            max_signals: 20,
            settle_ms: 200,
            rx_port: None,
            tx_port: None,
            baud: 9600,
            band433: BandSettings::default(),
            band315: BandSettings::default(),
        }
    }
}

impl Config {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    fn load_from_ini(path: &Path) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;

        let defaults = Config::default();

        let get_usize = |section: &str, key: &str, fallback: usize| {
            ini.getuint(section, key)
                .ok()
                .flatten()
                .map(|v| v as usize)
                .unwrap_or(fallback)
        };
        let get_port = |key: &str| {
            ini.get("serial", key)
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
        };

        let band = |section: &str| BandSettings {
            protocol: ini
                .getuint(section, "protocol")
                .ok()
                .flatten()
                .map(|v| v as u8)
                .unwrap_or(DEFAULT_PROTOCOL),
            pulse_us: ini
                .getuint(section, "pulse_length")
                .ok()
                .flatten()
                .map(|v| v as u16)
                .unwrap_or(DEFAULT_PULSE_US),
            repeats: ini
                .getuint(section, "repeat_count")
                .ok()
                .flatten()
                .map(|v| v as u8)
                .unwrap_or(DEFAULT_REPEATS),
            bit_order: ini
                .get(section, "bit_order")
                .map(|s| BitOrder::from_name(&s))
                .unwrap_or_default(),
        };

        Ok(Self {
            history_size: get_usize("general", "history_size", defaults.history_size),
            raw_history_size: get_usize("general", "raw_history_size", defaults.raw_history_size),
            max_signals: get_usize("general", "max_signals", defaults.max_signals),
            settle_ms: ini
                .getuint("general", "settle_ms")
                .ok()
                .flatten()
                .unwrap_or(defaults.settle_ms),
            rx_port: get_port("rx_port"),
            tx_port: get_port("tx_port"),
            baud: ini
                .getuint("serial", "baud")
                .ok()
                .flatten()
                .map(|v| v as u32)
                .unwrap_or(defaults.baud),
            band433: band("band433"),
            band315: band("band315"),
        })
    }

    /// Write a commented config file so the defaults are discoverable.
    fn save_to_ini(&self, path: &Path) -> Result<()> {
        let content = format!(
            r#"; rfreplay configuration
; Location: {path}
;
; Lines starting with ; or # are comments.

[general]
; Circular history of recently received signals (oldest evicted first).
history_size = {history}

; Circular history of captured raw pulse trains.
raw_history_size = {raw_history}

; Capacity of the named signal registry.
max_signals = {max_signals}

; Delay after a transmission before the receiver is re-enabled, in
; milliseconds, so the device does not capture its own send.
settle_ms = {settle}

[serial]
; Serial device of the 433MHz decoding receiver module (LC:/RX: lines).
; Leave empty to run without hardware (demo mode).
rx_port =

; Serial device of the companion line transmitter (TX: commands).
; Leave empty to bit-bang the TX GPIO instead.
tx_port =

; Both companion modules run 9600 8N1.
baud = {baud}

[band433]
; Wire format id, base pulse unit (µs), and frame repeats for 433MHz.
protocol = {p433}
pulse_length = {pl433}
repeat_count = {rc433}
; Legacy bit-order variant: standard, nibble_reversed, byte_swapped,
; reversed24, lsb_first. Leave at standard unless re-pairing old receivers.
bit_order = standard

[band315]
protocol = {p315}
pulse_length = {pl315}
repeat_count = {rc315}
bit_order = standard
"#,
            path = path.display(),
            history = self.history_size,
            raw_history = self.raw_history_size,
            max_signals = self.max_signals,
            settle = self.settle_ms,
            baud = self.baud,
            p433 = self.band433.protocol,
            pl433 = self.band433.pulse_us,
            rc433 = self.band433.repeats,
            p315 = self.band315.protocol,
            pl315 = self.band315.pulse_us,
            rc315 = self.band315.repeats,
        );

        fs::write(path, content).with_context(|| format!("failed to write config to {path:?}"))?;
        Ok(())
    }
}

/// Resolve the config directory to `~/.config/rfreplay/`.
pub fn resolve_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("rfreplay"))
}

/// Storage bootstrap: ensures the config directory exists and the config
/// file is present (writing a commented default on first run).
pub struct Storage {
    config_dir: PathBuf,
    pub config: Config,
}

impl Storage {
    pub fn new() -> Result<Self> {
        let config_dir =
            resolve_config_dir().context("could not determine home directory (is $HOME set?)")?;
        Self::at(config_dir)
    }

    /// Bootstrap against an explicit directory (used by tests).
    pub fn at(config_dir: PathBuf) -> Result<Self> {
        let config_path = config_dir.join("config.ini");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("failed to create config dir {config_dir:?}"))?;
            tracing::info!(?config_dir, "created config directory");
        }

        let config = if config_path.exists() {
            match Config::load_from_ini(&config_path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse config.ini, using defaults");
                    Config::default()
                }
            }
        } else {
            tracing::info!(?config_path, "no config.ini found, writing default");
            let config = Config::default();
            if let Err(e) = config.save_to_ini(&config_path) {
                tracing::warn!(error = %e, "could not write default config.ini");
            }
            config
        };

        Ok(Self { config_dir, config })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }
}
