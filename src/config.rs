//! Transfer configuration: policy surface for snapshots, waits and keys.
//!
//! Loaded from an optional TOML file; every field has a default so an
//! empty file (or no file) yields the stock behavior. CLI flags are
//! applied on top by `main.rs`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::RegexSet;
use serde::Deserialize;

use crate::keys::{self, KeyCombo, KeyError};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid trusted_readers pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Keys(#[from] KeyError),
    #[error("timing.{0} must be greater than zero")]
    ZeroTiming(&'static str),
}

/// Top-level config file layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub transfer: TransferOptions,
}

impl Config {
    /// Load from a TOML file, or return defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.transfer.validate()?;
        Ok(config)
    }
}

/// Which clipboard formats are saved before a transfer and restored after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotPolicy {
    /// Nothing is saved; the transfer leaves its own data on the clipboard.
    Off,
    /// Only Unicode text (fast path).
    #[default]
    TextOnly,
    /// Every restorable format except `except_formats`.
    AllFormats,
}

/// Options of one Copy or Paste operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferOptions {
    /// Overall restore toggle; `false` behaves like `snapshot = "off"`.
    pub restore: bool,
    pub snapshot: SnapshotPolicy,
    /// Format names never saved under `all-formats` (case-insensitive).
    pub except_formats: Vec<String>,
    /// Block user keyboard input while the operation runs.
    pub block_input: bool,
    /// Pause the system clipboard-history service during the operation.
    pub suppress_history: bool,
    /// Paste text ending with a newline without it, then press Enter.
    pub paste_enter: bool,
    /// Process image names (regex) accepted as the target when they read
    /// pasted data.
    pub trusted_readers: Vec<String>,
    pub keys: KeyConfig,
    pub timing: Timing,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            restore: true,
            snapshot: SnapshotPolicy::TextOnly,
            except_formats: Vec::new(),
            block_input: true,
            suppress_history: true,
            paste_enter: false,
            trusted_readers: vec![r"(?i)^RuntimeBroker\.exe$".into()],
            keys: KeyConfig::default(),
            timing: Timing::default(),
        }
    }
}

impl TransferOptions {
    /// Snapshot policy after applying the overall restore toggle.
    pub fn effective_snapshot(&self) -> SnapshotPolicy {
        if self.restore {
            self.snapshot
        } else {
            SnapshotPolicy::Off
        }
    }

    pub fn trusted_reader_set(&self) -> Result<RegexSet, ConfigError> {
        Ok(RegexSet::new(&self.trusted_readers)?)
    }

    /// Check every field that can only fail at use time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trusted_reader_set()?;
        self.keys.resolve()?;
        self.timing.validate()
    }
}

/// Trigger key bindings, parsed with [`keys::parse_binding`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyConfig {
    pub copy: String,
    pub cut: String,
    pub paste: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            copy: "Ctrl+C".into(),
            cut: "Ctrl+X".into(),
            paste: "Ctrl+V".into(),
        }
    }
}

/// Parsed trigger keys.
#[derive(Debug, Clone)]
pub struct TriggerKeys {
    pub copy: KeyCombo,
    pub cut: KeyCombo,
    pub paste: KeyCombo,
}

impl KeyConfig {
    pub fn resolve(&self) -> Result<TriggerKeys, KeyError> {
        Ok(TriggerKeys {
            copy: keys::parse_binding(&self.copy)?,
            cut: keys::parse_binding(&self.cut)?,
            paste: keys::parse_binding(&self.paste)?,
        })
    }
}

/// Timeouts and delays, in milliseconds.
///
/// The listener waits `wait_slices` slices of `wait_slice`; between
/// slices it pings the target for up to `hung_ping`. A responsive target
/// therefore times out after about `wait_slices * wait_slice`, a hung one
/// after [`outer_wait`](Self::outer_wait).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    /// Total retry budget for opening the clipboard.
    pub open_timeout: u64,
    /// Retry budget for the non-critical reopen before restoring.
    pub reopen_timeout: u64,
    /// Pause between open attempts.
    pub open_retry: u64,
    pub wait_slice: u64,
    pub wait_slices: u32,
    pub hung_ping: u64,
    /// Fixed delay used instead of the listener signal when a foreign
    /// window read the pasted data.
    pub suspect_delay: u64,
    pub settle_ping: u64,
    pub settle_rounds: u32,
    pub settle_rounds_unsynced: u32,
    pub settle_rounds_unsynced_restore: u32,
    pub copy_settle_ping: u64,
    pub sleep_finally: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            open_timeout: 10_000,
            reopen_timeout: 1_000,
            open_retry: 10,
            wait_slice: 500,
            wait_slices: 6,
            hung_ping: 5_000,
            suspect_delay: 100,
            settle_ping: 1_000,
            settle_rounds: 3,
            settle_rounds_unsynced: 15,
            settle_rounds_unsynced_restore: 25,
            copy_settle_ping: 500,
            sleep_finally: 0,
        }
    }
}

impl Timing {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.open_retry == 0 {
            return Err(ConfigError::ZeroTiming("open_retry"));
        }
        if self.wait_slice == 0 {
            return Err(ConfigError::ZeroTiming("wait_slice"));
        }
        if self.wait_slices == 0 {
            return Err(ConfigError::ZeroTiming("wait_slices"));
        }
        Ok(())
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout)
    }

    pub fn reopen_timeout(&self) -> Duration {
        Duration::from_millis(self.reopen_timeout)
    }

    pub fn open_retry(&self) -> Duration {
        Duration::from_millis(self.open_retry)
    }

    pub fn wait_slice(&self) -> Duration {
        Duration::from_millis(self.wait_slice)
    }

    pub fn hung_ping(&self) -> Duration {
        Duration::from_millis(self.hung_ping)
    }

    pub fn suspect_delay(&self) -> Duration {
        Duration::from_millis(self.suspect_delay)
    }

    pub fn settle_ping(&self) -> Duration {
        Duration::from_millis(self.settle_ping)
    }

    pub fn copy_settle_ping(&self) -> Duration {
        Duration::from_millis(self.copy_settle_ping)
    }

    pub fn sleep_finally(&self) -> Duration {
        Duration::from_millis(self.sleep_finally)
    }

    /// Longest the listener can wait: every slice plus a failed ping
    /// between each pair of slices.
    pub fn outer_wait(&self) -> Duration {
        let slices = self.wait_slices.max(1);
        self.wait_slice() * slices + self.hung_ping() * (slices - 1)
    }
}
