//! Clipboard-mediated data exchange with an uncooperative foreground app.
//!
//! Copy and Paste go through the one global OS clipboard while other
//! programs (history services, clipboard managers) may read it at the
//! same time. The engine is layered leaves-first:
//!
//! - [`guard`]: scoped clipboard lock plus a temporary owner window.
//! - [`snapshot`]: saves clipboard formats before a transfer and puts
//!   them back afterward.
//! - [`suppress`]: pauses the system clipboard-history service.
//! - [`listener`]: turns owner-window notifications into a waitable
//!   completion signal, with hung-target and foreign-reader detection.
//! - [`transfer`]: drives the Copy and Paste sequences.
//!
//! One transfer per process at a time; callers serialize.

mod access;
mod data;
pub mod format;
mod guard;
mod listener;
mod snapshot;
mod suppress;
mod transfer;

use std::fmt;

pub use access::ClipboardView;
pub use data::{ClipboardData, PastePayload, ProducerError};
pub use guard::ClipboardGuard;
pub use listener::{ListenerState, TransferListener, WaitOutcome};
pub use snapshot::{ClipboardItem, FormatReport, Snapshot};
pub use suppress::HistorySuppressor;
pub use transfer::ClipboardEngine;

use crate::keys::KeyError;
use crate::platform::OsError;

/// Which way data moves through the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The target app publishes, we read.
    Copy,
    /// We publish, the target app reads.
    Paste,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Copy => f.write_str("copy"),
            Direction::Paste => f.write_str("paste"),
        }
    }
}

/// Clipboard transfer errors.
///
/// Every variant is returned only after cleanup (snapshot restore,
/// history-service resume, lock release) has run.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    /// The clipboard lock could not be obtained within the retry budget.
    #[error("could not open clipboard (OS error {code})")]
    ResourceUnavailable { code: u32 },

    /// Copy finished but the target published nothing usable.
    #[error("no text available: the target did not put text on the clipboard")]
    NoData,

    /// The listener never saw the expected signal.
    #[error("{direction} timed out waiting for the target (hung: {hung})")]
    ProtocolTimeout { direction: Direction, hung: bool },

    /// A caller-supplied data producer or consumer failed.
    #[error("clipboard data error: {0}")]
    DataError(String),

    /// There is no focused window to send the trigger to.
    #[error("no focused window")]
    NoFocus,

    #[error(transparent)]
    Keys(#[from] KeyError),

    #[error(transparent)]
    Os(#[from] OsError),
}
