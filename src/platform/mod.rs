//! Platform seams: pluggable adapters for everything the engine needs
//! from the operating system.
//!
//! The transfer engine never calls the OS directly. It talks to three
//! sub-interfaces (clipboard protocol, desktop queries, key synthesis)
//! composed into a [`Platform`] at startup. Only one adapter per
//! sub-interface is active at runtime.

mod clipboard;
mod desktop;
#[cfg(test)]
pub mod sim;
#[cfg(windows)]
pub mod win32;

use std::fmt;
use std::rc::Rc;

pub use clipboard::{ClipboardOs, DataRead, OwnerMessage, OwnerProc};
pub use desktop::{Desktop, SuspendedThread, WindowInfo};

use crate::keys::KeySender;

/// Numeric clipboard format identifier (standard or registered).
pub type FormatId = u32;

/// Opaque native window handle.
///
/// `WindowHandle::NULL` stands for "no window", e.g. when nobody holds
/// the clipboard open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// A single failed OS call, with the error code the OS reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} failed (OS error {code})")]
pub struct OsError {
    pub op: &'static str,
    pub code: u32,
}

impl OsError {
    pub fn new(op: &'static str, code: u32) -> Self {
        Self { op, code }
    }
}

/// Errors returned while constructing a platform set.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// There is no native adapter for the target this binary was built for.
    #[error("no native clipboard backend for this platform")]
    Unsupported,

    #[error(transparent)]
    Os(#[from] OsError),
}

/// A composed set of platform adapters.
///
/// Everything is single-threaded: clipboard notifications arrive through
/// the calling thread's own message loop, so the set is deliberately
/// `!Send` (`Rc`).
pub struct Platform {
    /// OS clipboard protocol and the owner-window message loop.
    pub clipboard: Rc<dyn ClipboardOs>,

    /// Window, process and thread queries.
    pub desktop: Rc<dyn Desktop>,

    /// Synthesizes the copy/paste trigger keys.
    pub keys: Rc<dyn KeySender>,
}

impl Platform {
    /// Compose the native adapters for the current OS.
    pub fn native() -> Result<Self, PlatformError> {
        #[cfg(windows)]
        {
            Ok(Self {
                clipboard: Rc::new(win32::clipboard::Win32Clipboard::new()?),
                desktop: Rc::new(win32::desktop::Win32Desktop::new()),
                keys: Rc::new(win32::keys::Win32KeySender::new()),
            })
        }

        #[cfg(not(windows))]
        {
            Err(PlatformError::Unsupported)
        }
    }
}
