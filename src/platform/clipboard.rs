//! ClipboardOs trait: the OS clipboard ownership/rendering protocol.
//!
//! Methods map one-to-one onto the native calls; adapters must not add
//! behavior of their own (retries, snapshots and waits belong to the
//! engine). Everything except the owner-window helpers and the message
//! pump requires the clipboard to be open by the calling thread, or to be
//! called from inside an [`OwnerProc`] while a render request is handled.

use std::rc::Rc;
use std::time::Duration;

use super::{FormatId, OsError, WindowHandle};

/// Clipboard notifications delivered to an owner window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerMessage {
    /// A reader requested a format this window declared but did not
    /// render. Delivered synchronously, while the reader holds the lock.
    RenderFormat(FormatId),

    /// The owner window is being destroyed while deferred formats remain.
    RenderAllFormats,

    /// Clipboard content changed. Posted (asynchronous), once per change.
    ClipboardUpdate,
}

/// Callback installed on an owner window; receives [`OwnerMessage`]s.
///
/// `os` is the adapter that dispatched the message, so a render request
/// can publish data without reopening the clipboard.
pub trait OwnerProc {
    fn on_message(&self, os: &dyn ClipboardOs, message: OwnerMessage);
}

/// Result of reading one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataRead {
    /// The format is not on the clipboard.
    Missing,
    /// The format is declared but its owner never rendered it.
    Unrendered,
    /// The data is larger than the caller's limit (size in bytes).
    Oversized(usize),
    Bytes(Vec<u8>),
}

/// Reads and writes the system clipboard at protocol level.
pub trait ClipboardOs {
    /// Create a hidden, message-capable window to own clipboard data.
    fn create_owner_window(&self) -> Result<WindowHandle, OsError>;

    /// Destroy a window made by [`create_owner_window`](Self::create_owner_window).
    /// Also drops any installed [`OwnerProc`].
    fn destroy_owner_window(&self, window: WindowHandle);

    /// Install (or with `None`, remove) the message callback of an owner window.
    fn set_owner_proc(&self, window: WindowHandle, owner_proc: Option<Rc<dyn OwnerProc>>);

    /// Single attempt to lock the clipboard on behalf of `owner`.
    fn open(&self, owner: WindowHandle) -> Result<(), OsError>;

    fn close(&self);

    /// Remove all formats; the opener becomes the clipboard owner.
    fn empty(&self) -> Result<(), OsError>;

    /// Formats currently on the clipboard, in enumeration order.
    fn formats(&self) -> Vec<FormatId>;

    /// Copy the bytes of one format, refusing data larger than `limit`.
    fn read(&self, format: FormatId, limit: usize) -> Result<DataRead, OsError>;

    /// Publish rendered bytes under `format`.
    fn write(&self, format: FormatId, bytes: &[u8]) -> Result<(), OsError>;

    /// Declare `format` without rendering it (render on demand).
    fn write_deferred(&self, format: FormatId) -> Result<(), OsError>;

    fn register_format(&self, name: &str) -> Result<FormatId, OsError>;

    /// Name of a registered format; `None` for standard formats.
    fn registered_name(&self, format: FormatId) -> Option<String>;

    /// The window that currently holds the clipboard open, or NULL.
    fn open_clipboard_window(&self) -> WindowHandle;

    fn add_format_listener(&self, window: WindowHandle) -> Result<(), OsError>;

    fn remove_format_listener(&self, window: WindowHandle);

    /// Dispatch this thread's messages until `done()` holds or `timeout`
    /// elapses. Returns the final value of `done()`.
    fn pump(&self, timeout: Duration, done: &dyn Fn() -> bool) -> bool;
}
