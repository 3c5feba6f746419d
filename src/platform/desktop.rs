//! Desktop trait: window, process and thread queries the engine needs
//! around a transfer.

use std::time::{Duration, Instant};

use super::{OsError, WindowHandle};

/// Thread and process that own a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    pub thread_id: u32,
    pub process_id: u32,
}

/// A thread suspended through [`Desktop::suspend_thread`].
///
/// Only [`Desktop::resume_thread`] consumes it, so a token can be resumed
/// at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct SuspendedThread {
    thread_id: u32,
    raw: isize,
}

impl SuspendedThread {
    pub fn new(thread_id: u32, raw: isize) -> Self {
        Self { thread_id, raw }
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// Adapter-specific handle (an OS thread handle on Windows).
    pub fn raw(&self) -> isize {
        self.raw
    }
}

pub trait Desktop {
    /// The focused control, or the active window if it has no focused child.
    fn focused_window(&self) -> Option<WindowHandle>;

    fn window_info(&self, window: WindowHandle) -> Option<WindowInfo>;

    /// Image file name of a process, e.g. `svchost.exe`.
    fn process_name(&self, process_id: u32) -> Option<String>;

    /// All message-only windows of a window class.
    fn find_message_windows(&self, class: &str) -> Vec<WindowHandle>;

    fn is_console(&self, window: WindowHandle) -> bool;

    /// Send a no-op message and wait for it to be processed. `false` if
    /// the window did not answer within `timeout` (hung) or is gone.
    fn ping(&self, window: WindowHandle, timeout: Duration) -> bool;

    /// Post a system-menu command (`WM_SYSCOMMAND`).
    fn post_command(&self, window: WindowHandle, command: u32) -> Result<(), OsError>;

    fn suspend_thread(&self, thread_id: u32) -> Result<SuspendedThread, OsError>;

    fn resume_thread(&self, thread: SuspendedThread);

    fn block_input(&self, block: bool) -> Result<(), OsError>;

    fn sleep(&self, duration: Duration);

    /// Monotonic clock that advances with [`sleep`](Self::sleep) and
    /// bounded waits.
    fn now(&self) -> Instant;
}
