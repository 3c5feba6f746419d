//! Competing-service suppressor.
//!
//! The Windows clipboard-history service opens the clipboard a few hundred
//! milliseconds after every change. During a transfer that makes the
//! target's own open fail now and then, or makes the history service the
//! first reader of deferred paste data. Its message-only windows have the
//! class `CLIPBRDWNDCLASS` and live in `svchost.exe`; suspending their
//! threads for the duration of the transfer keeps it out of the way.

use crate::platform::{Desktop, SuspendedThread};

const HISTORY_WINDOW_CLASS: &str = "CLIPBRDWNDCLASS";
const HISTORY_PROCESS: &str = "svchost.exe";

/// Suspends the clipboard-history threads; resumes them on drop.
///
/// Acquisition is best-effort. Other processes own windows of the same
/// class (clipboard managers, the target app itself), so only threads of
/// the system service are touched.
pub struct HistorySuppressor<'a> {
    desktop: &'a dyn Desktop,
    threads: Vec<SuspendedThread>,
}

impl<'a> HistorySuppressor<'a> {
    /// Suspend every history-service thread that can be found.
    pub fn start(desktop: &'a dyn Desktop) -> Self {
        let mut threads: Vec<SuspendedThread> = Vec::new();

        for window in desktop.find_message_windows(HISTORY_WINDOW_CLASS) {
            let Some(info) = desktop.window_info(window) else {
                continue;
            };
            if threads.iter().any(|t| t.thread_id() == info.thread_id) {
                continue;
            }
            let is_service = desktop
                .process_name(info.process_id)
                .is_some_and(|name| name.eq_ignore_ascii_case(HISTORY_PROCESS));
            if !is_service {
                continue;
            }

            match desktop.suspend_thread(info.thread_id) {
                Ok(thread) => threads.push(thread),
                Err(e) => tracing::debug!(thread = info.thread_id, error = %e, "cannot suspend clipboard history thread"),
            }
        }

        if threads.is_empty() {
            tracing::debug!("no clipboard history threads suspended");
        } else {
            tracing::debug!(threads = threads.len(), "clipboard history suspended");
        }
        Self { desktop, threads }
    }

    /// A suppressor that touches nothing, for when suppression is off.
    pub fn disabled(desktop: &'a dyn Desktop) -> Self {
        Self {
            desktop,
            threads: Vec::new(),
        }
    }

    pub fn suspended(&self) -> usize {
        self.threads.len()
    }

    /// Resume every suspended thread. Later calls do nothing.
    pub fn resume(&mut self) {
        for thread in self.threads.drain(..) {
            self.desktop.resume_thread(thread);
        }
    }
}

impl Drop for HistorySuppressor<'_> {
    fn drop(&mut self) {
        self.resume();
    }
}
