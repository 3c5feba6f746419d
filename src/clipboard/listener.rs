//! Transfer listener: turns owner-window notifications into a waitable
//! completion signal.
//!
//! For Paste the payload is declared with deferred rendering, so the OS
//! asks our owner window for it exactly once, synchronously, when the
//! first reader opens the clipboard and requests a format. For Copy the
//! signal is the posted content-changed notification.
//!
//! The callback runs inside the message pump of [`TransferListener::wait`],
//! on the calling thread. It only writes the listener's cells; the waiter
//! reads them between pump calls.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use regex::RegexSet;

use super::data::PendingData;
use super::Direction;
use crate::config::Timing;
use crate::platform::{ClipboardOs, Desktop, OsError, OwnerMessage, OwnerProc, Platform, WindowHandle};

/// Completion flag written by the owner-window callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Pending,
    /// The expected signal arrived (Paste: the target read the data).
    Satisfied,
    /// Paste data was read by a window that is not the target.
    WindowMismatch,
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    /// A foreign window read the paste data first. Delivery to the target
    /// is unconfirmed.
    Suspect { reader: WindowHandle },
    /// No signal within the wait budget. `hung` is set if the target also
    /// failed its last liveness ping.
    TimedOut { hung: bool },
}

struct ListenerCore {
    direction: Direction,
    target: WindowHandle,
    target_pid: Option<u32>,
    desktop: Rc<dyn Desktop>,
    trusted: RegexSet,
    state: Cell<ListenerState>,
    holder: Cell<WindowHandle>,
    data: RefCell<Option<PendingData>>,
    render_error: RefCell<Option<String>>,
}

impl ListenerCore {
    /// Whether the window that has the clipboard open counts as the target.
    fn is_target(&self, holder: WindowHandle) -> bool {
        if holder.is_null() || holder == self.target {
            return true;
        }

        let pid = self.desktop.window_info(holder).map(|i| i.process_id);
        if pid.is_some() && pid == self.target_pid {
            return true;
        }

        let process = pid.and_then(|pid| self.desktop.process_name(pid));
        if let Some(name) = &process
            && self.trusted.is_match(name)
        {
            return true;
        }

        tracing::warn!(
            reader = %holder,
            process = process.as_deref().unwrap_or("?"),
            window = %self.target,
            "pasted data was read by another window"
        );
        false
    }

    /// Publish every pending format. Runs the producer at most once.
    fn render(&self, os: &dyn ClipboardOs) {
        let data = self.data.borrow_mut().take();
        let Some(data) = data else {
            return;
        };

        match data.render() {
            Ok(items) => {
                for (format, bytes) in items {
                    if let Err(e) = os.write(format, &bytes) {
                        tracing::warn!(format, error = %e, "failed to render clipboard format");
                        self.render_error.borrow_mut().get_or_insert_with(|| e.to_string());
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "paste data producer failed");
                *self.render_error.borrow_mut() = Some(e.to_string());
            }
        }
    }
}

impl OwnerProc for ListenerCore {
    fn on_message(&self, os: &dyn ClipboardOs, message: OwnerMessage) {
        if self.state.get() != ListenerState::Pending {
            return;
        }

        match (self.direction, message) {
            (Direction::Paste, OwnerMessage::RenderFormat(format)) => {
                let holder = os.open_clipboard_window();
                self.holder.set(holder);
                tracing::debug!(format, reader = %holder, "render requested");

                let is_target = self.is_target(holder);
                // Render even for a foreign reader; clipboard managers retry
                // in a loop when a render request yields nothing.
                self.render(os);
                self.state.set(if is_target {
                    ListenerState::Satisfied
                } else {
                    ListenerState::WindowMismatch
                });
            }
            (Direction::Paste, OwnerMessage::RenderAllFormats) => self.render(os),
            (Direction::Copy, OwnerMessage::ClipboardUpdate) => {
                tracing::debug!(window = %self.target, "clipboard updated");
                self.state.set(ListenerState::Satisfied);
            }
            _ => {}
        }
    }
}

/// A listener installed on one owner window for one transfer.
///
/// Dropping it unhooks the callback (and, for Copy, the format listener).
pub struct TransferListener<'a> {
    platform: &'a Platform,
    window: WindowHandle,
    core: Rc<ListenerCore>,
}

impl<'a> TransferListener<'a> {
    fn install(
        platform: &'a Platform,
        window: WindowHandle,
        direction: Direction,
        target: WindowHandle,
        trusted: RegexSet,
        data: Option<PendingData>,
    ) -> Self {
        let core = Rc::new(ListenerCore {
            direction,
            target,
            target_pid: platform.desktop.window_info(target).map(|i| i.process_id),
            desktop: platform.desktop.clone(),
            trusted,
            state: Cell::new(ListenerState::Pending),
            holder: Cell::new(WindowHandle::NULL),
            data: RefCell::new(data),
            render_error: RefCell::new(None),
        });
        platform
            .clipboard
            .set_owner_proc(window, Some(core.clone() as Rc<dyn OwnerProc>));
        Self {
            platform,
            window,
            core,
        }
    }

    /// Wait for the target to publish, via the content-changed notification.
    pub(crate) fn arm_copy(
        platform: &'a Platform,
        window: WindowHandle,
        target: WindowHandle,
    ) -> Result<Self, OsError> {
        let listener = Self::install(platform, window, Direction::Copy, target, RegexSet::empty(), None);
        platform.clipboard.add_format_listener(window)?;
        Ok(listener)
    }

    /// Serve render requests for `data`, which must already be declared
    /// deferred with `window` as the clipboard owner.
    pub(crate) fn arm_paste(
        platform: &'a Platform,
        window: WindowHandle,
        target: WindowHandle,
        trusted: RegexSet,
        data: PendingData,
    ) -> Self {
        Self::install(platform, window, Direction::Paste, target, trusted, Some(data))
    }

    pub fn state(&self) -> ListenerState {
        self.core.state.get()
    }

    /// The window that held the clipboard when data was rendered.
    pub fn holder(&self) -> WindowHandle {
        self.core.holder.get()
    }

    /// Error from rendering paste data, if any. Cleared by the call.
    pub fn take_render_error(&self) -> Option<String> {
        self.core.render_error.borrow_mut().take()
    }

    /// Pump messages until the state leaves `Pending`.
    ///
    /// Waits `wait_slices` slices of `wait_slice`. Between slices the
    /// trigger keys are released and the target is pinged for up to
    /// `hung_ping`, so a hung target stretches the wait to
    /// [`Timing::outer_wait`] and no further.
    pub fn wait(&self, timing: &Timing) -> WaitOutcome {
        let core = &self.core;
        let done = || core.state.get() != ListenerState::Pending;
        let mut slices = timing.wait_slices.max(1);
        let mut hung = false;

        while !self.platform.clipboard.pump(timing.wait_slice(), &done) {
            slices -= 1;
            if slices == 0 {
                tracing::warn!(
                    direction = %core.direction,
                    window = %core.target,
                    hung,
                    "target did not respond to the clipboard trigger"
                );
                return WaitOutcome::TimedOut { hung };
            }

            self.platform.keys.release();
            hung = !self.platform.desktop.ping(core.target, timing.hung_ping());
            if hung {
                tracing::warn!(window = %core.target, "target window is not responding");
            }
        }

        match core.state.get() {
            ListenerState::WindowMismatch => WaitOutcome::Suspect {
                reader: core.holder.get(),
            },
            _ => WaitOutcome::Satisfied,
        }
    }
}

impl Drop for TransferListener<'_> {
    fn drop(&mut self) {
        if self.core.direction == Direction::Copy {
            self.platform.clipboard.remove_format_listener(self.window);
        }
        self.platform.clipboard.set_owner_proc(self.window, None);
    }
}
