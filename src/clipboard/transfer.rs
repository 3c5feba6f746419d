//! Transfer orchestrator: the Copy and Paste sequences.
//!
//! Both sequences share the same skeleton: block input, take the
//! clipboard (owner window + lock), save a snapshot, pause the history
//! service, publish or request data, send the trigger, wait on the
//! listener, then restore and release. Every resource is an RAII guard
//! declared in acquisition order, so it is released in reverse order on
//! every exit path, and the snapshot is restored before any error is
//! returned.

use std::time::{Duration, Instant};

use regex::RegexSet;

use super::access::ClipboardView;
use super::data::{ClipboardData, PastePayload, ProducerError};
use super::format::VIEWER_IGNORE_NAME;
use super::guard::ClipboardGuard;
use super::listener::{TransferListener, WaitOutcome};
use super::snapshot::{FormatReport, Snapshot};
use super::suppress::HistorySuppressor;
use super::{ClipboardError, Direction};
use crate::config::{ConfigError, SnapshotPolicy, TransferOptions, TriggerKeys};
use crate::keys::{KeyCombo, KeySender};
use crate::platform::{Desktop, Platform, WindowHandle};

/// Console system menu: Edit > Copy.
const SC_CONSOLE_COPY: u32 = 65520;
/// Console system menu: Edit > Paste.
const SC_CONSOLE_PASTE: u32 = 65521;

/// Blocks user keyboard input until dropped. Best-effort.
struct InputBlock<'a> {
    desktop: &'a dyn Desktop,
    active: bool,
}

impl<'a> InputBlock<'a> {
    fn start(desktop: &'a dyn Desktop, enabled: bool) -> Self {
        let active = enabled
            && desktop
                .block_input(true)
                .inspect_err(|e| tracing::warn!(error = %e, "could not block user input"))
                .is_ok();
        Self { desktop, active }
    }
}

impl Drop for InputBlock<'_> {
    fn drop(&mut self) {
        if self.active
            && let Err(e) = self.desktop.block_input(false)
        {
            tracing::warn!(error = %e, "could not unblock user input");
        }
    }
}

/// Releases synthesized keys when dropped.
struct HeldKeys<'a>(&'a dyn KeySender);

impl Drop for HeldKeys<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Copies from and pastes into the focused application through the
/// system clipboard.
///
/// Not reentrant: one transfer per process at a time.
pub struct ClipboardEngine {
    platform: Platform,
    options: TransferOptions,
    triggers: TriggerKeys,
    trusted: RegexSet,
}

impl ClipboardEngine {
    pub fn new(platform: Platform, options: TransferOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let triggers = options.keys.resolve()?;
        let trusted = options.trusted_reader_set()?;
        Ok(Self {
            platform,
            options,
            triggers,
            trusted,
        })
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Copy the selection of the focused app and return it as text.
    ///
    /// Falls back to the paths of a file list when the target published
    /// files instead of text.
    pub fn copy(&self, cut: bool) -> Result<String, ClipboardError> {
        self.copy_with(cut, |view| {
            Ok(view.text().or_else(|| {
                view.file_paths()
                    .filter(|paths| !paths.is_empty())
                    .map(|paths| paths.join("\r\n"))
            }))
        })?
        .ok_or(ClipboardError::NoData)
    }

    /// Copy the selection of the focused app and hand the clipboard to
    /// `consume` while it is still locked.
    pub fn copy_with<T, F>(&self, cut: bool, consume: F) -> Result<T, ClipboardError>
    where
        F: FnOnce(&ClipboardView<'_>) -> Result<T, ProducerError>,
    {
        let started = Instant::now();
        let timing = &self.options.timing;
        let policy = self.options.effective_snapshot();
        let desktop = &*self.platform.desktop;

        let target = desktop.focused_window().ok_or(ClipboardError::NoFocus)?;
        let _input = InputBlock::start(desktop, self.options.block_input);
        self.platform.keys.release_user_modifiers();

        let mut guard = ClipboardGuard::new(&self.platform, true, timing.open_retry())?;
        if policy != SnapshotPolicy::Off {
            guard.open(timing.open_timeout())?;
        }
        let _suppressor = self.suppressor();

        let snapshot = if guard.is_open() {
            let snapshot = Snapshot::save(&*self.platform.clipboard, policy, &self.options.except_formats);
            guard.close();
            snapshot
        } else {
            Snapshot::default()
        };

        let result = self.run_copy(&mut guard, target, cut, consume);
        self.restore_snapshot(&mut guard, snapshot);

        if result.is_ok() {
            tracing::info!(
                window = %target,
                cut,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "copy complete"
            );
        }
        result
    }

    fn run_copy<T, F>(
        &self,
        guard: &mut ClipboardGuard<'_>,
        target: WindowHandle,
        cut: bool,
        consume: F,
    ) -> Result<T, ClipboardError>
    where
        F: FnOnce(&ClipboardView<'_>) -> Result<T, ProducerError>,
    {
        let timing = &self.options.timing;
        let combo = if cut { &self.triggers.cut } else { &self.triggers.copy };

        let outcome = {
            let listener = TransferListener::arm_copy(&self.platform, guard.owner(), target)?;
            let _held = HeldKeys(&*self.platform.keys);
            self.trigger(target, combo, SC_CONSOLE_COPY)?;
            self.platform.keys.release();
            listener.wait(timing)
        };

        match outcome {
            WaitOutcome::Satisfied | WaitOutcome::Suspect { .. } => {}
            // A responsive target that never touches the clipboard had
            // nothing selected.
            WaitOutcome::TimedOut { hung: false } => return Err(ClipboardError::NoData),
            WaitOutcome::TimedOut { hung: true } => {
                return Err(ClipboardError::ProtocolTimeout {
                    direction: Direction::Copy,
                    hung: true,
                });
            }
        }

        // Some apps answer reads slowly right after publishing.
        self.platform.desktop.ping(target, timing.copy_settle_ping());

        guard.open(timing.open_timeout())?;
        let view = ClipboardView::new(&*self.platform.clipboard);
        consume(&view).map_err(|e| ClipboardError::DataError(e.to_string()))
    }

    /// Paste into the focused app.
    ///
    /// The data is published with deferred rendering and produced when the
    /// first reader asks for it. An empty payload is a no-op.
    pub fn paste(&self, payload: impl Into<PastePayload>) -> Result<(), ClipboardError> {
        let mut payload = payload.into();
        if payload.is_empty() {
            tracing::debug!("nothing to paste");
            return Ok(());
        }

        let started = Instant::now();
        let timing = &self.options.timing;
        let desktop = &*self.platform.desktop;
        let keys = &*self.platform.keys;

        let target = desktop.focused_window().ok_or(ClipboardError::NoFocus)?;
        let is_console = desktop.is_console(target);
        let _input = InputBlock::start(desktop, self.options.block_input);
        keys.release_user_modifiers();

        let mut enter = false;
        if self.options.paste_enter
            && !is_console
            && let PastePayload::Text(text) = &mut payload
            && text.ends_with('\n')
        {
            let strip = if text.ends_with("\r\n") { 2 } else { 1 };
            text.truncate(text.len() - strip);
            enter = true;
            if text.is_empty() {
                let _held = HeldKeys(keys);
                keys.press(&KeyCombo::enter(), target)?;
                return Ok(());
            }
        }

        let mut guard = ClipboardGuard::acquire(&self.platform, true, timing.open_timeout(), timing.open_retry())?;
        let _suppressor = self.suppressor();
        let snapshot = Snapshot::save(
            &*self.platform.clipboard,
            self.options.effective_snapshot(),
            &self.options.except_formats,
        );

        let result = self.run_paste(&mut guard, target, payload, enter, !snapshot.is_empty());
        self.restore_snapshot(&mut guard, snapshot);
        result?;

        let finally = timing.sleep_finally();
        if !finally.is_zero() {
            desktop.sleep(finally);
        }
        tracing::info!(
            window = %target,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "paste complete"
        );
        Ok(())
    }

    fn run_paste(
        &self,
        guard: &mut ClipboardGuard<'_>,
        target: WindowHandle,
        payload: PastePayload,
        enter: bool,
        restoring: bool,
    ) -> Result<(), ClipboardError> {
        let timing = &self.options.timing;
        let os = &*self.platform.clipboard;
        let desktop = &*self.platform.desktop;
        let keys = &*self.platform.keys;

        let data = payload.into_pending(os)?;
        os.empty()?;
        self.mark_viewer_ignore();
        for format in data.formats() {
            os.write_deferred(format)?;
        }
        guard.close();

        let listener = TransferListener::arm_paste(&self.platform, guard.owner(), target, self.trusted.clone(), data);
        let triggered = desktop.now();
        let outcome = {
            let _held = HeldKeys(keys);
            self.trigger(target, &self.triggers.paste, SC_CONSOLE_PASTE)?;
            keys.release();
            listener.wait(timing)
        };

        if let Some(e) = listener.take_render_error() {
            return Err(ClipboardError::DataError(e));
        }
        drop(listener);

        let synced = match outcome {
            WaitOutcome::Satisfied => true,
            WaitOutcome::Suspect { reader } => {
                tracing::debug!(reader = %reader, "delivery unconfirmed, waiting a fixed delay");
                desktop.sleep(timing.suspect_delay());
                false
            }
            WaitOutcome::TimedOut { hung } => {
                return Err(ClipboardError::ProtocolTimeout {
                    direction: Direction::Paste,
                    hung,
                });
            }
        };

        if enter {
            let _held = HeldKeys(keys);
            keys.press(&KeyCombo::enter(), target)?;
        }

        // Some apps read the clipboard asynchronously after the paste
        // message; give them time before the snapshot overwrites the data.
        let rounds = match (synced, restoring) {
            (true, _) => timing.settle_rounds,
            (false, true) => timing.settle_rounds_unsynced_restore,
            (false, false) => timing.settle_rounds_unsynced,
        };
        // The whole paste finishes within the wait bound plus the fixed
        // delay, counted from the trigger.
        let deadline = triggered + timing.outer_wait() + timing.suspect_delay();
        for i in 0..rounds {
            let left = deadline.saturating_duration_since(desktop.now());
            if left.is_zero() {
                tracing::debug!(window = %target, round = i, "settle budget used up");
                break;
            }
            if !desktop.ping(target, timing.settle_ping().min(left)) {
                tracing::debug!(window = %target, round = i, "target stopped answering, settle cut short");
                break;
            }
            let left = deadline.saturating_duration_since(desktop.now());
            desktop.sleep(Duration::from_millis(u64::from(i) + 3).min(left));
        }
        Ok(())
    }

    /// Read clipboard text without involving any other app.
    pub fn get_text(&self) -> Result<Option<String>, ClipboardError> {
        let guard = self.open_plain()?;
        let text = ClipboardView::new(&*self.platform.clipboard).text();
        drop(guard);
        Ok(text)
    }

    pub fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.set_data(&ClipboardData::new().add_text(text))
    }

    /// Replace the clipboard content with `data`, rendered immediately.
    pub fn set_data(&self, data: &ClipboardData) -> Result<(), ClipboardError> {
        let os = &*self.platform.clipboard;
        let _guard = self.open_plain()?;
        let items = data.resolve(os)?;
        os.empty()?;
        for (format, bytes) in items {
            os.write(format, &bytes)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ClipboardError> {
        let _guard = self.open_plain()?;
        self.platform.clipboard.empty()?;
        Ok(())
    }

    /// List every clipboard format with its size and whether an
    /// all-formats snapshot would restore it.
    pub fn describe_formats(&self) -> Result<Vec<FormatReport>, ClipboardError> {
        let _guard = self.open_plain()?;
        Ok(Snapshot::describe(&*self.platform.clipboard, &self.options.except_formats))
    }

    fn open_plain(&self) -> Result<ClipboardGuard<'_>, ClipboardError> {
        let timing = &self.options.timing;
        ClipboardGuard::acquire(&self.platform, true, timing.open_timeout(), timing.open_retry())
    }

    fn suppressor(&self) -> HistorySuppressor<'_> {
        let desktop = &*self.platform.desktop;
        if self.options.suppress_history {
            HistorySuppressor::start(desktop)
        } else {
            HistorySuppressor::disabled(desktop)
        }
    }

    /// Send the trigger: the key combination, or the system-menu command
    /// for console windows.
    fn trigger(&self, target: WindowHandle, combo: &KeyCombo, console_command: u32) -> Result<(), ClipboardError> {
        if self.platform.desktop.is_console(target) {
            self.platform.desktop.post_command(target, console_command)?;
        } else {
            self.platform.keys.press(combo, target)?;
        }
        Ok(())
    }

    /// Ask polite clipboard viewers to ignore our data.
    fn mark_viewer_ignore(&self) {
        let os = &*self.platform.clipboard;
        let written = os
            .register_format(VIEWER_IGNORE_NAME)
            .and_then(|format| os.write(format, &[0]));
        if let Err(e) = written {
            tracing::debug!(error = %e, "could not set viewer-ignore format");
        }
    }

    fn restore_snapshot(&self, guard: &mut ClipboardGuard<'_>, snapshot: Snapshot) {
        if snapshot.is_empty() {
            return;
        }
        if !guard.is_open() && !guard.try_open(self.options.timing.reopen_timeout()) {
            tracing::warn!("clipboard busy, previous content not restored");
            return;
        }
        snapshot.restore(&*self.platform.clipboard);
        guard.close();
    }
}
