//! Resource guard: scoped clipboard lock and temporary owner window.

use std::time::Duration;

use super::ClipboardError;
use crate::platform::{ClipboardOs, Desktop, Platform, WindowHandle};

/// Holds the clipboard lock and, optionally, a hidden owner window.
///
/// Opening retries on contention until its budget runs out. Dropping the
/// guard closes the clipboard and destroys the owner window, whatever
/// path the caller leaves by.
pub struct ClipboardGuard<'a> {
    os: &'a dyn ClipboardOs,
    desktop: &'a dyn Desktop,
    owner: WindowHandle,
    is_open: bool,
    retry: Duration,
}

impl<'a> ClipboardGuard<'a> {
    /// Create the guard without opening the clipboard.
    pub fn new(
        platform: &'a Platform,
        create_owner: bool,
        retry: Duration,
    ) -> Result<Self, ClipboardError> {
        let os = &*platform.clipboard;
        let owner = if create_owner {
            os.create_owner_window()?
        } else {
            WindowHandle::NULL
        };

        Ok(Self {
            os,
            desktop: &*platform.desktop,
            owner,
            is_open: false,
            retry,
        })
    }

    /// Create the guard and open the clipboard within `budget`.
    pub fn acquire(
        platform: &'a Platform,
        create_owner: bool,
        budget: Duration,
        retry: Duration,
    ) -> Result<Self, ClipboardError> {
        let mut guard = Self::new(platform, create_owner, retry)?;
        guard.open(budget)?;
        Ok(guard)
    }

    /// Open the clipboard, retrying while another process holds it.
    ///
    /// Fails with [`ClipboardError::ResourceUnavailable`] carrying the
    /// last OS error once `budget` is spent.
    pub fn open(&mut self, budget: Duration) -> Result<(), ClipboardError> {
        if self.is_open {
            return Ok(());
        }

        let mut waited = Duration::ZERO;
        let mut attempt = 1u32;
        loop {
            match self.os.open(self.owner) {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, waited_ms = waited.as_millis() as u64, "clipboard opened after contention");
                    }
                    self.is_open = true;
                    return Ok(());
                }
                Err(e) if waited >= budget => {
                    tracing::warn!(attempt, error = %e, "giving up on opening the clipboard");
                    return Err(ClipboardError::ResourceUnavailable { code: e.code });
                }
                Err(_) => {
                    self.desktop.sleep(self.retry);
                    waited += self.retry;
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`open`](Self::open) but reports failure as `false`, for
    /// non-critical reopen attempts.
    pub fn try_open(&mut self, budget: Duration) -> bool {
        self.open(budget).is_ok()
    }

    /// Unlock the clipboard but keep the owner window alive.
    pub fn close(&mut self) {
        if self.is_open {
            self.os.close();
            self.is_open = false;
        }
    }

    /// Unlock and destroy the owner window. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.close();
        if !self.owner.is_null() {
            self.os.destroy_owner_window(self.owner);
            self.owner = WindowHandle::NULL;
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn owner(&self) -> WindowHandle {
        self.owner
    }
}

impl Drop for ClipboardGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
