//! Win32 adapters, built on the `windows` crate.
//!
//! Every call here is a thin wrapper over one user32/kernel32 function.
//! Handles cross the trait boundary as [`WindowHandle`] integers and are
//! turned back into `HWND`s at the call site.

pub mod clipboard;
pub mod desktop;
pub mod keys;

use std::ffi::c_void;

use windows::Win32::Foundation::{GetLastError, HWND};

use super::{OsError, WindowHandle};

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut c_void)
}

fn handle(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as isize)
}

/// `OsError` from the calling thread's last-error value.
fn last_error(op: &'static str) -> OsError {
    // SAFETY: reads thread-local state only.
    let code = unsafe { GetLastError() };
    OsError::new(op, code.0)
}

/// `OsError` from a `windows` crate error; keeps the Win32 code of an
/// `HRESULT_FROM_WIN32` value.
fn os_error(op: &'static str) -> impl FnOnce(windows::core::Error) -> OsError {
    move |e| OsError::new(op, (e.code().0 as u32) & 0xffff)
}

/// NUL-terminated UTF-16 for `PCWSTR` parameters.
fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
