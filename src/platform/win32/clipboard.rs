//! Win32 clipboard adapter.
//!
//! Owner windows are message-only windows of one private class. Their
//! [`OwnerProc`]s live in a per-thread table keyed by window handle, since
//! the window procedure runs on the thread that created the window.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;
use std::time::{Duration, Instant};

use windows::Win32::Foundation::{
    ERROR_CLASS_ALREADY_EXISTS, HANDLE, HGLOBAL, HINSTANCE, HWND, LPARAM, LRESULT, SetLastError,
    WIN32_ERROR, WPARAM,
};
use windows::Win32::System::DataExchange::{
    AddClipboardFormatListener, CloseClipboard, EmptyClipboard, EnumClipboardFormats,
    GetClipboardData, GetClipboardFormatNameW, GetClipboardOwner, GetOpenClipboardWindow,
    IsClipboardFormatAvailable, OpenClipboard, RegisterClipboardFormatW,
    RemoveClipboardFormatListener, SetClipboardData,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Memory::{
    GMEM_MOVEABLE, GlobalAlloc, GlobalFree, GlobalLock, GlobalSize, GlobalUnlock,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, HWND_MESSAGE,
    MSG, MWMO_INPUTAVAILABLE, MsgWaitForMultipleObjectsEx, PM_REMOVE, PeekMessageW,
    QS_ALLINPUT, RegisterClassW, TranslateMessage, WINDOW_EX_STYLE, WINDOW_STYLE,
    WM_CLIPBOARDUPDATE, WM_RENDERALLFORMATS, WM_RENDERFORMAT, WNDCLASSW,
};
use windows::core::PCWSTR;

use super::{handle, hwnd, last_error, os_error, wide};
use crate::platform::{ClipboardOs, DataRead, FormatId, OsError, OwnerMessage, OwnerProc, WindowHandle};

const OWNER_CLASS: &str = "ClipxferClipboardOwner";

/// Registered formats start here; lower ids are standard formats.
const FIRST_REGISTERED: FormatId = 0xc000;

thread_local! {
    static OWNER_PROCS: RefCell<HashMap<isize, Rc<dyn OwnerProc>>> = RefCell::new(HashMap::new());
}

fn owner_proc(window: WindowHandle) -> Option<Rc<dyn OwnerProc>> {
    OWNER_PROCS.with(|procs| procs.borrow().get(&window.0).cloned())
}

/// Clipboard protocol through user32.
pub struct Win32Clipboard {
    instance: HINSTANCE,
    class: Vec<u16>,
}

impl Win32Clipboard {
    /// Register the owner window class (once per process).
    pub fn new() -> Result<Self, OsError> {
        // SAFETY: a NULL module name returns the handle of the running image.
        let module = unsafe { GetModuleHandleW(PCWSTR::null()) }.map_err(os_error("GetModuleHandleW"))?;
        let instance = HINSTANCE::from(module);
        let class = wide(OWNER_CLASS);

        let wc = WNDCLASSW {
            lpfnWndProc: Some(owner_wndproc),
            hInstance: instance,
            lpszClassName: PCWSTR(class.as_ptr()),
            ..Default::default()
        };
        // SAFETY: `wc` and the class name it points to outlive the call.
        if unsafe { RegisterClassW(&wc) } == 0 {
            let e = last_error("RegisterClassW");
            if e.code != ERROR_CLASS_ALREADY_EXISTS.0 {
                return Err(e);
            }
        }

        Ok(Self { instance, class })
    }

    /// An adapter handed to owner procs from inside the window procedure.
    /// It never creates windows, so the class fields stay empty.
    fn dispatcher() -> Self {
        Self {
            instance: HINSTANCE::default(),
            class: Vec::new(),
        }
    }
}

unsafe extern "system" fn owner_wndproc(window: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let message = match msg {
        WM_RENDERFORMAT => OwnerMessage::RenderFormat(wparam.0 as FormatId),
        WM_RENDERALLFORMATS => OwnerMessage::RenderAllFormats,
        WM_CLIPBOARDUPDATE => OwnerMessage::ClipboardUpdate,
        // SAFETY: forwarding the arguments we were called with.
        _ => return unsafe { DefWindowProcW(window, msg, wparam, lparam) },
    };
    let Some(owner_proc) = owner_proc(handle(window)) else {
        return unsafe { DefWindowProcW(window, msg, wparam, lparam) };
    };
    let os = Win32Clipboard::dispatcher();

    if message == OwnerMessage::RenderAllFormats {
        // Nobody holds the lock for us here. Render only if we still own
        // the data once it is ours.
        // SAFETY: plain user32 calls on our own window.
        unsafe {
            if OpenClipboard(window).is_err() {
                return LRESULT(0);
            }
            if GetClipboardOwner().is_ok_and(|owner| owner == window) {
                owner_proc.on_message(&os, message);
            }
            let _ = CloseClipboard();
        }
    } else {
        owner_proc.on_message(&os, message);
    }
    LRESULT(0)
}

impl ClipboardOs for Win32Clipboard {
    fn create_owner_window(&self) -> Result<WindowHandle, OsError> {
        // SAFETY: the class was registered in `new` with this instance.
        let window = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PCWSTR(self.class.as_ptr()),
                PCWSTR::null(),
                WINDOW_STYLE::default(),
                0,
                0,
                0,
                0,
                HWND_MESSAGE,
                None,
                self.instance,
                None,
            )
        }
        .map_err(os_error("CreateWindowExW"))?;
        Ok(handle(window))
    }

    fn destroy_owner_window(&self, window: WindowHandle) {
        // Destroying may deliver WM_RENDERALLFORMATS, so the proc goes after.
        // SAFETY: the window was created by this thread.
        if let Err(e) = unsafe { DestroyWindow(hwnd(window)) } {
            tracing::debug!(%window, error = %e, "DestroyWindow failed");
        }
        OWNER_PROCS.with(|procs| procs.borrow_mut().remove(&window.0));
    }

    fn set_owner_proc(&self, window: WindowHandle, owner_proc: Option<Rc<dyn OwnerProc>>) {
        OWNER_PROCS.with(|procs| {
            let mut procs = procs.borrow_mut();
            match owner_proc {
                Some(p) => procs.insert(window.0, p),
                None => procs.remove(&window.0),
            };
        });
    }

    fn open(&self, owner: WindowHandle) -> Result<(), OsError> {
        // SAFETY: a NULL or live window handle.
        unsafe { OpenClipboard(hwnd(owner)) }.map_err(os_error("OpenClipboard"))
    }

    fn close(&self) {
        // SAFETY: fails harmlessly when the clipboard is not open.
        let _ = unsafe { CloseClipboard() };
    }

    fn empty(&self) -> Result<(), OsError> {
        // SAFETY: requires the clipboard open by this thread.
        unsafe { EmptyClipboard() }.map_err(os_error("EmptyClipboard"))
    }

    fn formats(&self) -> Vec<FormatId> {
        let mut formats = Vec::new();
        let mut format = 0;
        loop {
            // SAFETY: enumeration over the open clipboard.
            format = unsafe { EnumClipboardFormats(format) };
            if format == 0 {
                return formats;
            }
            formats.push(format);
        }
    }

    fn read(&self, format: FormatId, limit: usize) -> Result<DataRead, OsError> {
        // SAFETY: the clipboard is open; the global block is locked while
        // copied and stays owned by the clipboard.
        unsafe {
            if IsClipboardFormatAvailable(format).is_err() {
                return Ok(DataRead::Missing);
            }
            let Ok(data) = GetClipboardData(format) else {
                return Ok(DataRead::Unrendered);
            };
            let mem = HGLOBAL(data.0);
            let size = GlobalSize(mem);
            if size > limit {
                return Ok(DataRead::Oversized(size));
            }
            if size == 0 {
                return Ok(DataRead::Bytes(Vec::new()));
            }
            let ptr = GlobalLock(mem);
            if ptr.is_null() {
                return Err(last_error("GlobalLock"));
            }
            let bytes = std::slice::from_raw_parts(ptr as *const u8, size).to_vec();
            let _ = GlobalUnlock(mem);
            Ok(DataRead::Bytes(bytes))
        }
    }

    fn write(&self, format: FormatId, bytes: &[u8]) -> Result<(), OsError> {
        // SAFETY: the block is allocated, filled and handed to the
        // clipboard, which owns it from then on. Freed only on failure.
        unsafe {
            let mem = GlobalAlloc(GMEM_MOVEABLE, bytes.len().max(1)).map_err(os_error("GlobalAlloc"))?;
            let ptr = GlobalLock(mem);
            if ptr.is_null() {
                let e = last_error("GlobalLock");
                let _ = GlobalFree(mem);
                return Err(e);
            }
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
            let _ = GlobalUnlock(mem);

            if let Err(e) = SetClipboardData(format, HANDLE(mem.0)) {
                let _ = GlobalFree(mem);
                return Err(os_error("SetClipboardData")(e));
            }
        }
        Ok(())
    }

    fn write_deferred(&self, format: FormatId) -> Result<(), OsError> {
        // A NULL handle is also the success value for delayed rendering,
        // so only a set last-error code means failure.
        // SAFETY: the clipboard is open and owned by this thread.
        unsafe {
            SetLastError(WIN32_ERROR(0));
            match SetClipboardData(format, HANDLE(std::ptr::null_mut::<c_void>())) {
                Ok(_) => Ok(()),
                Err(e) if e.code().is_ok() => Ok(()),
                Err(e) => Err(os_error("SetClipboardData")(e)),
            }
        }
    }

    fn register_format(&self, name: &str) -> Result<FormatId, OsError> {
        let name = wide(name);
        // SAFETY: NUL-terminated buffer alive for the call.
        match unsafe { RegisterClipboardFormatW(PCWSTR(name.as_ptr())) } {
            0 => Err(last_error("RegisterClipboardFormatW")),
            id => Ok(id),
        }
    }

    fn registered_name(&self, format: FormatId) -> Option<String> {
        if format < FIRST_REGISTERED {
            return None;
        }
        let mut buf = [0u16; 256];
        // SAFETY: the buffer length is passed with the slice.
        let len = unsafe { GetClipboardFormatNameW(format, &mut buf) };
        (len > 0).then(|| String::from_utf16_lossy(&buf[..len as usize]))
    }

    fn open_clipboard_window(&self) -> WindowHandle {
        // SAFETY: no arguments.
        handle(unsafe { GetOpenClipboardWindow() })
    }

    fn add_format_listener(&self, window: WindowHandle) -> Result<(), OsError> {
        // SAFETY: a live owner window.
        unsafe { AddClipboardFormatListener(hwnd(window)) }.map_err(os_error("AddClipboardFormatListener"))
    }

    fn remove_format_listener(&self, window: WindowHandle) {
        // SAFETY: fails harmlessly for a window that never listened.
        if let Err(e) = unsafe { RemoveClipboardFormatListener(hwnd(window)) } {
            tracing::debug!(%window, error = %e, "RemoveClipboardFormatListener failed");
        }
    }

    fn pump(&self, timeout: Duration, done: &dyn Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut msg = MSG::default();
        loop {
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = u32::try_from((deadline - now).as_millis()).unwrap_or(u32::MAX);

            // SAFETY: waits on this thread's queue only; sent messages
            // (render requests) are dispatched inside these calls.
            unsafe {
                let _ = MsgWaitForMultipleObjectsEx(None, wait, QS_ALLINPUT, MWMO_INPUTAVAILABLE);
                while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                    if done() {
                        return true;
                    }
                }
            }
        }
    }
}
