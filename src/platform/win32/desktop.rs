//! Win32 desktop adapter: focus, window ownership, process names, thread
//! suspension and input blocking.

use std::time::{Duration, Instant};

use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, LPARAM, WPARAM};
use windows::Win32::System::Threading::{
    OpenProcess, OpenThread, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW, ResumeThread, SuspendThread, THREAD_SUSPEND_RESUME,
};
use windows::Win32::UI::Input::KeyboardAndMouse::BlockInput;
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowExW, GUITHREADINFO, GetClassNameW, GetForegroundWindow, GetGUIThreadInfo,
    GetWindowThreadProcessId, HWND_MESSAGE, PostMessageW, SMTO_ABORTIFHUNG, SMTO_BLOCK,
    SendMessageTimeoutW, WM_NULL, WM_SYSCOMMAND,
};
use windows::core::{PCWSTR, PWSTR};

use super::{handle, hwnd, os_error, wide};
use crate::platform::{Desktop, OsError, SuspendedThread, WindowHandle, WindowInfo};

const CONSOLE_CLASS: &str = "ConsoleWindowClass";

pub struct Win32Desktop;

impl Win32Desktop {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Win32Desktop {
    fn default() -> Self {
        Self::new()
    }
}

fn class_name(window: HWND) -> Option<String> {
    let mut buf = [0u16; 256];
    // SAFETY: the buffer length is passed with the slice.
    let len = unsafe { GetClassNameW(window, &mut buf) };
    (len > 0).then(|| String::from_utf16_lossy(&buf[..len as usize]))
}

impl Desktop for Win32Desktop {
    fn focused_window(&self) -> Option<WindowHandle> {
        // SAFETY: plain queries; the info struct is sized before the call.
        unsafe {
            let foreground = GetForegroundWindow();
            if foreground.0.is_null() {
                return None;
            }
            let thread = GetWindowThreadProcessId(foreground, None);
            let mut info = GUITHREADINFO {
                cbSize: std::mem::size_of::<GUITHREADINFO>() as u32,
                ..Default::default()
            };
            if GetGUIThreadInfo(thread, &mut info).is_ok() && !info.hwndFocus.0.is_null() {
                return Some(handle(info.hwndFocus));
            }
            Some(handle(foreground))
        }
    }

    fn window_info(&self, window: WindowHandle) -> Option<WindowInfo> {
        let mut process_id = 0u32;
        // SAFETY: `process_id` outlives the call.
        let thread_id = unsafe { GetWindowThreadProcessId(hwnd(window), Some(&mut process_id)) };
        (thread_id != 0).then_some(WindowInfo { thread_id, process_id })
    }

    fn process_name(&self, process_id: u32) -> Option<String> {
        // SAFETY: the process handle is closed before returning.
        unsafe {
            let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;
            let mut buf = [0u16; 1024];
            let mut len = buf.len() as u32;
            let queried = QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut len);
            let _ = CloseHandle(process);
            queried.ok()?;

            let path = String::from_utf16_lossy(&buf[..len as usize]);
            path.rsplit('\\').next().map(str::to_string)
        }
    }

    fn find_message_windows(&self, class: &str) -> Vec<WindowHandle> {
        let class = wide(class);
        let mut windows = Vec::new();
        let mut after = HWND::default();
        // SAFETY: the class name buffer lives across the loop.
        while let Ok(found) = unsafe { FindWindowExW(HWND_MESSAGE, after, PCWSTR(class.as_ptr()), PCWSTR::null()) } {
            if found.0.is_null() {
                break;
            }
            windows.push(handle(found));
            after = found;
        }
        windows
    }

    fn is_console(&self, window: WindowHandle) -> bool {
        class_name(hwnd(window)).is_some_and(|c| c == CONSOLE_CLASS)
    }

    fn ping(&self, window: WindowHandle, timeout: Duration) -> bool {
        let ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        // SAFETY: WM_NULL carries no pointers.
        let answered = unsafe {
            SendMessageTimeoutW(
                hwnd(window),
                WM_NULL,
                WPARAM(0),
                LPARAM(0),
                SMTO_ABORTIFHUNG | SMTO_BLOCK,
                ms,
                None,
            )
        };
        answered.0 != 0
    }

    fn post_command(&self, window: WindowHandle, command: u32) -> Result<(), OsError> {
        // SAFETY: WM_SYSCOMMAND with a command id and no pointers.
        unsafe { PostMessageW(hwnd(window), WM_SYSCOMMAND, WPARAM(command as usize), LPARAM(0)) }
            .map_err(os_error("PostMessageW"))
    }

    fn suspend_thread(&self, thread_id: u32) -> Result<SuspendedThread, OsError> {
        // SAFETY: the handle is kept in the token and closed on resume, or
        // closed here if suspension fails.
        unsafe {
            let thread = OpenThread(THREAD_SUSPEND_RESUME, false, thread_id).map_err(os_error("OpenThread"))?;
            if SuspendThread(thread) == u32::MAX {
                let e = super::last_error("SuspendThread");
                let _ = CloseHandle(thread);
                return Err(e);
            }
            Ok(SuspendedThread::new(thread_id, thread.0 as isize))
        }
    }

    fn resume_thread(&self, thread: SuspendedThread) {
        let raw = HANDLE(thread.raw() as *mut std::ffi::c_void);
        // SAFETY: `raw` came from `suspend_thread` and is consumed here.
        unsafe {
            if ResumeThread(raw) == u32::MAX {
                tracing::warn!(thread = thread.thread_id(), "ResumeThread failed");
            }
            let _ = CloseHandle(raw);
        }
    }

    fn block_input(&self, block: bool) -> Result<(), OsError> {
        // SAFETY: no pointers; fails without elevation.
        unsafe { BlockInput(block) }.map_err(os_error("BlockInput"))
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
