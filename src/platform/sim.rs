//! Simulated desktop used by the engine tests.
//!
//! One [`Sim`] is a tiny deterministic desktop: a virtual clock, a
//! clipboard with deferred rendering and posted update messages, a scripted
//! target application, foreign readers, hung windows, lock contention and a
//! clipboard-history service that reads every change 300 ms later unless
//! its thread is suspended.
//!
//! Time only moves when the engine sleeps, pumps or pings a hung window.
//! Scripted actions fire when the clock passes their due time.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::{
    ClipboardOs, DataRead, Desktop, FormatId, OsError, OwnerMessage, OwnerProc, Platform,
    SuspendedThread, WindowHandle, WindowInfo,
};
use crate::clipboard::format::{self, CF_UNICODETEXT, FIRST_REGISTERED};
use crate::keys::{KeyCombo, KeyError, KeySender, VK_RETURN};

pub const OUR_PID: u32 = 1000;
const OUR_TID: u32 = 1001;

/// The focused edit control of the target app (`notepad.exe`).
pub const TARGET: WindowHandle = WindowHandle(0x100);
/// A hidden clipboard window inside the target's process.
pub const TARGET_SIBLING: WindowHandle = WindowHandle(0x110);
/// A clipboard manager (`Ditto.exe`).
pub const FOREIGN: WindowHandle = WindowHandle(0x300);
/// A history-class window owned by the clipboard manager, not by svchost.
pub const DECOY: WindowHandle = WindowHandle(0x310);
/// The clipboard-history service window (`svchost.exe`).
pub const HISTORY: WindowHandle = WindowHandle(0x400);
pub const HISTORY_THREAD: u32 = 4001;
/// A store-app broker (`RuntimeBroker.exe`).
pub const BROKER: WindowHandle = WindowHandle(0x500);
pub const CONSOLE: WindowHandle = WindowHandle(0x600);

const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_PARAMETER: u32 = 87;
const ERROR_CLIPBOARD_NOT_OPEN: u32 = 1418;

const HISTORY_CLASS: &str = "CLIPBRDWNDCLASS";
const HISTORY_DELAY: Duration = Duration::from_millis(300);
const FOREIGN_RETRY: Duration = Duration::from_millis(5);

/// Something a foreign process does at a scripted time.
#[derive(Debug, Clone)]
pub enum Action {
    /// The window opens the clipboard and reads Unicode text.
    Read(WindowHandle),
    /// The window opens the clipboard and reads one format.
    ReadFormat(WindowHandle, FormatId),
    /// The window replaces the clipboard with text.
    Publish(WindowHandle, String),
    /// The window stops answering messages.
    Hang(WindowHandle),
    HistoryRead,
}

/// One read performed by a foreign window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub reader: WindowHandle,
    pub format: FormatId,
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Data(Vec<u8>),
    Deferred,
}

struct SimWindow {
    thread_id: u32,
    process_id: u32,
    class: &'static str,
    console: bool,
    hung: bool,
}

struct Scheduled {
    at: Duration,
    seq: u64,
    action: Action,
}

#[derive(Default)]
struct SimState {
    now: Duration,
    seq: u64,
    events: Vec<Scheduled>,
    script: Vec<(Duration, Action)>,

    slots: Vec<(FormatId, Slot)>,
    owner: WindowHandle,
    open_by: Option<WindowHandle>,
    busy_until: Duration,
    dirty: bool,
    rendering: bool,
    registered: Vec<String>,
    listeners: Vec<WindowHandle>,
    posted: VecDeque<(WindowHandle, OwnerMessage)>,
    close_calls: usize,
    renders: usize,
    writes: Vec<FormatId>,

    next_owner: isize,
    owner_windows: HashSet<WindowHandle>,
    windows: HashMap<WindowHandle, SimWindow>,
    processes: HashMap<u32, String>,
    focus: Option<WindowHandle>,

    history: bool,
    history_pending: usize,
    suspended: Vec<u32>,
    suspend_calls: usize,
    resume_calls: usize,

    input_blocked: bool,
    block_calls: usize,
    fail_block: bool,
    key_log: Vec<String>,
    keys_held: bool,
    /// Some read happened while synthesized keys were still down.
    read_with_keys_held: bool,
    fail_keys: bool,
    modifier_releases: usize,
    commands: Vec<(WindowHandle, u32)>,
    pings: usize,
    reads: Vec<Read>,
}

impl SimState {
    fn slot(&self, format: FormatId) -> Option<&Slot> {
        self.slots.iter().find(|(f, _)| *f == format).map(|(_, s)| s)
    }

    fn put(&mut self, format: FormatId, slot: Slot) {
        match self.slots.iter_mut().find(|(f, _)| *f == format) {
            Some(entry) => entry.1 = slot,
            None => self.slots.push((format, slot)),
        }
    }

    fn data(&self, format: FormatId) -> Option<Vec<u8>> {
        match self.slot(format) {
            Some(Slot::Data(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    fn schedule(&mut self, delay: Duration, action: Action) {
        self.seq += 1;
        let at = self.now.saturating_add(delay);
        let seq = self.seq;
        self.events.push(Scheduled { at, seq, action });
    }

    fn lock_free(&self) -> bool {
        self.open_by.is_none() && self.now >= self.busy_until
    }

    /// Release the lock, posting an update to listeners if content changed.
    fn finish_close(&mut self) {
        if self.open_by.take().is_none() || !self.dirty {
            return;
        }
        self.dirty = false;
        let listeners = self.listeners.clone();
        for window in listeners {
            self.posted.push_back((window, OwnerMessage::ClipboardUpdate));
        }
        if self.history {
            self.schedule(HISTORY_DELAY, Action::HistoryRead);
        }
    }
}

struct SimWorld {
    /// Real instant that virtual time zero maps to.
    epoch: Instant,
    state: RefCell<SimState>,
    procs: RefCell<HashMap<WindowHandle, Rc<dyn OwnerProc>>>,
}

impl SimWorld {
    fn now(&self) -> Duration {
        self.state.borrow().now
    }

    fn pop_due(&self, until: Duration) -> Option<Action> {
        let mut s = self.state.borrow_mut();
        let idx = s
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.at <= until)
            .min_by_key(|(_, e)| (e.at, e.seq))
            .map(|(i, _)| i)?;
        let event = s.events.remove(idx);
        if event.at > s.now {
            s.now = event.at;
        }
        Some(event.action)
    }

    fn owner_proc(&self, window: WindowHandle) -> Option<Rc<dyn OwnerProc>> {
        self.procs.borrow().get(&window).cloned()
    }

    fn fire_trigger(&self) {
        let mut s = self.state.borrow_mut();
        let script = s.script.clone();
        for (delay, action) in script {
            s.schedule(delay, action);
        }
    }
}

fn advance(world: &Rc<SimWorld>, duration: Duration) {
    let until = world.now().saturating_add(duration);
    while let Some(action) = world.pop_due(until) {
        run(world, action);
    }
    world.state.borrow_mut().now = until;
}

fn deliver_posted(world: &Rc<SimWorld>) {
    loop {
        let next = world.state.borrow_mut().posted.pop_front();
        let Some((window, message)) = next else {
            return;
        };
        if let Some(owner_proc) = world.owner_proc(window) {
            owner_proc.on_message(&SimClipboard::of(world), message);
        }
    }
}

fn run(world: &Rc<SimWorld>, action: Action) {
    match action {
        Action::Read(reader) => read_as(world, reader, CF_UNICODETEXT),
        Action::ReadFormat(reader, format) => read_as(world, reader, format),
        Action::Publish(writer, text) => publish_as(world, writer, text),
        Action::Hang(window) => {
            if let Some(w) = world.state.borrow_mut().windows.get_mut(&window) {
                w.hung = true;
            }
        }
        Action::HistoryRead => {
            let paused = world.state.borrow().suspended.contains(&HISTORY_THREAD);
            if paused {
                world.state.borrow_mut().history_pending += 1;
            } else {
                read_as(world, HISTORY, CF_UNICODETEXT);
            }
        }
    }
}

fn foreign_open(world: &Rc<SimWorld>, who: WindowHandle, retry: Action) -> bool {
    let mut s = world.state.borrow_mut();
    if !s.lock_free() {
        s.schedule(FOREIGN_RETRY, retry);
        return false;
    }
    s.open_by = Some(who);
    true
}

fn read_as(world: &Rc<SimWorld>, reader: WindowHandle, format: FormatId) {
    if !foreign_open(world, reader, Action::ReadFormat(reader, format)) {
        return;
    }

    let (deferred, owner) = {
        let s = world.state.borrow();
        (s.slot(format) == Some(&Slot::Deferred), s.owner)
    };
    if deferred && let Some(owner_proc) = world.owner_proc(owner) {
        {
            let mut s = world.state.borrow_mut();
            s.rendering = true;
            s.renders += 1;
        }
        owner_proc.on_message(&SimClipboard::of(world), OwnerMessage::RenderFormat(format));
        world.state.borrow_mut().rendering = false;
    }

    let mut s = world.state.borrow_mut();
    let data = s.data(format);
    if s.keys_held {
        s.read_with_keys_held = true;
    }
    s.reads.push(Read {
        reader,
        format,
        data,
    });
    s.finish_close();
}

fn publish_as(world: &Rc<SimWorld>, writer: WindowHandle, text: String) {
    if !foreign_open(world, writer, Action::Publish(writer, text.clone())) {
        return;
    }
    let mut s = world.state.borrow_mut();
    s.slots.clear();
    s.owner = writer;
    s.put(CF_UNICODETEXT, Slot::Data(format::encode_text(&text)));
    s.dirty = true;
    s.finish_close();
}

/// Handle to a simulated desktop plus the test-side controls.
pub struct Sim {
    world: Rc<SimWorld>,
}

impl Sim {
    /// A desktop with the target edit control focused and an empty clipboard.
    pub fn new() -> Self {
        let mut state = SimState {
            next_owner: 0x1000,
            focus: Some(TARGET),
            ..SimState::default()
        };

        let windows = [
            (TARGET, 2001, 2000, "Edit", false),
            (TARGET_SIBLING, 2002, 2000, HISTORY_CLASS, false),
            (FOREIGN, 3001, 3000, "Ditto", false),
            (DECOY, 3002, 3000, HISTORY_CLASS, false),
            (HISTORY, HISTORY_THREAD, 4000, HISTORY_CLASS, false),
            (BROKER, 5001, 5000, "Windows.UI.Core.CoreWindow", false),
            (CONSOLE, 6001, 6000, "ConsoleWindowClass", true),
        ];
        for (handle, thread_id, process_id, class, console) in windows {
            state.windows.insert(
                handle,
                SimWindow {
                    thread_id,
                    process_id,
                    class,
                    console,
                    hung: false,
                },
            );
        }
        for (pid, name) in [
            (OUR_PID, "clipxfer.exe"),
            (2000, "notepad.exe"),
            (3000, "Ditto.exe"),
            (4000, "svchost.exe"),
            (5000, "RuntimeBroker.exe"),
            (6000, "conhost.exe"),
        ] {
            state.processes.insert(pid, name.to_string());
        }

        Self {
            world: Rc::new(SimWorld {
                epoch: Instant::now(),
                state: RefCell::new(state),
                procs: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            clipboard: Rc::new(SimClipboard::of(&self.world)),
            desktop: Rc::new(SimDesktop {
                world: self.world.clone(),
            }),
            keys: Rc::new(SimKeys {
                world: self.world.clone(),
            }),
        }
    }

    fn state(&self) -> std::cell::Ref<'_, SimState> {
        self.world.state.borrow()
    }

    fn state_mut(&self) -> std::cell::RefMut<'_, SimState> {
        self.world.state.borrow_mut()
    }

    // --- setup ---

    /// Put text on the clipboard as if some earlier app had copied it.
    pub fn seed_text(&self, text: &str) {
        self.seed(CF_UNICODETEXT, format::encode_text(text));
    }

    pub fn seed(&self, format: FormatId, bytes: Vec<u8>) {
        self.state_mut().put(format, Slot::Data(bytes));
    }

    /// Declare a format nobody will ever render.
    pub fn seed_deferred(&self, format: FormatId) {
        self.state_mut().put(format, Slot::Deferred);
    }

    pub fn register(&self, name: &str) -> FormatId {
        SimClipboard::of(&self.world)
            .register_format(name)
            .unwrap_or(FIRST_REGISTERED)
    }

    /// Actions run after every trigger (key press or console command),
    /// each delayed by its milliseconds.
    pub fn script(&self, steps: Vec<(u64, Action)>) {
        self.state_mut().script = steps
            .into_iter()
            .map(|(ms, action)| (Duration::from_millis(ms), action))
            .collect();
    }

    /// Run an action at an absolute time on the virtual clock.
    pub fn at(&self, ms: u64, action: Action) {
        let mut s = self.state_mut();
        let delay = Duration::from_millis(ms).saturating_sub(s.now);
        s.schedule(delay, action);
    }

    /// Another process keeps the clipboard open for `duration`.
    pub fn hold_lock_for(&self, duration: Duration) {
        let mut s = self.state_mut();
        s.busy_until = s.now.saturating_add(duration);
    }

    pub fn set_hung(&self, window: WindowHandle, hung: bool) {
        if let Some(w) = self.state_mut().windows.get_mut(&window) {
            w.hung = hung;
        }
    }

    pub fn set_focus(&self, window: Option<WindowHandle>) {
        self.state_mut().focus = window;
    }

    pub fn fail_keys(&self, fail: bool) {
        self.state_mut().fail_keys = fail;
    }

    pub fn fail_block_input(&self, fail: bool) {
        self.state_mut().fail_block = fail;
    }

    pub fn enable_history_service(&self) {
        self.state_mut().history = true;
    }

    // --- observations ---

    pub fn now(&self) -> Duration {
        self.world.now()
    }

    pub fn clipboard_text(&self) -> Option<String> {
        self.state().data(CF_UNICODETEXT).map(|b| format::decode_text(&b))
    }

    pub fn clipboard_bytes(&self, format: FormatId) -> Option<Vec<u8>> {
        self.state().data(format)
    }

    pub fn clipboard_formats(&self) -> Vec<FormatId> {
        self.state().slots.iter().map(|(f, _)| *f).collect()
    }

    pub fn opened_by(&self) -> Option<WindowHandle> {
        self.state().open_by
    }

    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }

    pub fn live_owner_windows(&self) -> usize {
        self.state().owner_windows.len()
    }

    pub fn installed_procs(&self) -> usize {
        self.world.procs.borrow().len()
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Render requests delivered to owner procs.
    pub fn renders(&self) -> usize {
        self.state().renders
    }

    /// Formats written through the adapter, in order.
    pub fn writes(&self) -> Vec<FormatId> {
        self.state().writes.clone()
    }

    pub fn reads(&self) -> Vec<Read> {
        self.state().reads.clone()
    }

    /// Texts `reader` got from the clipboard.
    pub fn texts_read_by(&self, reader: WindowHandle) -> Vec<String> {
        self.state()
            .reads
            .iter()
            .filter(|r| r.reader == reader && r.format == CF_UNICODETEXT)
            .filter_map(|r| r.data.as_deref().map(format::decode_text))
            .collect()
    }

    pub fn suspended_threads(&self) -> Vec<u32> {
        self.state().suspended.clone()
    }

    pub fn suspend_calls(&self) -> usize {
        self.state().suspend_calls
    }

    pub fn resume_calls(&self) -> usize {
        self.state().resume_calls
    }

    pub fn input_blocked(&self) -> bool {
        self.state().input_blocked
    }

    pub fn block_calls(&self) -> usize {
        self.state().block_calls
    }

    pub fn key_log(&self) -> Vec<String> {
        self.state().key_log.clone()
    }

    pub fn keys_held(&self) -> bool {
        self.state().keys_held
    }

    pub fn read_with_keys_held(&self) -> bool {
        self.state().read_with_keys_held
    }

    pub fn modifier_releases(&self) -> usize {
        self.state().modifier_releases
    }

    pub fn commands(&self) -> Vec<(WindowHandle, u32)> {
        self.state().commands.clone()
    }

    pub fn pings(&self) -> usize {
        self.state().pings
    }
}

/// Simulated [`ClipboardOs`].
pub struct SimClipboard {
    world: Rc<SimWorld>,
}

impl SimClipboard {
    fn of(world: &Rc<SimWorld>) -> Self {
        Self {
            world: world.clone(),
        }
    }

    fn require_open(&self, op: &'static str) -> Result<(), OsError> {
        let s = self.world.state.borrow();
        if s.open_by.is_some() || s.rendering {
            Ok(())
        } else {
            Err(OsError::new(op, ERROR_CLIPBOARD_NOT_OPEN))
        }
    }
}

impl ClipboardOs for SimClipboard {
    fn create_owner_window(&self) -> Result<WindowHandle, OsError> {
        let mut s = self.world.state.borrow_mut();
        s.next_owner += 0x10;
        let window = WindowHandle(s.next_owner);
        s.owner_windows.insert(window);
        Ok(window)
    }

    fn destroy_owner_window(&self, window: WindowHandle) {
        let has_deferred = {
            let s = self.world.state.borrow();
            s.owner == window && s.slots.iter().any(|(_, slot)| *slot == Slot::Deferred)
        };
        if has_deferred && let Some(owner_proc) = self.world.owner_proc(window) {
            self.world.state.borrow_mut().rendering = true;
            owner_proc.on_message(self, OwnerMessage::RenderAllFormats);
            self.world.state.borrow_mut().rendering = false;
        }

        self.world.procs.borrow_mut().remove(&window);
        let mut s = self.world.state.borrow_mut();
        if s.owner == window {
            s.slots.retain(|(_, slot)| *slot != Slot::Deferred);
        }
        s.listeners.retain(|w| *w != window);
        s.owner_windows.remove(&window);
    }

    fn set_owner_proc(&self, window: WindowHandle, owner_proc: Option<Rc<dyn OwnerProc>>) {
        let mut procs = self.world.procs.borrow_mut();
        match owner_proc {
            Some(p) => {
                procs.insert(window, p);
            }
            None => {
                procs.remove(&window);
            }
        }
    }

    fn open(&self, owner: WindowHandle) -> Result<(), OsError> {
        let mut s = self.world.state.borrow_mut();
        if !s.lock_free() {
            return Err(OsError::new("OpenClipboard", ERROR_ACCESS_DENIED));
        }
        s.open_by = Some(owner);
        Ok(())
    }

    fn close(&self) {
        let mut s = self.world.state.borrow_mut();
        s.close_calls += 1;
        s.finish_close();
    }

    fn empty(&self) -> Result<(), OsError> {
        self.require_open("EmptyClipboard")?;
        let mut s = self.world.state.borrow_mut();
        s.slots.clear();
        s.owner = s.open_by.unwrap_or(WindowHandle::NULL);
        s.dirty = true;
        Ok(())
    }

    fn formats(&self) -> Vec<FormatId> {
        self.world.state.borrow().slots.iter().map(|(f, _)| *f).collect()
    }

    fn read(&self, format: FormatId, limit: usize) -> Result<DataRead, OsError> {
        self.require_open("GetClipboardData")?;
        let s = self.world.state.borrow();
        Ok(match s.slot(format) {
            None => DataRead::Missing,
            Some(Slot::Deferred) => DataRead::Unrendered,
            Some(Slot::Data(bytes)) if bytes.len() > limit => DataRead::Oversized(bytes.len()),
            Some(Slot::Data(bytes)) => DataRead::Bytes(bytes.clone()),
        })
    }

    fn write(&self, format: FormatId, bytes: &[u8]) -> Result<(), OsError> {
        self.require_open("SetClipboardData")?;
        let mut s = self.world.state.borrow_mut();
        s.put(format, Slot::Data(bytes.to_vec()));
        s.writes.push(format);
        if !s.rendering {
            s.dirty = true;
        }
        Ok(())
    }

    fn write_deferred(&self, format: FormatId) -> Result<(), OsError> {
        self.require_open("SetClipboardData")?;
        let mut s = self.world.state.borrow_mut();
        s.put(format, Slot::Deferred);
        s.dirty = true;
        Ok(())
    }

    fn register_format(&self, name: &str) -> Result<FormatId, OsError> {
        let mut s = self.world.state.borrow_mut();
        let idx = match s.registered.iter().position(|n| n.eq_ignore_ascii_case(name)) {
            Some(idx) => idx,
            None => {
                s.registered.push(name.to_string());
                s.registered.len() - 1
            }
        };
        Ok(FIRST_REGISTERED + idx as FormatId)
    }

    fn registered_name(&self, format: FormatId) -> Option<String> {
        let idx = format.checked_sub(FIRST_REGISTERED)? as usize;
        self.world.state.borrow().registered.get(idx).cloned()
    }

    fn open_clipboard_window(&self) -> WindowHandle {
        self.world
            .state
            .borrow()
            .open_by
            .unwrap_or(WindowHandle::NULL)
    }

    fn add_format_listener(&self, window: WindowHandle) -> Result<(), OsError> {
        let mut s = self.world.state.borrow_mut();
        if !s.owner_windows.contains(&window) {
            return Err(OsError::new("AddClipboardFormatListener", ERROR_INVALID_PARAMETER));
        }
        if !s.listeners.contains(&window) {
            s.listeners.push(window);
        }
        Ok(())
    }

    fn remove_format_listener(&self, window: WindowHandle) {
        self.world
            .state
            .borrow_mut()
            .listeners
            .retain(|w| *w != window);
    }

    fn pump(&self, timeout: Duration, done: &dyn Fn() -> bool) -> bool {
        let world = &self.world;
        let deadline = world.now().saturating_add(timeout);
        loop {
            deliver_posted(world);
            if done() {
                return true;
            }
            match world.pop_due(deadline) {
                Some(action) => run(world, action),
                None => break,
            }
        }
        world.state.borrow_mut().now = deadline;
        deliver_posted(world);
        done()
    }
}

/// Simulated [`Desktop`].
pub struct SimDesktop {
    world: Rc<SimWorld>,
}

impl Desktop for SimDesktop {
    fn focused_window(&self) -> Option<WindowHandle> {
        self.world.state.borrow().focus
    }

    fn window_info(&self, window: WindowHandle) -> Option<WindowInfo> {
        let s = self.world.state.borrow();
        if s.owner_windows.contains(&window) {
            return Some(WindowInfo {
                thread_id: OUR_TID,
                process_id: OUR_PID,
            });
        }
        s.windows.get(&window).map(|w| WindowInfo {
            thread_id: w.thread_id,
            process_id: w.process_id,
        })
    }

    fn process_name(&self, process_id: u32) -> Option<String> {
        self.world.state.borrow().processes.get(&process_id).cloned()
    }

    fn find_message_windows(&self, class: &str) -> Vec<WindowHandle> {
        let s = self.world.state.borrow();
        let mut found: Vec<WindowHandle> = s
            .windows
            .iter()
            .filter(|(_, w)| w.class == class)
            .map(|(h, _)| *h)
            .collect();
        found.sort_by_key(|h| h.0);
        found
    }

    fn is_console(&self, window: WindowHandle) -> bool {
        self.world
            .state
            .borrow()
            .windows
            .get(&window)
            .is_some_and(|w| w.console)
    }

    fn ping(&self, window: WindowHandle, timeout: Duration) -> bool {
        let hung = {
            let mut s = self.world.state.borrow_mut();
            s.pings += 1;
            match s.windows.get(&window) {
                Some(w) => w.hung,
                None => return s.owner_windows.contains(&window),
            }
        };
        if hung {
            advance(&self.world, timeout);
        }
        !hung
    }

    fn post_command(&self, window: WindowHandle, command: u32) -> Result<(), OsError> {
        self.world.state.borrow_mut().commands.push((window, command));
        self.world.fire_trigger();
        Ok(())
    }

    fn suspend_thread(&self, thread_id: u32) -> Result<SuspendedThread, OsError> {
        let mut s = self.world.state.borrow_mut();
        if !s.windows.values().any(|w| w.thread_id == thread_id) {
            return Err(OsError::new("OpenThread", ERROR_INVALID_PARAMETER));
        }
        s.suspended.push(thread_id);
        s.suspend_calls += 1;
        Ok(SuspendedThread::new(thread_id, thread_id as isize))
    }

    fn resume_thread(&self, thread: SuspendedThread) {
        let mut s = self.world.state.borrow_mut();
        s.resume_calls += 1;
        if let Some(idx) = s.suspended.iter().position(|t| *t == thread.thread_id()) {
            s.suspended.remove(idx);
        }
        if thread.thread_id() == HISTORY_THREAD {
            let pending = std::mem::take(&mut s.history_pending);
            for _ in 0..pending {
                s.schedule(Duration::ZERO, Action::HistoryRead);
            }
        }
    }

    fn block_input(&self, block: bool) -> Result<(), OsError> {
        let mut s = self.world.state.borrow_mut();
        s.block_calls += 1;
        if s.fail_block {
            return Err(OsError::new("BlockInput", ERROR_ACCESS_DENIED));
        }
        s.input_blocked = block;
        Ok(())
    }

    fn sleep(&self, duration: Duration) {
        advance(&self.world, duration);
    }

    fn now(&self) -> Instant {
        self.world.epoch + self.world.now()
    }
}

/// Simulated key sender. Any non-Enter combination triggers the script.
pub struct SimKeys {
    world: Rc<SimWorld>,
}

impl KeySender for SimKeys {
    fn release_user_modifiers(&self) {
        self.world.state.borrow_mut().modifier_releases += 1;
    }

    fn press(&self, combo: &KeyCombo, target: WindowHandle) -> Result<(), KeyError> {
        {
            let mut s = self.world.state.borrow_mut();
            if s.fail_keys {
                return Err(KeyError::SendFailed {
                    target,
                    reason: "simulated input failure".into(),
                });
            }
            s.key_log.push(combo.raw.clone());
            s.keys_held = true;
        }
        if combo.key != VK_RETURN {
            self.world.fire_trigger();
        }
        Ok(())
    }

    fn release(&self) {
        self.world.state.borrow_mut().keys_held = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_read_calls_owner_proc_once() {
        struct Render;
        impl OwnerProc for Render {
            fn on_message(&self, os: &dyn ClipboardOs, message: OwnerMessage) {
                if let OwnerMessage::RenderFormat(f) = message {
                    os.write(f, &format::encode_text("late")).unwrap();
                }
            }
        }

        let sim = Sim::new();
        let p = sim.platform();
        let os = &*p.clipboard;
        let owner = os.create_owner_window().unwrap();
        os.set_owner_proc(owner, Some(Rc::new(Render)));
        os.open(owner).unwrap();
        os.empty().unwrap();
        os.write_deferred(CF_UNICODETEXT).unwrap();
        os.close();

        sim.at(10, Action::Read(TARGET));
        sim.at(20, Action::Read(FOREIGN));
        p.desktop.sleep(Duration::from_millis(50));

        assert_eq!(sim.renders(), 1);
        assert_eq!(sim.texts_read_by(TARGET), vec!["late".to_string()]);
        assert_eq!(sim.texts_read_by(FOREIGN), vec!["late".to_string()]);
    }

    #[test]
    fn close_after_change_posts_update() {
        let sim = Sim::new();
        let p = sim.platform();
        let os = &*p.clipboard;
        let owner = os.create_owner_window().unwrap();
        os.add_format_listener(owner).unwrap();
        sim.at(100, Action::Publish(TARGET, "x".into()));

        let seen = Rc::new(RefCell::new(Vec::new()));
        struct Record(Rc<RefCell<Vec<OwnerMessage>>>);
        impl OwnerProc for Record {
            fn on_message(&self, _: &dyn ClipboardOs, message: OwnerMessage) {
                self.0.borrow_mut().push(message);
            }
        }
        os.set_owner_proc(owner, Some(Rc::new(Record(seen.clone()))));

        let got = os.pump(Duration::from_secs(1), &|| !seen.borrow().is_empty());
        assert!(got);
        assert_eq!(sim.now(), Duration::from_millis(100));
        assert_eq!(*seen.borrow(), vec![OwnerMessage::ClipboardUpdate]);
        assert_eq!(sim.clipboard_text().as_deref(), Some("x"));
    }

    #[test]
    fn pump_times_out_on_deadline() {
        let sim = Sim::new();
        let p = sim.platform();
        assert!(!p.clipboard.pump(Duration::from_millis(500), &|| false));
        assert_eq!(sim.now(), Duration::from_millis(500));
    }

    #[test]
    fn hung_ping_costs_its_timeout() {
        let sim = Sim::new();
        let p = sim.platform();
        assert!(p.desktop.ping(TARGET, Duration::from_secs(5)));
        assert_eq!(sim.now(), Duration::ZERO);
        sim.set_hung(TARGET, true);
        assert!(!p.desktop.ping(TARGET, Duration::from_secs(5)));
        assert_eq!(sim.now(), Duration::from_secs(5));
    }

    #[test]
    fn foreign_reader_waits_for_lock() {
        let sim = Sim::new();
        sim.seed_text("old");
        let p = sim.platform();
        p.clipboard.open(WindowHandle::NULL).unwrap();
        sim.at(0, Action::Read(FOREIGN));
        p.desktop.sleep(Duration::from_millis(12));
        assert!(sim.reads().is_empty());
        p.clipboard.close();
        p.desktop.sleep(Duration::from_millis(10));
        assert_eq!(sim.texts_read_by(FOREIGN), vec!["old".to_string()]);
    }

    #[test]
    fn registered_names_round_trip() {
        let sim = Sim::new();
        let p = sim.platform();
        let id = p.clipboard.register_format("HTML Format").unwrap();
        assert_eq!(id, FIRST_REGISTERED);
        assert_eq!(p.clipboard.register_format("html format").unwrap(), id);
        assert_eq!(p.clipboard.registered_name(id).as_deref(), Some("HTML Format"));
        assert_eq!(p.clipboard.registered_name(13), None);
    }
}
