//! `SendInput` key sender.

use std::cell::RefCell;

use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBD_EVENT_FLAGS, KEYBDINPUT, KEYEVENTF_KEYUP,
    SendInput, VIRTUAL_KEY,
};

use crate::keys::{KeyCombo, KeyError, KeySender};
use crate::platform::WindowHandle;

/// Modifiers checked before a trigger: shift, ctrl, alt and both Win keys.
const USER_MODIFIERS: [u16; 5] = [0x10, 0x11, 0x12, 0x5b, 0x5c];

fn key_input(vk: u16, up: bool) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: 0,
                dwFlags: if up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) },
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// Sends input events to whatever window has keyboard focus.
///
/// The target handle is only used for error reports: `SendInput` cannot
/// address a window, so the engine checks focus before pressing.
#[derive(Default)]
pub struct Win32KeySender {
    held: RefCell<Vec<u16>>,
}

impl Win32KeySender {
    pub fn new() -> Self {
        Self::default()
    }

    fn send(&self, inputs: &[INPUT]) -> usize {
        // SAFETY: every element is a fully initialized keyboard INPUT.
        unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) as usize }
    }
}

impl KeySender for Win32KeySender {
    fn release_user_modifiers(&self) {
        let ups: Vec<INPUT> = USER_MODIFIERS
            .iter()
            // SAFETY: reads global key state only.
            .filter(|&&vk| unsafe { GetAsyncKeyState(vk as i32) } < 0)
            .map(|&vk| key_input(vk, true))
            .collect();
        if !ups.is_empty() {
            tracing::debug!(keys = ups.len(), "releasing held modifiers");
            self.send(&ups);
        }
    }

    fn press(&self, combo: &KeyCombo, target: WindowHandle) -> Result<(), KeyError> {
        let modifiers = combo.modifiers.virtual_keys();
        let mut inputs: Vec<INPUT> = modifiers.iter().map(|&vk| key_input(vk, false)).collect();
        inputs.push(key_input(combo.key, false));
        inputs.push(key_input(combo.key, true));

        let sent = self.send(&inputs);
        // Whatever went down stays recorded so `release` can lift it.
        self.held.borrow_mut().extend(modifiers.iter().take(sent));
        if sent != inputs.len() {
            return Err(KeyError::SendFailed {
                target,
                reason: format!("SendInput accepted {sent} of {} events for {}", inputs.len(), combo.raw),
            });
        }
        tracing::debug!(keys = %combo.raw, window = %target, "trigger sent");
        Ok(())
    }

    fn release(&self) {
        let held: Vec<u16> = self.held.borrow_mut().drain(..).rev().collect();
        if held.is_empty() {
            return;
        }
        let ups: Vec<INPUT> = held.into_iter().map(|vk| key_input(vk, true)).collect();
        self.send(&ups);
    }
}
