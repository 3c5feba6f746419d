//! Key-sender collaborator: synthesizes the copy/paste trigger keys.
//!
//! The engine hands the sender a parsed [`KeyCombo`] and the target
//! window, then calls [`KeySender::release`] as soon as the trigger has
//! been sent so no modifier stays down while the engine waits.

mod binding;

pub use binding::{KeyCombo, Modifiers, VK_RETURN, parse_binding};

use crate::platform::WindowHandle;

/// Key-sender errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid key binding: {0}")]
    InvalidBinding(String),
    #[error("failed to send keys to {target}: {reason}")]
    SendFailed {
        target: WindowHandle,
        reason: String,
    },
}

pub trait KeySender {
    /// Release modifiers the user is physically holding, so they do not
    /// combine with the synthesized keys.
    fn release_user_modifiers(&self);

    /// Press the combination. Modifiers stay down until [`release`](Self::release).
    fn press(&self, combo: &KeyCombo, target: WindowHandle) -> Result<(), KeyError>;

    /// Release whatever [`press`](Self::press) left down. Idempotent.
    fn release(&self);
}
