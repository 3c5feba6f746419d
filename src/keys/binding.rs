//! Key binding parser: "Ctrl+Shift+V" → (modifier set, virtual key).
//!
//! Parses user-provided binding strings from the config file into the
//! modifier mask and virtual-key code the key-sender synthesizes.

use super::KeyError;

/// Modifier bit set of a [`KeyCombo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const SHIFT: Self = Self(0x01);
    pub const CONTROL: Self = Self(0x02);
    pub const ALT: Self = Self(0x04);
    pub const WIN: Self = Self(0x08);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Virtual keys of the set modifiers, in the order they are pressed.
    pub fn virtual_keys(self) -> Vec<u16> {
        [
            (Self::CONTROL, VK_CONTROL),
            (Self::ALT, VK_MENU),
            (Self::SHIFT, VK_SHIFT),
            (Self::WIN, VK_LWIN),
        ]
        .into_iter()
        .filter(|(m, _)| self.contains(*m))
        .map(|(_, vk)| vk)
        .collect()
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Modifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12;
pub const VK_LWIN: u16 = 0x5b;
pub const VK_RETURN: u16 = 0x0d;

/// A parsed key combination ready for synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    /// Virtual-key code of the non-modifier key.
    pub key: u16,
    /// Original user-provided string.
    pub raw: String,
}

impl KeyCombo {
    /// A bare Enter key.
    pub fn enter() -> Self {
        Self {
            modifiers: Modifiers::NONE,
            key: VK_RETURN,
            raw: "Enter".into(),
        }
    }
}

/// Parse a key binding specification string.
///
/// Format: `[Modifier+...]Key`
///
/// Modifiers: `Shift`, `Control`/`Ctrl`, `Alt`, `Win`/`Super`
/// Keys: single letter (A-Z), digit (0-9), F1-F24, or named key
/// (space, enter, escape, tab, backspace, delete, insert, navigation keys).
pub fn parse_binding(spec: &str) -> Result<KeyCombo, KeyError> {
    let parts: Vec<&str> = spec.split('+').map(str::trim).collect();

    // Last part is the key name, everything before is modifiers.
    let (modifier_parts, key_name) = parts.split_at(parts.len() - 1);
    let key_name = key_name[0];

    if key_name.is_empty() {
        return Err(KeyError::InvalidBinding(format!("missing key in: {spec:?}")));
    }

    let mut modifiers = Modifiers::NONE;
    for &m in modifier_parts {
        let mask = parse_modifier(m)
            .ok_or_else(|| KeyError::InvalidBinding(format!("unknown modifier: {m:?}")))?;
        modifiers |= mask;
    }

    let key = key_name_to_vk(key_name)
        .ok_or_else(|| KeyError::InvalidBinding(format!("unknown key: {key_name:?}")))?;

    Ok(KeyCombo {
        modifiers,
        key,
        raw: spec.to_string(),
    })
}

/// Parse a modifier name to its bit.
fn parse_modifier(name: &str) -> Option<Modifiers> {
    match name.to_ascii_lowercase().as_str() {
        "shift" => Some(Modifiers::SHIFT),
        "control" | "ctrl" => Some(Modifiers::CONTROL),
        "alt" => Some(Modifiers::ALT),
        "win" | "super" => Some(Modifiers::WIN),
        _ => None,
    }
}

/// Map a key name to a virtual-key code.
fn key_name_to_vk(name: &str) -> Option<u16> {
    // Letters and digits share their ASCII uppercase code.
    if name.len() == 1 {
        let ch = name.chars().next()?;
        if ch.is_ascii_alphanumeric() {
            return Some(ch.to_ascii_uppercase() as u16);
        }
    }

    // VK_F1 = 0x70 ... VK_F24 = 0x87
    if let Some(rest) = name.strip_prefix('F').or_else(|| name.strip_prefix('f'))
        && let Ok(n) = rest.parse::<u16>()
        && (1..=24).contains(&n)
    {
        return Some(0x70 + n - 1);
    }

    match name.to_ascii_lowercase().as_str() {
        "space" => Some(0x20),
        "return" | "enter" => Some(VK_RETURN),
        "escape" | "esc" => Some(0x1b),
        "tab" => Some(0x09),
        "backspace" => Some(0x08),
        "delete" | "del" => Some(0x2e),
        "insert" | "ins" => Some(0x2d),
        "home" => Some(0x24),
        "end" => Some(0x23),
        "page_up" | "pageup" | "pgup" => Some(0x21),
        "page_down" | "pagedown" | "pgdn" => Some(0x22),
        "left" => Some(0x25),
        "up" => Some(0x26),
        "right" => Some(0x27),
        "down" => Some(0x28),
        _ => None,
    }
}
