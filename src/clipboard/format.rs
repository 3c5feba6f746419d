//! Clipboard format ids, names, and the text encoding used on the wire.

use crate::platform::{ClipboardOs, FormatId};

pub const CF_TEXT: FormatId = 1;
pub const CF_BITMAP: FormatId = 2;
pub const CF_METAFILEPICT: FormatId = 3;
pub const CF_SYLK: FormatId = 4;
pub const CF_DIF: FormatId = 5;
pub const CF_TIFF: FormatId = 6;
pub const CF_OEMTEXT: FormatId = 7;
pub const CF_DIB: FormatId = 8;
pub const CF_PALETTE: FormatId = 9;
pub const CF_RIFF: FormatId = 11;
pub const CF_WAVE: FormatId = 12;
pub const CF_UNICODETEXT: FormatId = 13;
pub const CF_ENHMETAFILE: FormatId = 14;
pub const CF_HDROP: FormatId = 15;
pub const CF_LOCALE: FormatId = 16;
pub const CF_DIBV5: FormatId = 17;
/// First id past the standard formats.
pub const CF_MAX: FormatId = 18;
/// First id handed out by format registration.
pub const FIRST_REGISTERED: FormatId = 0xc000;

/// Registered format that asks well-behaved clipboard viewers to leave
/// our data alone.
pub const VIEWER_IGNORE_NAME: &str = "Clipboard Viewer Ignore";

/// Largest payload a snapshot will copy.
pub const MAX_SNAPSHOT_ITEM: usize = 10 * 1024 * 1024;

/// Why a format is left out of an all-formats snapshot, if it is.
pub fn unrestorable_reason(format: FormatId) -> Option<&'static str> {
    match format {
        CF_OEMTEXT => Some("synthesized from text"),
        CF_BITMAP => Some("synthesized from DIB"),
        CF_PALETTE => Some("palette"),
        CF_METAFILEPICT | CF_ENHMETAFILE => Some("metafile handle"),
        f if (CF_MAX..FIRST_REGISTERED).contains(&f) => Some("private or GDI handle"),
        _ => None,
    }
}

fn standard_name(format: FormatId) -> Option<&'static str> {
    Some(match format {
        CF_TEXT => "CF_TEXT",
        CF_BITMAP => "CF_BITMAP",
        CF_METAFILEPICT => "CF_METAFILEPICT",
        CF_SYLK => "CF_SYLK",
        CF_DIF => "CF_DIF",
        CF_TIFF => "CF_TIFF",
        CF_OEMTEXT => "CF_OEMTEXT",
        CF_DIB => "CF_DIB",
        CF_PALETTE => "CF_PALETTE",
        CF_RIFF => "CF_RIFF",
        CF_WAVE => "CF_WAVE",
        CF_UNICODETEXT => "CF_UNICODETEXT",
        CF_ENHMETAFILE => "CF_ENHMETAFILE",
        CF_HDROP => "CF_HDROP",
        CF_LOCALE => "CF_LOCALE",
        CF_DIBV5 => "CF_DIBV5",
        _ => return None,
    })
}

/// Display name of a format: registered name, standard constant name, or
/// the number.
pub fn format_name(os: &dyn ClipboardOs, format: FormatId) -> String {
    if format >= FIRST_REGISTERED
        && let Some(name) = os.registered_name(format)
    {
        return name;
    }
    standard_name(format)
        .map(str::to_string)
        .unwrap_or_else(|| format.to_string())
}

/// Encode text as NUL-terminated UTF-16LE (`CF_UNICODETEXT` layout).
pub fn encode_text(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Decode `CF_UNICODETEXT` bytes, stopping at the first NUL.
pub fn decode_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}
