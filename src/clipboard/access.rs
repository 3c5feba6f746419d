//! Read access to the open clipboard.

use super::format::{self, CF_HDROP, CF_UNICODETEXT};
use crate::platform::{ClipboardOs, DataRead, FormatId};

/// Size of the `DROPFILES` header that precedes the file list in `CF_HDROP`.
const DROPFILES_HEADER: usize = 20;

/// A view of the clipboard while the lock is held.
///
/// Handed to `copy_with` callbacks; only valid for the duration of the call.
pub struct ClipboardView<'a> {
    os: &'a dyn ClipboardOs,
}

impl<'a> ClipboardView<'a> {
    pub(crate) fn new(os: &'a dyn ClipboardOs) -> Self {
        Self { os }
    }

    /// Formats on the clipboard, in enumeration order.
    pub fn formats(&self) -> Vec<FormatId> {
        self.os.formats()
    }

    pub fn format_name(&self, format: FormatId) -> String {
        format::format_name(self.os, format)
    }

    /// Bytes of one format; `None` if absent or unrendered.
    pub fn bytes(&self, format: FormatId) -> Option<Vec<u8>> {
        match self.os.read(format, usize::MAX) {
            Ok(DataRead::Bytes(bytes)) => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(format, error = %e, "clipboard read failed");
                None
            }
        }
    }

    /// Bytes of the first format whose name matches (case-insensitive).
    pub fn bytes_by_name(&self, name: &str) -> Option<Vec<u8>> {
        let format = self
            .formats()
            .into_iter()
            .find(|&f| self.format_name(f).eq_ignore_ascii_case(name))?;
        self.bytes(format)
    }

    pub fn text(&self) -> Option<String> {
        self.bytes(CF_UNICODETEXT).map(|b| format::decode_text(&b))
    }

    /// Paths in a `CF_HDROP` file list.
    pub fn file_paths(&self) -> Option<Vec<String>> {
        self.bytes(CF_HDROP).and_then(|b| parse_drop_files(&b))
    }
}

/// Parse a `DROPFILES` block: a header whose first field is the offset of
/// a double-NUL-terminated list of NUL-terminated paths, wide if the
/// `fWide` field is non-zero.
fn parse_drop_files(bytes: &[u8]) -> Option<Vec<String>> {
    if bytes.len() < DROPFILES_HEADER {
        return None;
    }
    let offset = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
    let wide = u32::from_le_bytes(bytes[16..20].try_into().ok()?) != 0;
    let list = bytes.get(offset..)?;

    let paths: Vec<String> = if wide {
        let units: Vec<u16> = list
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        units
            .split(|&u| u == 0)
            .take_while(|s| !s.is_empty())
            .map(String::from_utf16_lossy)
            .collect()
    } else {
        list.split(|&b| b == 0)
            .take_while(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect()
    };
    Some(paths)
}
