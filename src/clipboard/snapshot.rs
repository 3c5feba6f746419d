//! Snapshot store: saves clipboard formats before a transfer and puts
//! them back afterward, byte for byte.

use std::fmt;

use super::format::{self, CF_UNICODETEXT, MAX_SNAPSHOT_ITEM};
use crate::config::SnapshotPolicy;
use crate::platform::{ClipboardOs, DataRead, FormatId};

/// One saved clipboard format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardItem {
    pub format: FormatId,
    pub payload: Vec<u8>,
}

/// Formats captured while the clipboard lock was held.
///
/// Consumed by [`restore`](Self::restore); never outlives one operation.
#[derive(Debug, Default)]
pub struct Snapshot {
    items: Vec<ClipboardItem>,
}

/// Why a format was or would be left out of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Skip {
    Policy,
    Excluded,
    Unrestorable(&'static str),
}

impl Skip {
    fn describe(&self) -> &'static str {
        match self {
            Skip::Policy => "not text",
            Skip::Excluded => "in except_formats",
            Skip::Unrestorable(reason) => *reason,
        }
    }
}

fn policy_skip(
    os: &dyn ClipboardOs,
    format: FormatId,
    policy: SnapshotPolicy,
    except_formats: &[String],
) -> Option<Skip> {
    match policy {
        SnapshotPolicy::Off => Some(Skip::Policy),
        SnapshotPolicy::TextOnly => (format != CF_UNICODETEXT).then_some(Skip::Policy),
        SnapshotPolicy::AllFormats => {
            if let Some(reason) = format::unrestorable_reason(format) {
                return Some(Skip::Unrestorable(reason));
            }
            if except_formats.is_empty() {
                return None;
            }
            let name = format::format_name(os, format);
            except_formats
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&name))
                .then_some(Skip::Excluded)
        }
    }
}

impl Snapshot {
    /// Capture the formats `policy` selects. The clipboard must be open.
    ///
    /// Unrendered, empty and oversized formats are skipped; reading an
    /// unrendered format must never force its owner to render.
    pub fn save(os: &dyn ClipboardOs, policy: SnapshotPolicy, except_formats: &[String]) -> Self {
        let mut items = Vec::new();
        if policy == SnapshotPolicy::Off {
            return Self { items };
        }

        for format in os.formats() {
            if let Some(skip) = policy_skip(os, format, policy, except_formats) {
                if skip != Skip::Policy {
                    tracing::debug!(format, reason = skip.describe(), "snapshot skips format");
                }
                continue;
            }

            match os.read(format, MAX_SNAPSHOT_ITEM) {
                Ok(DataRead::Bytes(payload)) if !payload.is_empty() => {
                    items.push(ClipboardItem { format, payload });
                }
                Ok(DataRead::Oversized(size)) => {
                    tracing::debug!(format, size, "snapshot skips oversized format");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(format, error = %e, "snapshot could not read format"),
            }
        }

        tracing::debug!(
            formats = items.len(),
            bytes = items.iter().map(|i| i.payload.len()).sum::<usize>(),
            "clipboard saved"
        );
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ClipboardItem] {
        &self.items
    }

    /// Empty the clipboard and republish every saved item. The clipboard
    /// must be open.
    ///
    /// Best-effort per item. Returns how many items were written. An empty
    /// snapshot leaves the clipboard untouched.
    pub fn restore(self, os: &dyn ClipboardOs) -> usize {
        if self.items.is_empty() {
            return 0;
        }

        if let Err(e) = os.empty() {
            tracing::warn!(error = %e, "could not empty clipboard for restore");
            return 0;
        }

        let mut restored = 0;
        for item in &self.items {
            match os.write(item.format, &item.payload) {
                Ok(()) => restored += 1,
                Err(e) => tracing::warn!(format = item.format, error = %e, "failed to restore clipboard format"),
            }
        }
        tracing::debug!(restored, saved = self.items.len(), "clipboard restored");
        restored
    }

    /// Report every format on the clipboard as an all-formats snapshot
    /// would treat it. The clipboard must be open.
    pub fn describe(os: &dyn ClipboardOs, except_formats: &[String]) -> Vec<FormatReport> {
        os.formats()
            .into_iter()
            .map(|format| {
                let name = format::format_name(os, format);
                if let Some(skip) = policy_skip(os, format, SnapshotPolicy::AllFormats, except_formats) {
                    return FormatReport {
                        format,
                        name,
                        size: None,
                        restore: false,
                        note: Some(skip.describe()),
                    };
                }

                let (size, note) = match os.read(format, MAX_SNAPSHOT_ITEM) {
                    Ok(DataRead::Bytes(b)) if b.is_empty() => (Some(0), Some("empty")),
                    Ok(DataRead::Bytes(b)) => (Some(b.len()), None),
                    Ok(DataRead::Oversized(n)) => (Some(n), Some("too large")),
                    Ok(DataRead::Unrendered) => (None, Some("not rendered")),
                    Ok(DataRead::Missing) | Err(_) => (None, Some("unreadable")),
                };
                FormatReport {
                    format,
                    name,
                    size,
                    restore: note.is_none(),
                    note,
                }
            })
            .collect()
    }
}

/// One row of the `formats` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatReport {
    pub format: FormatId,
    pub name: String,
    /// Byte size, when the data was read.
    pub size: Option<usize>,
    /// Whether an all-formats snapshot would save and restore it.
    pub restore: bool,
    pub note: Option<&'static str>,
}

impl fmt::Display for FormatReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.size.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        write!(f, "{:<6} {:<32} size={:<9} restore={}", self.format, self.name, size, self.restore)?;
        if let Some(note) = self.note {
            write!(f, "  ({note})")?;
        }
        Ok(())
    }
}
