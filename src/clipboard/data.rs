//! Paste payloads: plain text, multi-format data, or a lazy producer.

use std::fmt;

use super::format::{self, CF_UNICODETEXT};
use crate::platform::{ClipboardOs, FormatId, OsError};

/// Error type returned by caller-supplied producers and consumers.
pub type ProducerError = Box<dyn std::error::Error + Send + Sync>;

/// Deferred producer of one format's bytes.
pub type Producer = Box<dyn FnOnce() -> Result<Vec<u8>, ProducerError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormatKey {
    Id(FormatId),
    Name(String),
}

/// Several clipboard formats to publish together.
///
/// One payload per format: declaring a format again replaces the earlier
/// bytes, so data added after [`add_text`](Self::add_text) for the same
/// format wins.
#[derive(Debug, Clone, Default)]
pub struct ClipboardData {
    entries: Vec<(FormatKey, Vec<u8>)>,
}

impl ClipboardData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add Unicode text.
    pub fn add_text(self, text: &str) -> Self {
        self.add_raw(CF_UNICODETEXT, format::encode_text(text))
    }

    /// Add bytes under a registered format name such as `"HTML Format"`.
    pub fn add_format(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.entries.push((FormatKey::Name(name.into()), bytes));
        self
    }

    /// Add bytes under a numeric format id.
    pub fn add_raw(mut self, format: FormatId, bytes: Vec<u8>) -> Self {
        self.entries.push((FormatKey::Id(format), bytes));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register names and collapse repeated formats (last declaration wins,
    /// first position kept).
    pub(crate) fn resolve(&self, os: &dyn ClipboardOs) -> Result<Vec<(FormatId, Vec<u8>)>, OsError> {
        let mut out: Vec<(FormatId, Vec<u8>)> = Vec::with_capacity(self.entries.len());
        for (key, bytes) in &self.entries {
            let id = match key {
                FormatKey::Id(id) => *id,
                FormatKey::Name(name) => os.register_format(name)?,
            };
            match out.iter_mut().find(|(f, _)| *f == id) {
                Some(slot) => slot.1 = bytes.clone(),
                None => out.push((id, bytes.clone())),
            }
        }
        Ok(out)
    }
}

/// What a paste puts on the clipboard.
pub enum PastePayload {
    Text(String),
    Data(ClipboardData),
    /// Bytes for one format, produced only when a reader asks for them.
    Lazy { format: FormatId, producer: Producer },
}

impl PastePayload {
    /// Lazily produced Unicode text.
    pub fn lazy_text<F>(producer: F) -> Self
    where
        F: FnOnce() -> Result<String, ProducerError> + 'static,
    {
        Self::Lazy {
            format: CF_UNICODETEXT,
            producer: Box::new(move || producer().map(|s| format::encode_text(&s))),
        }
    }

    pub fn lazy<F>(format: FormatId, producer: F) -> Self
    where
        F: FnOnce() -> Result<Vec<u8>, ProducerError> + 'static,
    {
        Self::Lazy {
            format,
            producer: Box::new(producer),
        }
    }

    /// Nothing to paste. A lazy payload is never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            PastePayload::Text(s) => s.is_empty(),
            PastePayload::Data(d) => d.is_empty(),
            PastePayload::Lazy { .. } => false,
        }
    }

    /// Resolve format ids now; defer the bytes of a lazy payload.
    pub(crate) fn into_pending(self, os: &dyn ClipboardOs) -> Result<PendingData, OsError> {
        Ok(match self {
            PastePayload::Text(s) => PendingData::Ready(vec![(CF_UNICODETEXT, format::encode_text(&s))]),
            PastePayload::Data(d) => PendingData::Ready(d.resolve(os)?),
            PastePayload::Lazy { format, producer } => PendingData::Lazy { format, producer },
        })
    }
}

impl fmt::Debug for PastePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PastePayload::Text(s) => f.debug_tuple("Text").field(s).finish(),
            PastePayload::Data(d) => f.debug_tuple("Data").field(d).finish(),
            PastePayload::Lazy { format, .. } => f.debug_struct("Lazy").field("format", format).finish_non_exhaustive(),
        }
    }
}

impl From<&str> for PastePayload {
    fn from(s: &str) -> Self {
        PastePayload::Text(s.to_string())
    }
}

impl From<String> for PastePayload {
    fn from(s: String) -> Self {
        PastePayload::Text(s)
    }
}

impl From<ClipboardData> for PastePayload {
    fn from(d: ClipboardData) -> Self {
        PastePayload::Data(d)
    }
}

/// Paste data with format ids known and bytes possibly not yet produced.
pub(crate) enum PendingData {
    Ready(Vec<(FormatId, Vec<u8>)>),
    Lazy { format: FormatId, producer: Producer },
}

impl PendingData {
    pub(crate) fn formats(&self) -> Vec<FormatId> {
        match self {
            PendingData::Ready(items) => items.iter().map(|(f, _)| *f).collect(),
            PendingData::Lazy { format, .. } => vec![*format],
        }
    }

    /// Produce every format's bytes. Consumes the data, so a producer runs
    /// at most once.
    pub(crate) fn render(self) -> Result<Vec<(FormatId, Vec<u8>)>, ProducerError> {
        match self {
            PendingData::Ready(items) => Ok(items),
            PendingData::Lazy { format, producer } => Ok(vec![(format, producer()?)]),
        }
    }
}
