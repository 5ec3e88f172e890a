//! Feed snapshot text format.
//!
//! One identifier per line, newline-terminated. The first line is the
//! initialization segment.

use magnetcast_common::{ContentId, Result};

/// One published, internally consistent ordered list of identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    entries: Vec<ContentId>,
}

impl FeedSnapshot {
    pub fn new(entries: Vec<ContentId>) -> Self {
        Self { entries }
    }

    /// Parse feed text as served to consumers.
    ///
    /// The body is trimmed and split on newlines; blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let entries = text
            .trim()
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<ContentId>>>()?;
        Ok(Self { entries })
    }

    /// Render the snapshot, e.g. `X\nY\nZ\n`.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.entries.iter().map(|e| e.as_str().len() + 1).sum());
        for entry in &self.entries {
            out.push_str(entry.as_str());
            out.push('\n');
        }
        out
    }

    pub fn entries(&self) -> &[ContentId] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ContentId> {
        self.entries
    }

    /// The initialization segment's identifier.
    pub fn init(&self) -> Option<&ContentId> {
        self.entries.first()
    }

    /// Everything after the initialization segment.
    pub fn tail(&self) -> &[ContentId] {
        self.entries.get(1..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
