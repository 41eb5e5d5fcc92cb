use std::sync::Arc;

use crate::ad::AdDescriptor;

/// One required showing of one ad.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueEntry {
    pub ad: Arc<AdDescriptor>,
    /// 1-based occurrence number within `ad`; display only
    pub sequence_index: u8,
}

impl QueueEntry {
    pub fn new(ad: Arc<AdDescriptor>, sequence_index: u8) -> Self {
        Self { ad, sequence_index }
    }
}

/// Ordered, read-only play order for one gating session.
///
/// Cloning is cheap; the entries are shared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdQueue {
    entries: Arc<[QueueEntry]>,
}

impl AdQueue {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueueEntry> {
        self.entries.iter()
    }
}

impl From<Vec<QueueEntry>> for AdQueue {
    fn from(entries: Vec<QueueEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }
}

impl FromIterator<QueueEntry> for AdQueue {
    fn from_iter<I: IntoIterator<Item = QueueEntry>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl<'a> IntoIterator for &'a AdQueue {
    type Item = &'a QueueEntry;
    type IntoIter = std::slice::Iter<'a, QueueEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
