//! Transfer payload store: owner and content references held for the
//! lifetime of one local source.
//!
//! A [`TransferPayload`] is created by `claim` and released exactly once:
//! either dropped on the spot when the source cannot be created, or
//! removed from the [`PayloadStore`] by the source's cancellation. Both
//! references go away together in `Drop`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{ClipboardKind, ClipboardOwner, Content, SourceId};

/// Owner + content pair backing one local source.
pub struct TransferPayload {
    pub owner: Arc<dyn ClipboardOwner>,
    pub content: Content,
}

impl TransferPayload {
    pub fn new(owner: Arc<dyn ClipboardOwner>, content: Content) -> Self {
        Self { owner, content }
    }
}

impl fmt::Debug for TransferPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferPayload").finish_non_exhaustive()
    }
}

impl Drop for TransferPayload {
    fn drop(&mut self) {
        tracing::trace!("transfer payload released");
    }
}

/// A stored payload together with the kind of the source that owns it.
#[derive(Debug)]
pub struct PayloadEntry {
    pub kind: ClipboardKind,
    pub payload: TransferPayload,
}

/// Live payloads keyed by the source that owns them.
///
/// Owned exclusively by the negotiator. No concurrent access.
#[derive(Debug, Default)]
pub struct PayloadStore {
    entries: HashMap<SourceId, PayloadEntry>,
}

impl PayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a payload to a freshly created source.
    ///
    /// Source ids are never reused, so an existing entry means the
    /// transport handed out a duplicate id; the old payload is released.
    pub fn insert(&mut self, source: SourceId, kind: ClipboardKind, payload: TransferPayload) {
        if self
            .entries
            .insert(source, PayloadEntry { kind, payload })
            .is_some()
        {
            tracing::warn!(%source, "duplicate source id — previous payload released");
        }
    }

    pub fn get(&self, source: SourceId) -> Option<&PayloadEntry> {
        self.entries.get(&source)
    }

    /// Detach a payload. Returns `None` if it was already removed.
    pub fn remove(&mut self, source: SourceId) -> Option<PayloadEntry> {
        self.entries.remove(&source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::testing::RecordingOwner;

    fn payload() -> (Arc<RecordingOwner>, Content, TransferPayload) {
        let owner = Arc::new(RecordingOwner::new(b"data"));
        let content: Content = Arc::new(String::from("content"));
        let p = TransferPayload::new(owner.clone(), content.clone());
        (owner, content, p)
    }

    #[test]
    fn drop_releases_both_references() {
        let (owner, content, p) = payload();
        assert_eq!(Arc::strong_count(&owner), 2);
        assert_eq!(Arc::strong_count(&content), 2);
        drop(p);
        assert_eq!(Arc::strong_count(&owner), 1);
        assert_eq!(Arc::strong_count(&content), 1);
    }

    #[test]
    fn insert_and_get() {
        let (_owner, _content, p) = payload();
        let mut store = PayloadStore::new();
        let id = SourceId::next();
        store.insert(id, ClipboardKind::Regular, p);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id).unwrap().kind, ClipboardKind::Regular);
    }

    #[test]
    fn remove_returns_entry_once() {
        let (owner, _content, p) = payload();
        let mut store = PayloadStore::new();
        let id = SourceId::next();
        store.insert(id, ClipboardKind::PrimarySelection, p);

        let entry = store.remove(id).unwrap();
        assert_eq!(entry.kind, ClipboardKind::PrimarySelection);
        drop(entry);
        assert_eq!(Arc::strong_count(&owner), 1);

        assert!(store.remove(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn get_unknown_source() {
        let store = PayloadStore::new();
        assert!(store.get(SourceId::next()).is_none());
    }

    #[test]
    fn duplicate_insert_releases_previous() {
        let (first_owner, _c1, first) = payload();
        let (_second_owner, _c2, second) = payload();
        let mut store = PayloadStore::new();
        let id = SourceId::next();
        store.insert(id, ClipboardKind::Regular, first);
        store.insert(id, ClipboardKind::Regular, second);
        assert_eq!(store.len(), 1);
        assert_eq!(Arc::strong_count(&first_owner), 1);
    }
}
