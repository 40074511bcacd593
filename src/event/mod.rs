//! Change publication: documents collect a [`ChangeSet`] while a batch runs and
//! hand it to every subscribed [`PackageListener`] once the outermost batch ends.

pub mod change;

pub use change::{Change, ChangeSet};

use crate::dom::Document;

/// Observer of a document. Listeners read the document; they never mutate it.
pub trait PackageListener {
    fn changes_published(&mut self, document: &Document, changes: &ChangeSet);
}

/// Handle returned by [`Document::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct Listeners {
    entries: Vec<(ListenerId, Box<dyn PackageListener>)>,
    next_id: u64,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl Document {
    pub fn subscribe(&mut self, listener: Box<dyn PackageListener>) -> ListenerId {
        let id = ListenerId(self.listeners.next_id);
        self.listeners.next_id += 1;
        self.listeners.entries.push((id, listener));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.entries.len();
        self.listeners.entries.retain(|(i, _)| *i != id);
        self.listeners.entries.len() != before
    }

    /// Changes recorded since the last publication.
    pub fn pending_changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Deliver pending changes to listeners. Does nothing inside a batch.
    pub(crate) fn publish(&mut self) {
        if !self.can_update_all() || self.changes.is_empty() {
            return;
        }
        let changes = self.changes.take();
        tracing::debug!(count = changes.len(), "publishing changes");
        let mut entries = std::mem::take(&mut self.listeners.entries);
        for (_, listener) in entries.iter_mut() {
            listener.changes_published(self, &changes);
        }
        // Listeners only see `&Document`; the list cannot change during delivery.
        self.listeners.entries = entries;
    }

    /// Drop pending changes without publishing them.
    pub(crate) fn discard_changes(&mut self) {
        self.changes = ChangeSet::new();
    }
}
