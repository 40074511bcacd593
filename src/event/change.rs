//! Structured change records.

use std::collections::HashSet;

use crate::dom::{ContainerId, NodeId, PackageId, StyleSheetId};
use crate::property::PropertyPath;
use crate::registry::ComponentKind;

/// One observable change to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    ControlInserted {
        node: NodeId,
        parent: ContainerId,
        index: usize,
    },
    ControlRemoved {
        node: NodeId,
        parent: ContainerId,
    },
    PropertyChanged {
        node: NodeId,
        path: PropertyPath,
    },
    ComponentAdded {
        node: NodeId,
        kind: ComponentKind,
        index: u32,
    },
    ComponentRemoved {
        node: NodeId,
        kind: ComponentKind,
        index: u32,
    },
    StyleInserted {
        style: StyleSheetId,
        package: PackageId,
        index: usize,
    },
    StyleRemoved {
        style: StyleSheetId,
        package: PackageId,
    },
    StyleChanged {
        style: StyleSheetId,
    },
    ImportedPackageInserted {
        package: PackageId,
        imported: PackageId,
        index: usize,
    },
    ImportedPackageRemoved {
        package: PackageId,
        imported: PackageId,
    },
    StyleSheetsRebuilt {
        package: PackageId,
    },
}

impl Change {
    /// Changes that describe state rather than an event collapse to one entry.
    fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Change::PropertyChanged { .. }
                | Change::StyleChanged { .. }
                | Change::StyleSheetsRebuilt { .. }
        )
    }
}

/// The ordered changes of one batch.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
    seen: HashSet<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        if change.is_idempotent() && !self.seen.insert(change) {
            return;
        }
        self.changes.push(change);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn contains(&self, change: &Change) -> bool {
        self.changes.contains(change)
    }

    /// Nodes with at least one changed property, in first-change order.
    pub fn changed_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for change in &self.changes {
            if let Change::PropertyChanged { node, .. } = change {
                if !nodes.contains(node) {
                    nodes.push(*node);
                }
            }
        }
        nodes
    }

    pub(crate) fn take(&mut self) -> ChangeSet {
        std::mem::take(self)
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
