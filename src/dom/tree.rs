//! The document arena and container operations.

use std::rc::Rc;

use slotmap::SlotMap;

use super::node::{ContainerId, ControlNode, NodeId, PackageId, PackageSection, StyleSheetId};
use super::package::PackageNode;
use super::refresh::UpdateState;
use crate::css::cascade::Cascade;
use crate::css::stylesheet::StyleSheetNode;
use crate::css::transition::TransitionScheduler;
use crate::event::{ChangeSet, Listeners};
use crate::registry::Registry;

/// A document: the edited package plus every package it imports, in one arena.
///
/// All control nodes, packages and style rules live in slotmaps. Containers
/// own their children by id; parent links and prototype instance lists are
/// plain ids stored on the nodes. Nodes detached by an edit stay in the arena
/// so that undo can reinsert them; [`Document::collect_garbage`] frees the
/// ones nothing refers to any more.
#[derive(Debug)]
pub struct Document {
    pub(crate) registry: Rc<Registry>,
    pub(crate) nodes: SlotMap<NodeId, ControlNode>,
    pub(crate) packages: SlotMap<PackageId, PackageNode>,
    pub(crate) style_sheets: SlotMap<StyleSheetId, StyleSheetNode>,
    root: PackageId,
    pub(crate) cascade: Cascade,
    pub(crate) transitions: TransitionScheduler,
    pub(crate) animate_transitions: bool,
    pub(crate) update: UpdateState,
    pub(crate) changes: ChangeSet,
    pub(crate) listeners: Listeners,
}

impl Document {
    /// Create an empty document whose root package lives at `path`.
    pub fn new(registry: Rc<Registry>, path: impl Into<String>) -> Self {
        let mut packages = SlotMap::with_key();
        let root = packages.insert(PackageNode::new(path, false));
        Self {
            registry,
            nodes: SlotMap::with_key(),
            packages,
            style_sheets: SlotMap::with_key(),
            root,
            cascade: Cascade::default(),
            transitions: TransitionScheduler::new(),
            animate_transitions: true,
            update: UpdateState::default(),
            changes: ChangeSet::new(),
            listeners: Listeners::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_rc(&self) -> Rc<Registry> {
        Rc::clone(&self.registry)
    }

    /// The edited package.
    pub fn root(&self) -> PackageId {
        self.root
    }

    pub fn set_animate_transitions(&mut self, animate: bool) {
        self.animate_transitions = animate;
    }

    pub fn transitions(&self) -> &TransitionScheduler {
        &self.transitions
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// # Panics
    ///
    /// Panics if `id` is not in the arena.
    pub fn node(&self, id: NodeId) -> &ControlNode {
        &self.nodes[id]
    }

    pub fn try_node(&self, id: NodeId) -> Option<&ControlNode> {
        self.nodes.get(id)
    }

    #[cfg(test)]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ControlNode {
        &mut self.nodes[id]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of control nodes in the arena, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn package(&self, id: PackageId) -> &PackageNode {
        &self.packages[id]
    }

    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &PackageNode)> {
        self.packages.iter()
    }

    pub fn style_sheet(&self, id: StyleSheetId) -> &StyleSheetNode {
        &self.style_sheets[id]
    }

    pub(crate) fn add_package(&mut self, path: impl Into<String>, read_only: bool) -> PackageId {
        self.packages.insert(PackageNode::new(path, read_only))
    }

    pub(crate) fn set_root_path(&mut self, path: impl Into<String>) {
        self.packages[self.root].path = path.into();
    }

    /// Store a detached style rule in the arena.
    pub fn add_style_sheet(&mut self, sheet: StyleSheetNode) -> StyleSheetId {
        self.style_sheets.insert(sheet)
    }

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    pub fn children(&self, container: ContainerId) -> &[NodeId] {
        match container {
            ContainerId::Control(id) => &self.nodes[id].children,
            ContainerId::Section(package, PackageSection::Prototypes) => {
                &self.packages[package].prototypes
            }
            ContainerId::Section(package, PackageSection::Controls) => {
                &self.packages[package].controls
            }
        }
    }

    fn children_mut(&mut self, container: ContainerId) -> &mut Vec<NodeId> {
        match container {
            ContainerId::Control(id) => &mut self.nodes[id].children,
            ContainerId::Section(package, PackageSection::Prototypes) => {
                &mut self.packages[package].prototypes
            }
            ContainerId::Section(package, PackageSection::Controls) => {
                &mut self.packages[package].controls
            }
        }
    }

    /// Insert `node` into `container` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `node` already has a parent or `index` is past the end.
    pub(crate) fn insert_at_index(&mut self, container: ContainerId, index: usize, node: NodeId) {
        assert!(
            self.nodes[node].parent.is_none(),
            "node already has a parent"
        );
        let children = self.children_mut(container);
        assert!(index <= children.len(), "insert index out of range");
        children.insert(index, node);
        self.nodes[node].parent = Some(container);
    }

    /// Append `node` to `container`.
    pub(crate) fn add(&mut self, container: ContainerId, node: NodeId) {
        let index = self.children(container).len();
        self.insert_at_index(container, index, node);
    }

    /// Detach `node` from `container`. Returns the index it had.
    ///
    /// # Panics
    ///
    /// Panics if `container` is not the node's parent.
    pub(crate) fn remove_child(&mut self, container: ContainerId, node: NodeId) -> usize {
        assert_eq!(
            self.nodes[node].parent,
            Some(container),
            "node is not a child of this container"
        );
        let children = self.children_mut(container);
        let index = children
            .iter()
            .position(|&c| c == node)
            .unwrap_or_else(|| panic!("parent link without child entry"));
        children.remove(index);
        self.nodes[node].parent = None;
        index
    }

    pub fn index_of(&self, container: ContainerId, node: NodeId) -> Option<usize> {
        self.children(container).iter().position(|&c| c == node)
    }

    pub fn parent(&self, node: NodeId) -> Option<ContainerId> {
        self.nodes[node].parent
    }

    pub fn parent_control(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).and_then(ContainerId::control)
    }

    /// Control ancestors of `node`, nearest first, not including `node`.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent_control(current) {
            result.push(parent);
            current = parent;
        }
        result
    }

    /// The topmost control above `node` (or `node` itself).
    pub fn root_control(&self, node: NodeId) -> NodeId {
        self.ancestors(node).last().copied().unwrap_or(node)
    }

    /// The package whose section holds the root control of `node`.
    pub fn package_of(&self, node: NodeId) -> Option<PackageId> {
        match self.nodes[self.root_control(node)].parent {
            Some(ContainerId::Section(package, _)) => Some(package),
            _ => None,
        }
    }

    /// Whether `node` is attached to some package.
    pub fn is_in_hierarchy(&self, node: NodeId) -> bool {
        self.package_of(node).is_some()
    }

    /// Pre-order walk of the subtree rooted at `start`, including `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            result.push(id);
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children.iter().rev());
            }
        }
        result
    }

    /// Root controls of a package: prototypes first, then controls.
    pub fn package_roots(&self, package: PackageId) -> Vec<NodeId> {
        let p = &self.packages[package];
        p.prototypes.iter().chain(p.controls.iter()).copied().collect()
    }

    // -----------------------------------------------------------------------
    // Style sheet and import lists
    // -----------------------------------------------------------------------

    pub(crate) fn insert_style_sheet_at(&mut self, package: PackageId, index: usize, style: StyleSheetId) {
        assert!(
            self.style_sheets[style].package.is_none(),
            "style sheet already attached"
        );
        self.packages[package].style_sheets.insert(index, style);
        self.style_sheets[style].package = Some(package);
    }

    pub(crate) fn remove_style_sheet_from(&mut self, package: PackageId, style: StyleSheetId) -> usize {
        assert_eq!(
            self.style_sheets[style].package,
            Some(package),
            "style sheet is not in this package"
        );
        let list = &mut self.packages[package].style_sheets;
        let index = list
            .iter()
            .position(|&s| s == style)
            .unwrap_or_else(|| panic!("style sheet link without list entry"));
        list.remove(index);
        self.style_sheets[style].package = None;
        index
    }

    pub fn style_index_of(&self, package: PackageId, style: StyleSheetId) -> Option<usize> {
        self.packages[package].style_sheets.iter().position(|&s| s == style)
    }

    pub(crate) fn insert_imported_at(&mut self, package: PackageId, index: usize, imported: PackageId) {
        let list = &mut self.packages[package].imported;
        assert!(!list.contains(&imported), "package already imported");
        list.insert(index, imported);
    }

    pub(crate) fn remove_imported_from(&mut self, package: PackageId, imported: PackageId) -> usize {
        let list = &mut self.packages[package].imported;
        let index = list
            .iter()
            .position(|&p| p == imported)
            .unwrap_or_else(|| panic!("package is not imported here"));
        list.remove(index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a test tree:
    /// ```text
    /// Controls
    ///   root
    ///   ├── a
    ///   │   └── c
    ///   └── b
    /// ```
    fn build_tree() -> (Document, NodeId, NodeId, NodeId, NodeId) {
        let mut doc = Document::new(Rc::new(Registry::with_defaults()), "Main.yaml");
        let controls = ContainerId::Section(doc.root(), PackageSection::Controls);
        let root = doc.create_from_class("UIControl", "root").unwrap();
        let a = doc.create_from_class("UIControl", "a").unwrap();
        let b = doc.create_from_class("UIStaticText", "b").unwrap();
        let c = doc.create_from_class("UIButton", "c").unwrap();
        doc.add(controls, root);
        doc.add(ContainerId::Control(root), a);
        doc.add(ContainerId::Control(root), b);
        doc.add(ContainerId::Control(a), c);
        (doc, root, a, b, c)
    }

    #[test]
    fn insert_and_index() {
        let (doc, root, a, b, _) = build_tree();
        assert_eq!(doc.children(ContainerId::Control(root)), &[a, b]);
        assert_eq!(doc.index_of(ContainerId::Control(root), b), Some(1));
        assert_eq!(doc.parent_control(a), Some(root));
    }

    #[test]
    fn insert_at_front() {
        let (mut doc, root, a, b, _) = build_tree();
        let d = doc.create_from_class("UIControl", "d").unwrap();
        doc.insert_at_index(ContainerId::Control(root), 0, d);
        assert_eq!(doc.children(ContainerId::Control(root)), &[d, a, b]);
    }

    #[test]
    #[should_panic(expected = "already has a parent")]
    fn double_insert_panics() {
        let (mut doc, root, a, _, _) = build_tree();
        doc.add(ContainerId::Control(root), a);
    }

    #[test]
    #[should_panic(expected = "not a child of this container")]
    fn remove_from_wrong_parent_panics() {
        let (mut doc, _, a, b, _) = build_tree();
        doc.remove_child(ContainerId::Control(b), a);
    }

    #[test]
    fn remove_returns_index() {
        let (mut doc, root, a, b, _) = build_tree();
        assert_eq!(doc.remove_child(ContainerId::Control(root), b), 1);
        assert_eq!(doc.parent(b), None);
        assert_eq!(doc.children(ContainerId::Control(root)), &[a]);
    }

    #[test]
    fn walk_is_preorder() {
        let (doc, root, a, b, c) = build_tree();
        assert_eq!(doc.walk_depth_first(root), vec![root, a, c, b]);
    }

    #[test]
    fn ancestors_and_package() {
        let (doc, root, a, _, c) = build_tree();
        assert_eq!(doc.ancestors(c), vec![a, root]);
        assert_eq!(doc.root_control(c), root);
        assert_eq!(doc.package_of(c), Some(doc.root()));
    }

    #[test]
    fn detached_node_has_no_package() {
        let (mut doc, root, a, _, c) = build_tree();
        doc.remove_child(ContainerId::Control(root), a);
        assert_eq!(doc.package_of(c), None);
        assert!(!doc.is_in_hierarchy(c));
    }
}
