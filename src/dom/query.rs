//! Tree queries and the structural policy checks edits are validated against.

use super::node::{ContainerId, CreationKind, NodeId, PackageId, PackageSection};
use super::package::package_name;
use super::tree::Document;

impl Document {
    // ── lookup ──────────────────────────────────────────────────────────

    /// Direct child of `container` called `name`.
    pub fn find_by_name(&self, container: ContainerId, name: &str) -> Option<NodeId> {
        self.children(container)
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name() == name)
    }

    /// Descendant of `container` at a `/` separated name path (`Body/Ok`).
    pub fn find_by_path(&self, container: ContainerId, path: &str) -> Option<NodeId> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut current = self.find_by_name(container, segments.next()?)?;
        for segment in segments {
            current = self.find_by_name(ContainerId::Control(current), segment)?;
        }
        Some(current)
    }

    /// Find a root control of `package` by name, prototypes first.
    pub fn find_package_control(&self, package: PackageId, name: &str) -> Option<NodeId> {
        self.find_by_name(ContainerId::Section(package, PackageSection::Prototypes), name)
            .or_else(|| {
                self.find_by_name(ContainerId::Section(package, PackageSection::Controls), name)
            })
    }

    /// For a prototype child, its name path below the nearest ancestor that is
    /// not itself a prototype child. `None` for other nodes.
    pub fn path_to_prototype_child(&self, node: NodeId) -> Option<String> {
        if self.nodes[node].creation != CreationKind::FromPrototypeChild {
            return None;
        }
        let mut names = vec![self.nodes[node].name().to_owned()];
        let mut current = node;
        while let Some(parent) = self.parent_control(current) {
            if self.nodes[parent].creation != CreationKind::FromPrototypeChild {
                break;
            }
            names.push(self.nodes[parent].name().to_owned());
            current = parent;
        }
        names.reverse();
        Some(names.join("/"))
    }

    // ── policy ──────────────────────────────────────────────────────────

    /// Controls in read-only (imported) packages cannot be edited.
    pub fn is_read_only(&self, node: NodeId) -> bool {
        self.package_of(node)
            .is_some_and(|p| self.packages[p].read_only)
    }

    pub fn is_container_read_only(&self, container: ContainerId) -> bool {
        match container {
            ContainerId::Control(id) => self.is_read_only(id),
            ContainerId::Section(package, _) => self.packages[package].read_only,
        }
    }

    /// Prototype children only go away with their prototype counterpart.
    pub fn can_remove(&self, node: NodeId) -> bool {
        !self.is_read_only(node)
            && self.nodes[node].parent.is_some()
            && self.nodes[node].creation != CreationKind::FromPrototypeChild
    }

    pub fn can_copy(&self, node: NodeId) -> bool {
        self.nodes[node].creation != CreationKind::FromPrototypeChild
    }

    /// Whether `node` may be inserted into `dest` without making the
    /// prototype graph cyclic.
    pub fn can_insert_control(&self, node: NodeId, dest: ContainerId) -> bool {
        if self.is_container_read_only(dest) {
            return false;
        }
        match dest {
            ContainerId::Control(parent) => {
                self.nodes[parent].creation != CreationKind::FromPrototypeChild
                    && parent != node
                    && !self.ancestors(parent).contains(&node)
                    && !self.is_instanced_from(node, parent)
            }
            ContainerId::Section(..) => true,
        }
    }

    /// Whether `node` may be moved from where it is into `dest`.
    pub fn can_move_to(&self, node: NodeId, dest: ContainerId) -> bool {
        self.can_remove(node) && self.can_insert_control(node, dest)
    }

    /// Whether some node in the subtree of `node` is derived (transitively)
    /// from `target` or from one of `target`'s control ancestors.
    pub fn is_instanced_from(&self, node: NodeId, target: NodeId) -> bool {
        let mut guarded = self.ancestors(target);
        guarded.push(target);
        self.walk_depth_first(node).into_iter().any(|id| {
            let mut proto = self.nodes[id].prototype;
            while let Some(p) = proto {
                if guarded.contains(&p) || self.is_instanced_from(p, target) {
                    return true;
                }
                proto = self.nodes[p].prototype;
            }
            false
        })
    }

    /// Whether the subtree of `node` needs something defined in `package`: a
    /// prototype living there, or a style class only that package's rules use.
    pub fn is_depends_on_package(&self, node: NodeId, package: PackageId) -> bool {
        self.walk_depth_first(node).into_iter().any(|id| {
            let n = &self.nodes[id];
            let mut proto = n.prototype;
            while let Some(p) = proto {
                if self.package_of(p) == Some(package) {
                    return true;
                }
                proto = self.nodes[p].prototype;
            }
            n.control.classes.iter().any(|class| {
                self.style_packages_using(class).contains(&package)
            })
        })
    }

    fn style_packages_using(&self, class: &str) -> Vec<PackageId> {
        let owners: Vec<PackageId> = self
            .style_sheets
            .values()
            .filter(|s| s.mentions_class(class))
            .filter_map(|s| s.package)
            .collect();
        // A class defined by the edited package is always satisfied.
        if owners.contains(&self.root()) {
            return Vec::new();
        }
        owners
    }

    /// Whether some control ancestor-or-self of `a` is also an
    /// ancestor-or-self of `b`.
    pub fn has_same_parent_control(&self, a: NodeId, b: NodeId) -> bool {
        let mut chain_b = self.ancestors(b);
        chain_b.push(b);
        std::iter::once(a)
            .chain(self.ancestors(a))
            .any(|t| chain_b.contains(&t))
    }

    // ── packages ────────────────────────────────────────────────────────

    /// Direct import of `package` with path `path`.
    pub fn find_imported_package(&self, package: PackageId, path: &str) -> Option<PackageId> {
        self.packages[package]
            .imported
            .iter()
            .copied()
            .find(|&p| self.packages[p].path == path)
    }

    /// Whether `path` is imported by `package`, directly or through imports.
    pub fn find_package_in_imported_recursively(&self, package: PackageId, path: &str) -> bool {
        self.packages[package].imported.iter().any(|&p| {
            self.packages[p].path == path || self.find_package_in_imported_recursively(p, path)
        })
    }

    /// `candidate` can be imported by `package` unless it is the package
    /// itself, duplicates an import by path or name, or imports `package`.
    pub fn can_insert_imported_package(&self, package: PackageId, candidate: PackageId) -> bool {
        let target = &self.packages[package];
        let imported = &self.packages[candidate];
        if candidate == package || imported.path == target.path {
            return false;
        }
        let name = package_name(&imported.path);
        let duplicate = target.imported.iter().any(|&p| {
            p == candidate
                || self.packages[p].path == imported.path
                || package_name(&self.packages[p].path) == name
        });
        if duplicate {
            return false;
        }
        !self.find_package_in_imported_recursively(candidate, &target.path)
    }

    /// `package` plus every package that imports it, directly or not.
    pub fn packages_depending_on(&self, package: PackageId) -> Vec<PackageId> {
        let path = self.packages[package].path.clone();
        let mut result = vec![package];
        result.extend(
            self.packages
                .keys()
                .filter(|&p| p != package && self.find_package_in_imported_recursively(p, &path)),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;

    fn doc() -> Document {
        Document::new(Rc::new(Registry::with_defaults()), "Main.yaml")
    }

    fn controls(doc: &Document) -> ContainerId {
        ContainerId::Section(doc.root(), PackageSection::Controls)
    }

    fn prototypes(doc: &Document) -> ContainerId {
        ContainerId::Section(doc.root(), PackageSection::Prototypes)
    }

    /// ```text
    /// Prototypes
    ///   Dialog
    ///   └── Body
    ///       └── Ok
    /// Controls
    ///   Screen
    ///   └── Dialog (instance)
    /// ```
    fn build() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = doc();
        let dialog = doc.create_from_class("UIControl", "Dialog").unwrap();
        let body = doc.create_from_class("UIControl", "Body").unwrap();
        let ok = doc.create_from_class("UIButton", "Ok").unwrap();
        doc.add(ContainerId::Control(dialog), body);
        doc.add(ContainerId::Control(body), ok);
        doc.add(prototypes(&doc), dialog);

        let screen = doc.create_from_class("UIControl", "Screen").unwrap();
        doc.add(controls(&doc), screen);
        let instance = doc.create_from_prototype(dialog);
        doc.add(ContainerId::Control(screen), instance);
        (doc, dialog, screen, instance)
    }

    #[test]
    fn find_by_name_and_path() {
        let (doc, dialog, _, _) = build();
        let ok = doc.find_by_path(prototypes(&doc), "Dialog/Body/Ok").unwrap();
        assert_eq!(doc.node(ok).name(), "Ok");
        assert_eq!(doc.find_by_name(prototypes(&doc), "Dialog"), Some(dialog));
        assert_eq!(doc.find_by_path(prototypes(&doc), "Dialog/Nope"), None);
        assert!(doc.find_package_control(doc.root(), "Screen").is_some());
    }

    #[test]
    fn prototype_child_path() {
        let (doc, _, _, instance) = build();
        let body = doc.node(instance).children()[0];
        let ok = doc.node(body).children()[0];
        assert_eq!(doc.path_to_prototype_child(ok).as_deref(), Some("Body/Ok"));
        assert_eq!(doc.path_to_prototype_child(instance), None);
    }

    #[test]
    fn prototype_children_cannot_be_removed_or_copied() {
        let (doc, _, _, instance) = build();
        let body = doc.node(instance).children()[0];
        assert!(!doc.can_remove(body));
        assert!(!doc.can_copy(body));
        assert!(doc.can_remove(instance));
        assert!(!doc.can_insert_control(instance, ContainerId::Control(body)));
    }

    #[test]
    fn cyclic_insert_is_refused() {
        let (mut doc, dialog, _, _) = build();
        let body = doc.node(dialog).children()[0];
        let nested = doc.create_from_prototype(dialog);
        assert!(doc.is_instanced_from(nested, body));
        assert!(!doc.can_insert_control(nested, ContainerId::Control(body)));
        assert!(!doc.can_insert_control(dialog, ContainerId::Control(body)));
        assert!(doc.can_insert_control(nested, controls(&doc)));
    }

    #[test]
    fn same_parent_control() {
        let (doc, dialog, screen, instance) = build();
        let body = doc.node(instance).children()[0];
        assert!(doc.has_same_parent_control(body, instance));
        assert!(doc.has_same_parent_control(body, screen));
        assert!(!doc.has_same_parent_control(body, dialog));
    }

    #[test]
    fn read_only_package_controls() {
        let (mut doc, _, _, _) = build();
        let lib = doc.add_package("Lib.yaml", true);
        let button = doc.create_from_class("UIButton", "LibButton").unwrap();
        doc.add(ContainerId::Section(lib, PackageSection::Prototypes), button);
        assert!(doc.is_read_only(button));
        assert!(!doc.can_remove(button));
    }

    #[test]
    fn import_rules() {
        let mut doc = doc();
        let root = doc.root();
        let a = doc.add_package("a/Buttons.yaml", true);
        let b = doc.add_package("b/Buttons.yaml", true);
        let c = doc.add_package("Main.yaml", true);
        let d = doc.add_package("Deep.yaml", true);

        assert!(!doc.can_insert_imported_package(root, root));
        assert!(!doc.can_insert_imported_package(root, c));
        assert!(doc.can_insert_imported_package(root, a));
        doc.insert_imported_at(root, 0, a);
        assert!(!doc.can_insert_imported_package(root, b));
        assert!(!doc.can_insert_imported_package(root, a));

        doc.insert_imported_at(d, 0, c);
        assert!(!doc.can_insert_imported_package(root, d));
        assert_eq!(doc.find_imported_package(root, "a/Buttons.yaml"), Some(a));
        assert!(doc.find_package_in_imported_recursively(d, "Main.yaml"));
    }

    #[test]
    fn depends_on_package_through_prototype() {
        let (mut doc, _, screen, _) = build();
        let lib = doc.add_package("Lib.yaml", true);
        let button = doc.create_from_class("UIButton", "LibButton").unwrap();
        doc.add(ContainerId::Section(lib, PackageSection::Prototypes), button);
        assert!(!doc.is_depends_on_package(screen, lib));

        let instance = doc.create_from_prototype(button);
        doc.add(ContainerId::Control(screen), instance);
        assert!(doc.is_depends_on_package(screen, lib));
    }

    #[test]
    fn dependents_include_transitive_importers() {
        let mut doc = doc();
        let root = doc.root();
        let mid = doc.add_package("Mid.yaml", true);
        let leaf = doc.add_package("Leaf.yaml", true);
        doc.insert_imported_at(mid, 0, leaf);
        doc.insert_imported_at(root, 0, mid);
        let mut deps = doc.packages_depending_on(leaf);
        deps.sort();
        let mut expected = vec![leaf, mid, root];
        expected.sort();
        assert_eq!(deps, expected);
    }
}
