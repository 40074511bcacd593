//! Node construction, instance registration and garbage collection.

use std::collections::HashSet;
use std::rc::Rc;

use super::node::{ContainerId, ControlNode, CreationKind, NodeId, PackageId, StyleSheetId};
use super::tree::Document;
use crate::error::EditError;
use crate::property::{ComponentSection, PropertyPath, RootProperty};
use crate::registry::Value;

impl Document {
    /// Create a detached control of class `class`.
    pub fn create_from_class(&mut self, class: &str, name: &str) -> Result<NodeId, EditError> {
        let registry = Rc::clone(&self.registry);
        let descriptor = registry
            .class(class)
            .ok_or_else(|| EditError::UnknownClass(class.to_owned()))?;

        let mut properties = RootProperty::new(&registry, class);
        if let Some(prop) = properties.get_mut(PropertyPath::Name) {
            prop.set_local(Some(Value::from(name)));
        }
        for &kind in &descriptor.default_components {
            properties.insert_component(ComponentSection::intrinsic(&registry, kind));
        }

        let id = self
            .nodes
            .insert(ControlNode::new(class, CreationKind::FromClass, properties, None));
        self.refresh_node_properties(id);
        Ok(id)
    }

    /// Create a detached instance of `prototype`, with a mirror for every
    /// child of the prototype.
    pub fn create_from_prototype(&mut self, prototype: NodeId) -> NodeId {
        let name = self.nodes[prototype].name().to_owned();
        let id = self.derive_node(prototype, CreationKind::FromPrototype);
        if let Some(prop) = self.nodes[id].properties.get_mut(PropertyPath::Name) {
            prop.set_local(Some(Value::from(name)));
        }
        self.refresh_subtree_properties(id);
        id
    }

    /// Create a detached mirror of `source` (a child of some prototype).
    pub fn create_from_prototype_child(&mut self, source: NodeId) -> NodeId {
        let id = self.derive_node(source, CreationKind::FromPrototypeChild);
        self.refresh_subtree_properties(id);
        id
    }

    fn derive_node(&mut self, source: NodeId, creation: CreationKind) -> NodeId {
        let registry = Rc::clone(&self.registry);
        let src = &self.nodes[source];
        let class = src.class_name().to_owned();

        let mut properties = RootProperty::new(&registry, &class);
        if creation == CreationKind::FromPrototypeChild {
            properties.mark_name_read_only();
        }
        for section in src.properties.components() {
            properties.insert_component(ComponentSection::mirror_of(&registry, section, source));
        }
        let children = src.children.clone();

        let id = self
            .nodes
            .insert(ControlNode::new(&class, creation, properties, Some(source)));
        self.nodes[source].instances.push(id);

        for child in children {
            let mirror = self.derive_node(child, CreationKind::FromPrototypeChild);
            self.add(ContainerId::Control(id), mirror);
        }
        id
    }

    /// Deep copy of `source`: same creation kind, prototype links and local
    /// overrides. The copy is detached.
    pub fn clone_node(&mut self, source: NodeId) -> NodeId {
        let id = self.clone_subtree(source);
        self.refresh_node_properties(id);
        id
    }

    fn clone_subtree(&mut self, source: NodeId) -> NodeId {
        let src = &self.nodes[source];
        let mut copy = src.clone();
        copy.children = Vec::new();
        copy.parent = None;
        copy.instances = Vec::new();
        copy.control.style_initialized = false;
        let children = src.children.clone();
        let prototype = src.prototype;

        let id = self.nodes.insert(copy);
        if let Some(p) = prototype {
            self.nodes[p].instances.push(id);
        }
        for child in children {
            let c = self.clone_subtree(child);
            self.add(ContainerId::Control(id), c);
        }
        id
    }

    /// Unregister the subtree from its prototypes' instance lists. Called when
    /// the subtree leaves the hierarchy.
    pub(crate) fn mark_removed(&mut self, node: NodeId) {
        for id in self.walk_depth_first(node) {
            if let Some(p) = self.nodes[id].prototype {
                if let Some(proto) = self.nodes.get_mut(p) {
                    proto.instances.retain(|&i| i != id);
                }
            }
            self.transitions.cancel_node(id);
            self.nodes[id].control.style_initialized = false;
        }
    }

    /// Re-register the subtree with its prototypes. Called when it (re)enters
    /// the hierarchy.
    pub(crate) fn mark_alive(&mut self, node: NodeId) {
        for id in self.walk_depth_first(node) {
            if let Some(p) = self.nodes[id].prototype {
                let instances = &mut self.nodes[p].instances;
                if !instances.contains(&id) {
                    instances.push(id);
                }
            }
        }
    }

    /// Free a detached subtree that was never part of the hierarchy.
    pub(crate) fn discard_node(&mut self, node: NodeId) {
        assert!(self.nodes[node].parent.is_none(), "discarding an attached node");
        self.mark_removed(node);
        for id in self.walk_depth_first(node) {
            self.nodes.remove(id);
        }
    }

    /// Free a style sheet that is not in any package.
    pub(crate) fn discard_style_sheet(&mut self, style: StyleSheetId) {
        assert!(
            self.style_sheets[style].package.is_none(),
            "discarding an attached style sheet"
        );
        self.style_sheets.remove(style);
    }

    /// Free the packages among `candidates` that no package imports, with
    /// their controls and style sheets. Freeing one can orphan another, so
    /// this repeats until nothing changes. The edited package is never freed.
    pub(crate) fn discard_unreferenced_packages(&mut self, candidates: &[PackageId]) {
        loop {
            let orphan = candidates.iter().copied().find(|&c| {
                c != self.root()
                    && self.packages.contains_key(c)
                    && !self.packages.values().any(|p| p.imported.contains(&c))
            });
            let Some(package) = orphan else {
                break;
            };
            for root in self.package_roots(package) {
                self.nodes[root].parent = None;
                self.discard_node(root);
            }
            if let Some(removed) = self.packages.remove(package) {
                for style in removed.style_sheets {
                    self.style_sheets.remove(style);
                }
                tracing::debug!(path = %removed.path, "discarded unused package");
            }
        }
    }

    /// Free every node that is neither in a package, nor reachable from
    /// `retained`, nor a prototype of a surviving node. Returns how many were freed.
    pub fn collect_garbage(&mut self, retained: &[NodeId]) -> usize {
        let mut live = HashSet::new();
        let mut stack: Vec<NodeId> = self
            .packages
            .keys()
            .flat_map(|p| self.package_roots(p))
            .chain(retained.iter().copied())
            .filter(|id| self.nodes.contains_key(*id))
            .collect();

        while let Some(id) = stack.pop() {
            if !live.insert(id) {
                continue;
            }
            let node = &self.nodes[id];
            stack.extend(node.children.iter().copied());
            stack.extend(node.prototype);
            stack.extend(node.properties.components().iter().filter_map(ComponentSection::prototype));
        }

        let dead: Vec<NodeId> = self.nodes.keys().filter(|id| !live.contains(id)).collect();
        for &id in &dead {
            self.nodes.remove(id);
            self.transitions.cancel_node(id);
        }
        for node in self.nodes.values_mut() {
            node.instances.retain(|i| live.contains(i));
        }
        if !dead.is_empty() {
            tracing::debug!(freed = dead.len(), "collected detached nodes");
        }
        dead.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PackageSection;
    use crate::registry::{ComponentKind, Registry};
    use pretty_assertions::assert_eq;

    fn doc() -> Document {
        Document::new(Rc::new(Registry::with_defaults()), "Main.yaml")
    }

    fn prototypes(doc: &Document) -> ContainerId {
        ContainerId::Section(doc.root(), PackageSection::Prototypes)
    }

    #[test]
    fn from_class_sets_name_and_intrinsic_components() {
        let mut doc = doc();
        let button = doc.create_from_class("UIButton", "Ok").unwrap();
        let node = doc.node(button);
        assert_eq!(node.name(), "Ok");
        assert_eq!(node.creation(), CreationKind::FromClass);
        let bg = node.properties().find_component(ComponentKind::Background, 0).unwrap();
        assert!(!bg.was_created());
        assert!(!node.properties().has_changes());
    }

    #[test]
    fn unknown_class_is_refused() {
        let mut doc = doc();
        assert_eq!(
            doc.create_from_class("UIWidget", "x"),
            Err(EditError::UnknownClass("UIWidget".into()))
        );
    }

    #[test]
    fn instance_mirrors_children() {
        let mut doc = doc();
        let dialog = doc.create_from_class("UIControl", "Dialog").unwrap();
        let title = doc.create_from_class("UIStaticText", "Title").unwrap();
        doc.add(ContainerId::Control(dialog), title);
        doc.add(prototypes(&doc), dialog);

        let instance = doc.create_from_prototype(dialog);
        let node = doc.node(instance);
        assert_eq!(node.creation(), CreationKind::FromPrototype);
        assert_eq!(node.prototype(), Some(dialog));
        assert_eq!(node.name(), "Dialog");
        assert_eq!(doc.node(dialog).instances(), &[instance]);

        let mirror = node.children()[0];
        assert_eq!(doc.node(mirror).creation(), CreationKind::FromPrototypeChild);
        assert_eq!(doc.node(mirror).name(), "Title");
        assert!(doc.node(mirror).properties().name_property().is_read_only());
        assert_eq!(doc.node(title).instances(), &[mirror]);
        assert_eq!(doc.find_by_path(ContainerId::Control(instance), "Title"), Some(mirror));
    }

    #[test]
    fn instance_inherits_component_sections() {
        let mut doc = doc();
        let proto = doc.create_from_class("UIButton", "Btn").unwrap();
        let instance = doc.create_from_prototype(proto);
        let section = doc
            .node(instance)
            .properties()
            .find_component(ComponentKind::Background, 0)
            .unwrap();
        assert_eq!(section.prototype(), Some(proto));
        assert!(!section.can_remove());
    }

    #[test]
    fn clone_keeps_overrides_and_links() {
        let mut doc = doc();
        let proto = doc.create_from_class("UIControl", "P").unwrap();
        let instance = doc.create_from_prototype(proto);
        let path = doc.node(instance).properties().find_path("angle").unwrap();
        doc.node_mut(instance)
            .properties
            .get_mut(path)
            .unwrap()
            .set_local(Some(Value::Float(30.0)));

        let copy = doc.clone_node(instance);
        let node = doc.node(copy);
        assert_eq!(node.prototype(), Some(proto));
        assert_eq!(node.properties().get(path).unwrap().value(), &Value::Float(30.0));
        assert_eq!(doc.node(proto).instances(), &[instance, copy]);
    }

    #[test]
    fn mark_removed_and_alive() {
        let mut doc = doc();
        let proto = doc.create_from_class("UIControl", "P").unwrap();
        let instance = doc.create_from_prototype(proto);
        doc.mark_removed(instance);
        assert!(doc.node(proto).instances().is_empty());
        doc.mark_alive(instance);
        doc.mark_alive(instance);
        assert_eq!(doc.node(proto).instances(), &[instance]);
    }

    #[test]
    fn garbage_collection_keeps_retained_and_prototypes() {
        let mut doc = doc();
        let proto = doc.create_from_class("UIControl", "P").unwrap();
        let instance = doc.create_from_prototype(proto);
        let orphan = doc.create_from_class("UIControl", "Orphan").unwrap();

        let freed = doc.collect_garbage(&[instance]);
        assert_eq!(freed, 1);
        assert!(!doc.contains(orphan));
        assert!(doc.contains(proto));

        assert_eq!(doc.collect_garbage(&[]), 2);
        assert_eq!(doc.node_count(), 0);
    }
}
