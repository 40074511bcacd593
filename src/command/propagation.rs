//! Fan-out of structural edits from a prototype to its instances.
//!
//! Every function here executes commands on the stack and recurses into the
//! instances of the node it just changed, so an edit made to a prototype lands
//! on every mirror of it, then on every mirror of those mirrors. Callers open
//! the batch and validate the request; these helpers do neither.

use crate::dom::{ContainerId, Document, NodeId};
use crate::property::ComponentSection;
use crate::registry::ComponentKind;

use super::commands::Command;
use super::stack::CommandStack;

/// Insert `node` into `dest`, then a fresh prototype-child mirror of it into
/// every instance of `dest` at the same index.
pub(super) fn insert_control(
    doc: &mut Document,
    stack: &mut CommandStack,
    node: NodeId,
    dest: ContainerId,
    index: usize,
) {
    stack.exec(doc, Command::insert_control(node, dest, index));

    let Some(parent) = dest.control() else {
        return;
    };
    let instances = doc.node(parent).instances().to_vec();
    if !instances.is_empty() {
        tracing::debug!(?node, instances = instances.len(), "propagating insert");
    }
    for instance in instances {
        let mirror = doc.create_from_prototype_child(node);
        let target = ContainerId::Control(instance);
        let index = index.min(doc.children(target).len());
        insert_control(doc, stack, mirror, target, index);
    }
}

/// Remove `node` from its parent, then every instance of it.
pub(super) fn remove_control(doc: &mut Document, stack: &mut CommandStack, node: NodeId) {
    let Some(from) = doc.parent(node) else {
        tracing::warn!(?node, "removing a detached control");
        return;
    };
    let index = doc.index_of(from, node).unwrap_or_default();
    stack.exec(doc, Command::remove_control(node, from, index));

    // Captured after the removal: the node itself is no longer listed anywhere.
    let instances = doc.node(node).instances().to_vec();
    for instance in instances {
        remove_control(doc, stack, instance);
    }
}

/// Move `node` into `dest` at `index`. Mirrors that already sit under the
/// matching destination instance move along with it and keep their overrides;
/// destination instances without one get a new mirror; source mirrors left
/// without a destination are removed.
///
/// Returns `false` if the node ended up detached.
pub(super) fn move_control(
    doc: &mut Document,
    stack: &mut CommandStack,
    node: NodeId,
    dest: ContainerId,
    index: usize,
) -> bool {
    let Some(src) = doc.parent(node) else {
        tracing::warn!(?node, "moving a detached control");
        return false;
    };
    let src_index = doc.index_of(src, node).unwrap_or_default();
    stack.exec(doc, Command::remove_control(node, src, src_index));

    let mut instances = doc.node(node).instances().to_vec();
    let mut moved = false;

    if is_container_in_hierarchy(doc, dest) {
        stack.exec(doc, Command::insert_control(node, dest, index));

        if let Some(parent) = dest.control() {
            for dest_instance in doc.node(parent).instances().to_vec() {
                let target = ContainerId::Control(dest_instance);
                let matching = instances
                    .iter()
                    .position(|&i| doc.has_same_parent_control(i, dest_instance));
                match matching {
                    Some(pos) => {
                        let src_instance = instances.remove(pos);
                        let index = index.min(doc.children(target).len());
                        move_control(doc, stack, src_instance, target, index);
                    }
                    None => {
                        let mirror = doc.create_from_prototype_child(node);
                        let index = index.min(doc.children(target).len());
                        insert_control(doc, stack, mirror, target, index);
                    }
                }
            }
        }
        moved = true;
    }

    if !instances.is_empty() {
        tracing::debug!(?node, leftover = instances.len(), "removing unmatched mirrors");
    }
    for instance in instances {
        remove_control(doc, stack, instance);
    }
    moved
}

/// Add component `kind` at `index` to `node`, inheriting from `prototype`'s
/// section when given, then to every instance of `node`.
///
/// A single component the node already carries is wired to the prototype
/// section instead of being added twice.
pub(super) fn add_component(
    doc: &mut Document,
    stack: &mut CommandStack,
    node: NodeId,
    kind: ComponentKind,
    index: u32,
    prototype: Option<NodeId>,
) {
    let existing = doc.node(node).properties().find_component(kind, index).is_some();
    if !kind.is_multiple() && existing {
        stack.exec(
            doc,
            Command::attach_component_prototype(node, kind, index, prototype),
        );
        return;
    }

    let registry = doc.registry_rc();
    let mut section = ComponentSection::created(&registry, kind, index);
    if let Some(p) = prototype {
        section = section.inheriting(p);
    }
    stack.exec(doc, Command::AddComponent { node, section });

    for instance in doc.node(node).instances().to_vec() {
        add_component(doc, stack, instance, kind, index, Some(node));
    }
}

/// Remove component `kind` at `index` from `node` and from every instance
/// inheriting it. An instance section that was attached to the removed one
/// is only detached: it existed before the prototype had it.
pub(super) fn remove_component(
    doc: &mut Document,
    stack: &mut CommandStack,
    node: NodeId,
    kind: ComponentKind,
    index: u32,
) {
    stack.exec(doc, Command::remove_component(node, kind, index));

    for instance in doc.node(node).instances().to_vec() {
        let Some(section) = doc.node(instance).properties().find_component(kind, index) else {
            continue;
        };
        if section.prototype() != Some(node) {
            continue;
        }
        if section.is_attached() {
            stack.exec(
                doc,
                Command::attach_component_prototype(instance, kind, index, None),
            );
        } else {
            remove_component(doc, stack, instance, kind, index);
        }
    }
}

/// Whether controls inserted into `container` become part of a package.
pub(super) fn is_container_in_hierarchy(doc: &Document, container: ContainerId) -> bool {
    match container {
        ContainerId::Control(id) => doc.is_in_hierarchy(id),
        ContainerId::Section(..) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::dom::{CreationKind, PackageSection};
    use crate::registry::{Registry, Value};
    use pretty_assertions::assert_eq;

    /// ```text
    /// Prototypes
    ///   Dialog
    ///   ├── Header
    ///   └── Body
    /// Controls
    ///   Dialog (instance)
    ///   Dialog (instance)
    /// ```
    struct Fixture {
        doc: Document,
        stack: CommandStack,
        dialog: NodeId,
        header: NodeId,
        body: NodeId,
        instances: [NodeId; 2],
    }

    impl Fixture {
        fn new() -> Self {
            let mut doc = Document::new(Rc::new(Registry::with_defaults()), "Main.yaml");
            let protos = ContainerId::Section(doc.root(), PackageSection::Prototypes);
            let controls = ContainerId::Section(doc.root(), PackageSection::Controls);
            let dialog = doc.create_from_class("UIControl", "Dialog").unwrap();
            let header = doc.create_from_class("UIControl", "Header").unwrap();
            let body = doc.create_from_class("UIControl", "Body").unwrap();
            doc.insert_control(dialog, protos, 0);
            doc.insert_control(header, ContainerId::Control(dialog), 0);
            doc.insert_control(body, ContainerId::Control(dialog), 1);
            let first = doc.create_from_prototype(dialog);
            let second = doc.create_from_prototype(dialog);
            doc.insert_control(first, controls, 0);
            doc.insert_control(second, controls, 1);
            Self {
                doc,
                stack: CommandStack::new(),
                dialog,
                header,
                body,
                instances: [first, second],
            }
        }

        fn names(&self, node: NodeId) -> Vec<String> {
            self.doc
                .node(node)
                .children()
                .iter()
                .map(|&c| self.doc.node(c).name().to_owned())
                .collect()
        }

        fn mirror(&self, instance: NodeId, path: &str) -> NodeId {
            self.doc
                .find_by_path(ContainerId::Control(instance), path)
                .unwrap()
        }
    }

    #[test]
    fn insert_reaches_every_instance() {
        let mut f = Fixture::new();
        let button = f.doc.create_from_class("UIControl", "ButtonA").unwrap();
        insert_control(&mut f.doc, &mut f.stack, button, ContainerId::Control(f.dialog), 1);

        for instance in f.instances {
            assert_eq!(f.names(instance), vec!["Header", "ButtonA", "Body"]);
            let mirror = f.mirror(instance, "ButtonA");
            let node = f.doc.node(mirror);
            assert_eq!(node.creation(), CreationKind::FromPrototypeChild);
            assert_eq!(node.prototype(), Some(button));
            assert!(!node.properties().has_changes());
        }
        assert_eq!(f.doc.node(button).instances().len(), 2);
    }

    #[test]
    fn remove_takes_mirrors_along() {
        let mut f = Fixture::new();
        remove_control(&mut f.doc, &mut f.stack, f.header);
        for instance in f.instances {
            assert_eq!(f.names(instance), vec!["Body"]);
        }
        assert!(f.doc.node(f.header).instances().is_empty());
    }

    #[test]
    fn move_within_prototype_keeps_mirror_overrides() {
        let mut f = Fixture::new();
        let mirror = f.mirror(f.instances[0], "Header");
        let path = f.doc.node(mirror).properties().find_path("angle").unwrap();
        f.doc.set_local_value(mirror, path, Some(Value::Float(15.0)));

        assert!(move_control(
            &mut f.doc,
            &mut f.stack,
            f.header,
            ContainerId::Control(f.body),
            0
        ));

        let moved = f.mirror(f.instances[0], "Body/Header");
        assert_eq!(moved, mirror);
        assert_eq!(f.doc.effective_value(moved, path), Some(Value::Float(15.0)));
        assert_eq!(f.names(f.instances[1]), vec!["Body"]);
        assert!(f.doc.find_by_path(ContainerId::Control(f.instances[1]), "Body/Header").is_some());
    }

    #[test]
    fn move_out_of_prototype_removes_mirrors() {
        let mut f = Fixture::new();
        let controls = ContainerId::Section(f.doc.root(), PackageSection::Controls);
        assert!(move_control(&mut f.doc, &mut f.stack, f.header, controls, 0));
        for instance in f.instances {
            assert_eq!(f.names(instance), vec!["Body"]);
        }
        assert_eq!(f.doc.parent(f.header), Some(controls));
    }

    #[test]
    fn component_add_and_remove_fan_out() {
        let mut f = Fixture::new();
        add_component(&mut f.doc, &mut f.stack, f.dialog, ComponentKind::Action, 0, None);
        for instance in f.instances {
            let section = f
                .doc
                .node(instance)
                .properties()
                .find_component(ComponentKind::Action, 0)
                .unwrap();
            assert_eq!(section.prototype(), Some(f.dialog));
        }

        remove_component(&mut f.doc, &mut f.stack, f.dialog, ComponentKind::Action, 0);
        for instance in f.instances {
            assert_eq!(
                f.doc.node(instance).properties().component_count(ComponentKind::Action),
                0
            );
        }
    }

    #[test]
    fn existing_single_component_is_attached_then_detached() {
        let mut f = Fixture::new();
        let instance = f.instances[0];
        add_component(&mut f.doc, &mut f.stack, instance, ComponentKind::Anchor, 0, None);
        add_component(&mut f.doc, &mut f.stack, f.dialog, ComponentKind::Anchor, 0, None);

        let section = f
            .doc
            .node(instance)
            .properties()
            .find_component(ComponentKind::Anchor, 0)
            .unwrap();
        assert!(section.is_attached());
        assert_eq!(section.prototype(), Some(f.dialog));

        remove_component(&mut f.doc, &mut f.stack, f.dialog, ComponentKind::Anchor, 0);
        let section = f
            .doc
            .node(instance)
            .properties()
            .find_component(ComponentKind::Anchor, 0)
            .unwrap();
        assert!(!section.is_attached());
        assert_eq!(section.prototype(), None);
        assert!(section.can_remove());
    }
}
