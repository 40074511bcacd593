//! Mutation primitives. Each one applies a single structural or value change,
//! records it in the pending change set and requests the refreshes it implies.
//! Commands are built from these; they perform no policy checks.

use super::node::{ContainerId, NodeId, PackageId, StyleSheetId};
use super::tree::Document;
use crate::css::model::Selector;
use crate::css::stylesheet::StyleProperty;
use crate::event::Change;
use crate::property::{ComponentSection, PropertyPath};
use crate::registry::{ComponentKind, Value};

impl Document {
    // ── controls ────────────────────────────────────────────────────────

    pub(crate) fn insert_control(&mut self, node: NodeId, dest: ContainerId, index: usize) {
        self.insert_at_index(dest, index, node);
        self.mark_alive(node);
        self.refresh_subtree_properties(node);
        self.changes.push(Change::ControlInserted {
            node,
            parent: dest,
            index,
        });
        self.request_styles_refresh(node);
    }

    /// Returns the index the node had.
    pub(crate) fn remove_control(&mut self, node: NodeId, from: ContainerId) -> usize {
        let index = self.remove_child(from, node);
        self.mark_removed(node);
        self.changes.push(Change::ControlRemoved { node, parent: from });
        index
    }

    // ── properties ──────────────────────────────────────────────────────

    /// Set or clear the local override of `path`. Returns the previous override.
    ///
    /// # Panics
    ///
    /// Panics if the node has no property at `path`.
    pub(crate) fn set_local_value(
        &mut self,
        node: NodeId,
        path: PropertyPath,
        value: Option<Value>,
    ) -> Option<Value> {
        let prop = self.nodes[node]
            .properties
            .get_mut(path)
            .unwrap_or_else(|| panic!("no property at {path:?}"));
        let old = prop.local_value().cloned();
        prop.set_local(value);
        self.refresh_property_in_instances(node, path);
        old
    }

    // ── components ──────────────────────────────────────────────────────

    pub(crate) fn insert_component_section(&mut self, node: NodeId, section: ComponentSection) {
        let (kind, index) = (section.kind(), section.index());
        self.nodes[node].properties.insert_component(section);
        self.after_component_change(node);
        self.changes.push(Change::ComponentAdded { node, kind, index });
    }

    pub(crate) fn remove_component_section(
        &mut self,
        node: NodeId,
        kind: ComponentKind,
        index: u32,
    ) -> ComponentSection {
        let section = self.nodes[node].properties.remove_component(kind, index);
        self.after_component_change(node);
        self.changes.push(Change::ComponentRemoved { node, kind, index });
        section
    }

    /// Rewire which prototype section a section inherits from. Returns the
    /// previous link.
    pub(crate) fn set_component_link(
        &mut self,
        node: NodeId,
        kind: ComponentKind,
        index: u32,
        prototype: Option<NodeId>,
        attached: bool,
    ) -> (Option<NodeId>, bool) {
        let section = self.nodes[node]
            .properties
            .find_component_mut(kind, index)
            .unwrap_or_else(|| panic!("component {kind} #{index} not present"));
        let old = (section.prototype(), section.is_attached());
        section.set_link(prototype, attached);
        for path in self.component_paths(node, kind, index) {
            self.refresh_property_in_instances(node, path);
        }
        self.request_styles_refresh(node);
        old
    }

    fn component_paths(&self, node: NodeId, kind: ComponentKind, index: u32) -> Vec<PropertyPath> {
        self.nodes[node]
            .properties
            .paths()
            .into_iter()
            .filter(|p| matches!(p, PropertyPath::Component { kind: k, index: i, .. } if *k == kind && *i == index))
            .collect()
    }

    fn after_component_change(&mut self, node: NodeId) {
        // Indices of multiple components may have shifted.
        self.transitions.cancel_node(node);
        self.refresh_node_properties(node);
        self.request_styles_refresh(node);
    }

    // ── style sheets ────────────────────────────────────────────────────

    pub(crate) fn insert_style(&mut self, package: PackageId, index: usize, style: StyleSheetId) {
        self.insert_style_sheet_at(package, index, style);
        self.changes.push(Change::StyleInserted {
            style,
            package,
            index,
        });
        self.request_package_refresh(package);
    }

    pub(crate) fn remove_style(&mut self, package: PackageId, style: StyleSheetId) -> usize {
        let index = self.remove_style_sheet_from(package, style);
        self.changes.push(Change::StyleRemoved { style, package });
        self.request_package_refresh(package);
        index
    }

    fn style_changed(&mut self, style: StyleSheetId) {
        self.changes.push(Change::StyleChanged { style });
        if let Some(package) = self.style_sheets[style].package {
            self.request_package_refresh(package);
        }
    }

    /// Insert or replace a property by style index. Returns the replaced one.
    pub(crate) fn set_style_property(
        &mut self,
        style: StyleSheetId,
        property: StyleProperty,
    ) -> Option<StyleProperty> {
        let old = self.style_sheets[style].set_property(property);
        self.style_changed(style);
        old
    }

    pub(crate) fn remove_style_property(
        &mut self,
        style: StyleSheetId,
        index: usize,
    ) -> Option<StyleProperty> {
        let old = self.style_sheets[style].remove_property(index);
        self.style_changed(style);
        old
    }

    pub(crate) fn insert_style_selector(&mut self, style: StyleSheetId, index: usize, selector: Selector) {
        self.style_sheets[style].insert_selector(index, selector);
        self.style_changed(style);
    }

    pub(crate) fn remove_style_selector(&mut self, style: StyleSheetId, index: usize) -> Selector {
        let selector = self.style_sheets[style].remove_selector(index);
        self.style_changed(style);
        selector
    }

    // ── imports ─────────────────────────────────────────────────────────

    pub(crate) fn insert_imported(&mut self, package: PackageId, index: usize, imported: PackageId) {
        self.insert_imported_at(package, index, imported);
        self.changes.push(Change::ImportedPackageInserted {
            package,
            imported,
            index,
        });
        self.request_package_refresh(package);
    }

    pub(crate) fn remove_imported(&mut self, package: PackageId, imported: PackageId) -> usize {
        let index = self.remove_imported_from(package, imported);
        self.changes.push(Change::ImportedPackageRemoved { package, imported });
        self.request_package_refresh(package);
        index
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::css::parser::parse_selector_list;
    use crate::css::stylesheet::StyleSheetNode;
    use crate::dom::PackageSection;
    use crate::registry::{Color, Registry};
    use pretty_assertions::assert_eq;

    fn doc() -> Document {
        Document::new(Rc::new(Registry::with_defaults()), "Main.yaml")
    }

    #[test]
    fn insert_and_remove_record_changes() {
        let mut doc = doc();
        let controls = ContainerId::Section(doc.root(), PackageSection::Controls);
        let node = doc.create_from_class("UIControl", "A").unwrap();
        doc.discard_changes();

        doc.insert_control(node, controls, 0);
        assert!(doc.pending_changes().contains(&Change::ControlInserted {
            node,
            parent: controls,
            index: 0
        }));
        assert!(doc.node(node).control().is_style_initialized());

        assert_eq!(doc.remove_control(node, controls), 0);
        assert!(!doc.node(node).control().is_style_initialized());
        assert!(doc.pending_changes().contains(&Change::ControlRemoved {
            node,
            parent: controls
        }));
    }

    #[test]
    fn reinserted_instance_sees_prototype_edits() {
        let mut doc = doc();
        let protos = ContainerId::Section(doc.root(), PackageSection::Prototypes);
        let controls = ContainerId::Section(doc.root(), PackageSection::Controls);
        let proto = doc.create_from_class("UIStaticText", "P").unwrap();
        doc.insert_control(proto, protos, 0);
        let instance = doc.create_from_prototype(proto);
        doc.insert_control(instance, controls, 0);
        doc.remove_control(instance, controls);

        let path = doc.node(proto).properties().find_path("text").unwrap();
        doc.set_local_value(proto, path, Some(Value::from("late")));
        assert_eq!(
            doc.node(instance).properties().get(path).unwrap().value(),
            &Value::from("")
        );
        doc.insert_control(instance, controls, 0);
        assert_eq!(
            doc.node(instance).properties().get(path).unwrap().value(),
            &Value::from("late")
        );
    }

    #[test]
    fn set_local_returns_previous() {
        let mut doc = doc();
        let node = doc.create_from_class("UIControl", "A").unwrap();
        let path = doc.node(node).properties().find_path("angle").unwrap();
        assert_eq!(doc.set_local_value(node, path, Some(Value::Float(5.0))), None);
        assert_eq!(
            doc.set_local_value(node, path, None),
            Some(Value::Float(5.0))
        );
        assert_eq!(doc.effective_value(node, path), Some(Value::Float(0.0)));
    }

    #[test]
    fn component_insert_and_remove() {
        let mut doc = doc();
        let registry = doc.registry_rc();
        let node = doc.create_from_class("UIControl", "A").unwrap();
        doc.insert_component_section(node, ComponentSection::created(&registry, ComponentKind::Action, 0));
        assert_eq!(doc.node(node).properties().component_count(ComponentKind::Action), 1);
        let removed = doc.remove_component_section(node, ComponentKind::Action, 0);
        assert!(removed.was_created());
        assert_eq!(doc.node(node).properties().component_count(ComponentKind::Action), 0);
    }

    #[test]
    fn style_edits_restyle_package() {
        let mut doc = doc();
        let root = doc.root();
        let controls = ContainerId::Section(root, PackageSection::Controls);
        let text = doc.create_from_class("UIStaticText", "T").unwrap();
        doc.insert_control(text, controls, 0);
        let idx = doc.registry().style_property_by_name("textColor").unwrap().index;
        let path = doc.node(text).properties().find_path("textColor").unwrap();

        let style = doc.add_style_sheet(StyleSheetNode::new(
            parse_selector_list("UIStaticText").unwrap(),
            Vec::new(),
        ));
        doc.insert_style(root, 0, style);
        doc.set_style_property(style, StyleProperty::new(idx, Color::GREEN));
        assert_eq!(doc.effective_value(text, path), Some(Value::Color(Color::GREEN)));

        doc.remove_style_property(style, idx);
        assert_eq!(doc.effective_value(text, path), Some(Value::Color(Color::WHITE)));

        doc.set_style_property(style, StyleProperty::new(idx, Color::GREEN));
        let selector = doc.remove_style_selector(style, 0);
        assert_eq!(doc.effective_value(text, path), Some(Value::Color(Color::WHITE)));
        doc.insert_style_selector(style, 0, selector);
        assert_eq!(doc.effective_value(text, path), Some(Value::Color(Color::GREEN)));

        assert_eq!(doc.remove_style(root, style), 0);
        assert_eq!(doc.effective_value(text, path), Some(Value::Color(Color::WHITE)));
    }
}
