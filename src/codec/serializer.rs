//! Writing package text.

use serde_json::{Map, Value as Json};

use super::value;
use super::CURRENT_VERSION;
use crate::dom::{CreationKind, Document, NodeId, PackageId, StyleSheetId};
use crate::property::{ComponentSection, PropertyPath, PropertyVisitor, ValueProperty};
use crate::registry::{enums, Registry};

/// Writes a package, or a selection of controls and style sheets, as JSON.
///
/// Only what a node overrides is written: local property values, components
/// with changes, and the prototype children that differ from their prototype.
pub struct PackageSerializer<'d> {
    doc: &'d Document,
    version: u32,
    imported: Vec<PackageId>,
    styles: Vec<StyleSheetId>,
    prototypes: Vec<NodeId>,
    controls: Vec<NodeId>,
}

impl<'d> PackageSerializer<'d> {
    pub fn new(doc: &'d Document) -> Self {
        Self {
            doc,
            version: CURRENT_VERSION,
            imported: Vec::new(),
            styles: Vec::new(),
            prototypes: Vec::new(),
            controls: Vec::new(),
        }
    }

    /// Format version written in the header.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn serialize_package(mut self, package: PackageId) -> String {
        let p = self.doc.package(package);
        self.imported = p.imported_packages().to_vec();
        self.styles = p.style_sheets().to_vec();
        self.prototypes = p.prototypes().to_vec();
        self.controls = p.controls().to_vec();
        self.write()
    }

    /// Write `controls` and `styles` as clipboard text. The packages the
    /// controls need are listed as imports, the edited package included.
    pub fn serialize_selection(mut self, controls: &[NodeId], styles: &[StyleSheetId]) -> String {
        for &control in controls {
            if self.doc.can_copy(control) {
                self.collect_packages(control);
                self.controls.push(control);
            }
        }
        self.styles = styles.to_vec();
        self.write()
    }

    fn collect_packages(&mut self, node: NodeId) {
        let doc = self.doc;
        let n = doc.node(node);
        if n.creation() == CreationKind::FromPrototype {
            if let Some(package) = n.prototype().and_then(|p| doc.package_of(p)) {
                push_unique(&mut self.imported, package);
            }
        }
        if let Some(own) = doc.package_of(node) {
            for &imported in doc.package(own).imported_packages() {
                let styled_by = n.control().classes().iter().any(|class| {
                    doc.package(imported)
                        .style_sheets()
                        .iter()
                        .any(|&s| doc.style_sheet(s).mentions_class(class))
                });
                if styled_by {
                    push_unique(&mut self.imported, imported);
                }
            }
        }
        for &child in n.children() {
            self.collect_packages(child);
        }
    }

    fn write(&self) -> String {
        let doc = self.doc;
        let mut header = Map::new();
        header.insert("version".to_owned(), Json::from(self.version.to_string()));

        let mut root = Map::new();
        root.insert("Header".to_owned(), Json::Object(header));
        if !self.imported.is_empty() {
            let paths = self
                .imported
                .iter()
                .map(|&p| Json::from(doc.package(p).path()))
                .collect();
            root.insert("ImportedPackages".to_owned(), Json::Array(paths));
        }
        if !self.styles.is_empty() {
            let styles = self.styles.iter().map(|&s| self.write_style(s)).collect();
            root.insert("StyleSheets".to_owned(), Json::Array(styles));
        }
        if !self.prototypes.is_empty() {
            let prototypes = self.prototypes.iter().map(|&c| self.write_control(c)).collect();
            root.insert("Prototypes".to_owned(), Json::Array(prototypes));
        }
        if !self.controls.is_empty() {
            let controls = self.controls.iter().map(|&c| self.write_control(c)).collect();
            root.insert("Controls".to_owned(), Json::Array(controls));
        }
        format!("{:#}\n", Json::Object(root))
    }

    fn write_control(&self, node: NodeId) -> Json {
        let doc = self.doc;
        let n = doc.node(node);
        let mut map = Map::new();

        match n.creation() {
            CreationKind::FromPrototype => {
                if let Some(proto) = n.prototype() {
                    map.insert("prototype".to_owned(), Json::from(self.prototype_name(proto)));
                }
            }
            CreationKind::FromClass => {
                map.insert("class".to_owned(), Json::from(n.class_name()));
            }
            CreationKind::FromPrototypeChild => {}
        }
        if let Some(custom) = n.properties().custom_class_property().local_value() {
            if let Some(custom) = custom.as_str() {
                map.insert("customClass".to_owned(), Json::from(custom));
            }
        }
        match doc.path_to_prototype_child(node) {
            Some(path) => map.insert("path".to_owned(), Json::from(path)),
            None => map.insert("name".to_owned(), Json::from(n.name())),
        };

        let mut writer = PropertyWriter::new(doc.registry());
        n.properties().accept(&mut writer);
        writer.finish(&mut map);

        let children = self.children_to_write(node);
        if !children.is_empty() {
            let children = children.into_iter().map(|c| self.write_control(c)).collect();
            map.insert("children".to_owned(), Json::Array(children));
        }
        Json::Object(map)
    }

    /// `Package/Name` when the prototype comes from an import, `Name` otherwise.
    fn prototype_name(&self, prototype: NodeId) -> String {
        let name = self.doc.node(prototype).name();
        match self.doc.package_of(prototype) {
            Some(package) if self.imported.contains(&package) => {
                format!("{}/{}", self.doc.package(package).name(), name)
            }
            _ => name.to_owned(),
        }
    }

    /// Prototype children that carry changes come first, flattened and
    /// addressed by path; then the node's own children.
    fn children_to_write(&self, node: NodeId) -> Vec<NodeId> {
        let n = self.doc.node(node);
        let mut result = Vec::new();
        if n.creation() == CreationKind::FromPrototype {
            self.prototype_children_with_changes(node, &mut result);
        }
        result.extend(
            n.children()
                .iter()
                .copied()
                .filter(|&c| self.doc.node(c).creation() != CreationKind::FromPrototypeChild),
        );
        result
    }

    fn prototype_children_with_changes(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.doc.node(node).children() {
            let c = self.doc.node(child);
            if c.creation() != CreationKind::FromPrototypeChild {
                continue;
            }
            let has_own_children = c
                .children()
                .iter()
                .any(|&g| self.doc.node(g).creation() != CreationKind::FromPrototypeChild);
            if c.properties().has_changes() || has_own_children {
                out.push(child);
            }
            self.prototype_children_with_changes(child, out);
        }
    }

    fn write_style(&self, style: StyleSheetId) -> Json {
        let registry = self.doc.registry();
        let interpolation = registry.enum_map(enums::INTERPOLATION);
        let sheet = self.doc.style_sheet(style);

        let mut properties = Map::new();
        for property in sheet.properties() {
            let descriptor = registry.style_property(property.index);
            let value = value::encode(registry, descriptor.kind, &property.value);
            let entry = match property.transition {
                Some(transition) => {
                    let mut entry = Map::new();
                    entry.insert("value".to_owned(), value);
                    entry.insert("transitionTime".to_owned(), Json::from(transition.duration));
                    let function = interpolation
                        .to_name(transition.function.code())
                        .unwrap_or("LINEAR");
                    entry.insert("transitionFunction".to_owned(), Json::from(function));
                    Json::Object(entry)
                }
                None => value,
            };
            properties.insert(descriptor.name.to_owned(), entry);
        }

        let mut map = Map::new();
        map.insert("selector".to_owned(), Json::from(sheet.selector_text()));
        map.insert("properties".to_owned(), Json::Object(properties));
        Json::Object(map)
    }
}

fn push_unique(list: &mut Vec<PackageId>, package: PackageId) {
    if !list.contains(&package) {
        list.push(package);
    }
}

/// Collects the locally overridden values of one control.
struct PropertyWriter<'r> {
    registry: &'r Registry,
    properties: Map<String, Json>,
    components: Map<String, Json>,
    /// Serialized name and fields of the component being visited, if it is written.
    current: Option<(String, Map<String, Json>)>,
}

impl<'r> PropertyWriter<'r> {
    fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            properties: Map::new(),
            components: Map::new(),
            current: None,
        }
    }

    fn flush_component(&mut self) {
        if let Some((name, fields)) = self.current.take() {
            self.components.insert(name, Json::Object(fields));
        }
    }

    fn finish(mut self, map: &mut Map<String, Json>) {
        self.flush_component();
        map.extend(self.properties);
        if !self.components.is_empty() {
            map.insert("components".to_owned(), Json::Object(self.components));
        }
    }
}

impl PropertyVisitor for PropertyWriter<'_> {
    fn visit_value_property(&mut self, path: PropertyPath, property: &ValueProperty) {
        let Some(local) = property.local_value() else {
            return;
        };
        let json = value::encode(self.registry, property.kind(), local);
        match path {
            PropertyPath::Name | PropertyPath::CustomClass => {}
            PropertyPath::Control { .. } => {
                self.properties.insert(property.name().to_owned(), json);
            }
            PropertyPath::Component { .. } => {
                if let Some((_, fields)) = self.current.as_mut() {
                    fields.insert(property.name().to_owned(), json);
                }
            }
        }
    }

    fn visit_component_section(&mut self, section: &ComponentSection) {
        self.flush_component();
        if section.has_changes() {
            self.current = Some((section.serialized_name(), Map::new()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::css::parser::parse_selector_list;
    use crate::css::stylesheet::{StyleProperty, StyleSheetNode};
    use crate::css::transition::{Interpolation, TransitionSpec};
    use crate::dom::{ContainerId, PackageSection};
    use crate::registry::{Color, ComponentKind, Value};

    #[test]
    fn writes_only_overrides() {
        let mut doc = Document::new(Rc::new(Registry::with_defaults()), "Main.yaml");
        let root = doc.root();
        let protos = ContainerId::Section(root, PackageSection::Prototypes);
        let controls = ContainerId::Section(root, PackageSection::Controls);

        let dialog = doc.create_from_class("UIControl", "Dialog").unwrap();
        let title = doc.create_from_class("UIStaticText", "Title").unwrap();
        doc.insert_control(dialog, protos, 0);
        doc.insert_control(title, ContainerId::Control(dialog), 0);
        let registry = doc.registry_rc();
        doc.insert_component_section(
            dialog,
            ComponentSection::created(&registry, ComponentKind::Action, 0),
        );

        let instance = doc.create_from_prototype(dialog);
        doc.insert_control(instance, controls, 0);
        let mirror = doc
            .find_by_path(ContainerId::Control(instance), "Title")
            .unwrap();
        let text = doc.node(mirror).properties().find_path("text").unwrap();
        doc.set_local_value(mirror, text, Some(Value::from("Hello")));

        let style = doc.add_style_sheet(StyleSheetNode::new(
            parse_selector_list(".warning").unwrap(),
            vec![StyleProperty::new(6, Color::RED)
                .with_transition(TransitionSpec::new(0.3, Interpolation::EaseIn))],
        ));
        doc.insert_style(root, 0, style);

        insta::assert_snapshot!(PackageSerializer::new(&doc).serialize_package(root), @r###"
        {
          "Header": {
            "version": "5"
          },
          "StyleSheets": [
            {
              "selector": ".warning",
              "properties": {
                "textColor": {
                  "value": [
                    1.0,
                    0.0,
                    0.0,
                    1.0
                  ],
                  "transitionTime": 0.3,
                  "transitionFunction": "EASE_IN"
                }
              }
            }
          ],
          "Prototypes": [
            {
              "class": "UIControl",
              "name": "Dialog",
              "components": {
                "Action0": {}
              },
              "children": [
                {
                  "class": "UIStaticText",
                  "name": "Title"
                }
              ]
            }
          ],
          "Controls": [
            {
              "prototype": "Dialog",
              "name": "Dialog",
              "children": [
                {
                  "path": "Title",
                  "text": "Hello"
                }
              ]
            }
          ]
        }
        "###);
    }
}
