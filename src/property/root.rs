//! The property tree root of a control node.

use std::rc::Rc;

use crate::registry::{ComponentKind, Registry};

use super::section::{ComponentSection, ControlSection};
use super::value_property::ValueProperty;

/// Address of a value property inside a [`RootProperty`].
///
/// Paths are identical between a prototype and every node derived from it,
/// which is how inherited values are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    Name,
    CustomClass,
    Control { section: usize, index: usize },
    Component { kind: ComponentKind, index: u32, field: usize },
}

/// Traversal callbacks used by [`RootProperty::accept`].
pub trait PropertyVisitor {
    fn visit_value_property(&mut self, path: PropertyPath, property: &ValueProperty);

    fn visit_control_section(&mut self, _section: &ControlSection) {}

    fn visit_component_section(&mut self, _section: &ComponentSection) {}
}

/// All properties of one control: name, custom class, one section per class in
/// the class chain, and the component sections.
#[derive(Debug, Clone, PartialEq)]
pub struct RootProperty {
    name: ValueProperty,
    custom_class: ValueProperty,
    sections: Vec<ControlSection>,
    components: Vec<ComponentSection>,
}

impl RootProperty {
    pub(crate) fn new(registry: &Registry, class_name: &str) -> Self {
        Self {
            name: ValueProperty::new(Rc::clone(registry.name_descriptor())),
            custom_class: ValueProperty::new(Rc::clone(registry.custom_class_descriptor())),
            sections: registry
                .class_sections(class_name)
                .into_iter()
                .map(ControlSection::new)
                .collect(),
            components: Vec::new(),
        }
    }

    pub(crate) fn mark_name_read_only(&mut self) {
        self.name = self.name.clone().read_only();
    }

    pub fn name_property(&self) -> &ValueProperty {
        &self.name
    }

    pub fn custom_class_property(&self) -> &ValueProperty {
        &self.custom_class
    }

    pub fn sections(&self) -> &[ControlSection] {
        &self.sections
    }

    /// Component sections, ordered by kind and then index.
    pub fn components(&self) -> &[ComponentSection] {
        &self.components
    }

    pub fn get(&self, path: PropertyPath) -> Option<&ValueProperty> {
        match path {
            PropertyPath::Name => Some(&self.name),
            PropertyPath::CustomClass => Some(&self.custom_class),
            PropertyPath::Control { section, index } => {
                self.sections.get(section)?.properties().get(index)
            }
            PropertyPath::Component { kind, index, field } => {
                self.find_component(kind, index)?.properties().get(field)
            }
        }
    }

    pub(crate) fn get_mut(&mut self, path: PropertyPath) -> Option<&mut ValueProperty> {
        match path {
            PropertyPath::Name => Some(&mut self.name),
            PropertyPath::CustomClass => Some(&mut self.custom_class),
            PropertyPath::Control { section, index } => {
                self.sections.get_mut(section)?.properties_mut().get_mut(index)
            }
            PropertyPath::Component { kind, index, field } => {
                let pos = self.component_position(kind, index)?;
                self.components[pos].properties_mut().get_mut(field)
            }
        }
    }

    /// Path of the control-section property called `name`.
    pub fn find_control_property(&self, name: &str) -> Option<PropertyPath> {
        self.sections.iter().enumerate().find_map(|(section, s)| {
            s.find(name)
                .map(|index| PropertyPath::Control { section, index })
        })
    }

    /// Path of field `name` of component (`kind`, `index`).
    pub fn find_component_property(
        &self,
        kind: ComponentKind,
        index: u32,
        name: &str,
    ) -> Option<PropertyPath> {
        let field = self.find_component(kind, index)?.find(name)?;
        Some(PropertyPath::Component { kind, index, field })
    }

    /// Resolve a human readable path: `name`, `customClass`, a control property
    /// name, or `Component.field` / `Component[index].field`.
    pub fn find_path(&self, path: &str) -> Option<PropertyPath> {
        match path {
            "name" => return Some(PropertyPath::Name),
            "customClass" => return Some(PropertyPath::CustomClass),
            _ => {}
        }
        let Some((component, field)) = path.split_once('.') else {
            return self.find_control_property(path);
        };
        let (kind, index) = match component.split_once('[') {
            Some((kind, rest)) => (kind, rest.strip_suffix(']')?.parse().ok()?),
            None => (component, 0),
        };
        self.find_component_property(ComponentKind::from_name(kind)?, index, field)
    }

    pub fn find_component(&self, kind: ComponentKind, index: u32) -> Option<&ComponentSection> {
        self.component_position(kind, index)
            .map(|pos| &self.components[pos])
    }

    pub(crate) fn find_component_mut(
        &mut self,
        kind: ComponentKind,
        index: u32,
    ) -> Option<&mut ComponentSection> {
        let pos = self.component_position(kind, index)?;
        Some(&mut self.components[pos])
    }

    fn component_position(&self, kind: ComponentKind, index: u32) -> Option<usize> {
        self.components
            .iter()
            .position(|c| c.kind() == kind && c.index() == index)
    }

    pub fn component_count(&self, kind: ComponentKind) -> u32 {
        self.components.iter().filter(|c| c.kind() == kind).count() as u32
    }

    /// Whether a component of `kind` may be added at all (ignores read-only state).
    pub fn can_add_component(&self, kind: ComponentKind) -> bool {
        kind.is_multiple() || self.component_count(kind) == 0
    }

    pub fn can_remove_component(&self, kind: ComponentKind, index: u32) -> bool {
        self.find_component(kind, index)
            .is_some_and(ComponentSection::can_remove)
    }

    /// Insert a section, shifting later sections of the same multiple kind up.
    ///
    /// # Panics
    ///
    /// Panics if a single component of that kind already exists.
    pub(crate) fn insert_component(&mut self, mut section: ComponentSection) {
        let kind = section.kind();
        if kind.is_multiple() {
            let index = section.index().min(self.component_count(kind));
            section.set_index(index);
            for existing in self.components.iter_mut() {
                if existing.kind() == kind && existing.index() >= index {
                    existing.set_index(existing.index() + 1);
                }
            }
        } else {
            assert!(
                self.component_count(kind) == 0,
                "component {kind} already present"
            );
        }
        let pos = self
            .components
            .iter()
            .position(|c| (c.kind(), c.index()) > (kind, section.index()))
            .unwrap_or(self.components.len());
        self.components.insert(pos, section);
    }

    /// Remove a section, shifting later sections of the same multiple kind down.
    ///
    /// # Panics
    ///
    /// Panics if the section does not exist.
    pub(crate) fn remove_component(&mut self, kind: ComponentKind, index: u32) -> ComponentSection {
        let pos = self
            .component_position(kind, index)
            .unwrap_or_else(|| panic!("component {kind} #{index} not present"));
        let section = self.components.remove(pos);
        if kind.is_multiple() {
            for existing in self.components.iter_mut() {
                if existing.kind() == kind && existing.index() > index {
                    existing.set_index(existing.index() - 1);
                }
            }
        }
        section
    }

    /// Whether anything on this control differs from what it inherits.
    pub fn has_changes(&self) -> bool {
        self.custom_class.is_overridden_locally()
            || self
                .sections
                .iter()
                .flat_map(ControlSection::properties)
                .any(ValueProperty::is_overridden_locally)
            || self.components.iter().any(ComponentSection::has_changes)
    }

    /// Every value property path, in traversal order.
    pub fn paths(&self) -> Vec<PropertyPath> {
        let mut paths = vec![PropertyPath::Name, PropertyPath::CustomClass];
        for (section, s) in self.sections.iter().enumerate() {
            paths.extend((0..s.properties().len()).map(|index| PropertyPath::Control { section, index }));
        }
        for c in &self.components {
            paths.extend((0..c.properties().len()).map(|field| PropertyPath::Component {
                kind: c.kind(),
                index: c.index(),
                field,
            }));
        }
        paths
    }

    /// Paths of properties a style rule can set, with their style index.
    ///
    /// Component-targeted style properties only reach the component at index 0.
    pub fn style_paths(&self) -> Vec<(PropertyPath, usize)> {
        self.paths()
            .into_iter()
            .filter(|path| !matches!(path, PropertyPath::Component { index, .. } if *index != 0))
            .filter_map(|path| Some((path, self.get(path)?.style_index()?)))
            .collect()
    }

    pub fn accept(&self, visitor: &mut dyn PropertyVisitor) {
        visitor.visit_value_property(PropertyPath::Name, &self.name);
        visitor.visit_value_property(PropertyPath::CustomClass, &self.custom_class);
        for (section, s) in self.sections.iter().enumerate() {
            visitor.visit_control_section(s);
            for (index, prop) in s.properties().iter().enumerate() {
                visitor.visit_value_property(PropertyPath::Control { section, index }, prop);
            }
        }
        for c in &self.components {
            visitor.visit_component_section(c);
            for (field, prop) in c.properties().iter().enumerate() {
                let path = PropertyPath::Component {
                    kind: c.kind(),
                    index: c.index(),
                    field,
                };
                visitor.visit_value_property(path, prop);
            }
        }
    }
}
