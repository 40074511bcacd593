//! Control property sections and component sections.

use std::rc::Rc;

use crate::dom::NodeId;
use crate::registry::{ComponentKind, Registry, SectionDescriptor};

use super::value_property::ValueProperty;

/// The properties one control class contributes (e.g. the `UIStaticText` part
/// of a static text control).
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSection {
    descriptor: Rc<SectionDescriptor>,
    properties: Vec<ValueProperty>,
}

impl ControlSection {
    pub(crate) fn new(descriptor: Rc<SectionDescriptor>) -> Self {
        let properties = descriptor
            .properties
            .iter()
            .map(|p| ValueProperty::new(Rc::clone(p)))
            .collect();
        Self {
            descriptor,
            properties,
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn properties(&self) -> &[ValueProperty] {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut [ValueProperty] {
        &mut self.properties
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.descriptor.property_index(name)
    }
}

/// The fields of one component attached to a control.
///
/// A section either stands alone or inherits from the section with the same
/// kind and index on the control's prototype (`prototype`). Only the local
/// overrides of an inheriting section are its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSection {
    kind: ComponentKind,
    index: u32,
    properties: Vec<ValueProperty>,
    prototype: Option<NodeId>,
    created: bool,
    attached: bool,
}

impl ComponentSection {
    /// A section for a component that did not exist on the control before.
    pub(crate) fn created(registry: &Registry, kind: ComponentKind, index: u32) -> Self {
        Self::with_flags(registry, kind, index, true)
    }

    /// A section for a component the control's class carries intrinsically.
    pub(crate) fn intrinsic(registry: &Registry, kind: ComponentKind) -> Self {
        Self::with_flags(registry, kind, 0, false)
    }

    /// An inheriting copy of `source` for a node derived from `prototype`.
    pub(crate) fn mirror_of(registry: &Registry, source: &ComponentSection, prototype: NodeId) -> Self {
        Self::with_flags(registry, source.kind, source.index, source.created).inheriting(prototype)
    }

    fn with_flags(registry: &Registry, kind: ComponentKind, index: u32, created: bool) -> Self {
        let properties = registry
            .component(kind)
            .properties
            .iter()
            .map(|p| ValueProperty::new(Rc::clone(p)))
            .collect();
        Self {
            kind,
            index,
            properties,
            prototype: None,
            created,
            attached: false,
        }
    }

    pub(crate) fn inheriting(mut self, prototype: NodeId) -> Self {
        self.prototype = Some(prototype);
        self
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: u32) {
        self.index = index;
    }

    /// The node whose section with the same kind and index this one inherits from.
    pub fn prototype(&self) -> Option<NodeId> {
        self.prototype
    }

    /// Whether the component was added explicitly rather than carried by the class.
    pub fn was_created(&self) -> bool {
        self.created
    }

    /// Whether a pre-existing section was wired to a prototype section after
    /// the fact (as opposed to being created as a mirror).
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn set_link(&mut self, prototype: Option<NodeId>, attached: bool) {
        self.prototype = prototype;
        self.attached = attached;
    }

    pub fn properties(&self) -> &[ValueProperty] {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut [ValueProperty] {
        &mut self.properties
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name() == name)
    }

    /// Whether this section must be written out: any field is overridden, or
    /// the component was added here without inheriting it.
    pub fn has_changes(&self) -> bool {
        self.properties.iter().any(ValueProperty::is_overridden_locally)
            || (self.prototype.is_none() && self.created)
    }

    /// Removable sections were added on this control and inherit from nothing.
    pub fn can_remove(&self) -> bool {
        self.prototype.is_none() && self.created
    }

    /// Display name: `Action [1]` for multiple components, `Background` otherwise.
    pub fn display_name(&self) -> String {
        if self.kind.is_multiple() {
            format!("{} [{}]", self.kind.name(), self.index)
        } else {
            self.kind.name().to_owned()
        }
    }

    /// Name used in the text format: `Action1` for multiple components.
    pub fn serialized_name(&self) -> String {
        if self.kind.is_multiple() {
            format!("{}{}", self.kind.name(), self.index)
        } else {
            self.kind.name().to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Value;
    use slotmap::SlotMap;

    #[test]
    fn created_section_has_changes() {
        let registry = Registry::with_defaults();
        let section = ComponentSection::created(&registry, ComponentKind::Background, 0);
        assert!(section.has_changes());
        assert!(section.can_remove());
    }

    #[test]
    fn intrinsic_section_needs_overrides() {
        let registry = Registry::with_defaults();
        let mut section = ComponentSection::intrinsic(&registry, ComponentKind::Background);
        assert!(!section.has_changes());
        assert!(!section.can_remove());

        let idx = section.find("frame").unwrap();
        section.properties_mut()[idx].set_local(Some(Value::Int(2)));
        assert!(section.has_changes());
    }

    #[test]
    fn inheriting_section_is_not_removable() {
        let registry = Registry::with_defaults();
        let mut ids: SlotMap<NodeId, ()> = SlotMap::with_key();
        let proto = ids.insert(());
        let section =
            ComponentSection::created(&registry, ComponentKind::Action, 1).inheriting(proto);
        assert!(!section.has_changes());
        assert!(!section.can_remove());
        assert_eq!(section.prototype(), Some(proto));
    }

    #[test]
    fn names_for_multiple_components() {
        let registry = Registry::with_defaults();
        let action = ComponentSection::created(&registry, ComponentKind::Action, 2);
        assert_eq!(action.display_name(), "Action [2]");
        assert_eq!(action.serialized_name(), "Action2");
        let bg = ComponentSection::created(&registry, ComponentKind::Background, 0);
        assert_eq!(bg.serialized_name(), "Background");
    }
}
