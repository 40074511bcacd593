//! Node types: ids, control state, the live control and the control node.

use slotmap::new_key_type;

use crate::property::RootProperty;
use crate::registry::StylePropertySet;

new_key_type! {
    /// Unique identifier for a control node. Copy, lightweight (u64).
    pub struct NodeId;
    /// Unique identifier for a package (the edited one or an imported one).
    pub struct PackageId;
    /// Unique identifier for a style sheet rule.
    pub struct StyleSheetId;
}

/// How a control node came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationKind {
    /// Built from a control class.
    FromClass,
    /// An instance of another control (the prototype).
    FromPrototype,
    /// A mirror of a prototype's child inside an instance.
    FromPrototypeChild,
}

/// The two control sections of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageSection {
    Prototypes,
    Controls,
}

/// A container that owns control nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerId {
    Control(NodeId),
    Section(PackageId, PackageSection),
}

impl ContainerId {
    pub fn control(self) -> Option<NodeId> {
        match self {
            ContainerId::Control(id) => Some(id),
            ContainerId::Section(..) => None,
        }
    }
}

bitflags::bitflags! {
    /// Interaction state of a control, matched by `?state` selectors.
    ///
    /// The empty set is the `normal` state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlState: u8 {
        const PRESSED = 1 << 0;
        const HOVER = 1 << 1;
        const DISABLED = 1 << 2;
        const SELECTED = 1 << 3;
        const FOCUSED = 1 << 4;
    }
}

impl ControlState {
    /// Parse a selector state name.
    pub fn from_state_name(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(ControlState::empty()),
            "pressed" | "pressed_inside" => Some(ControlState::PRESSED),
            "hover" => Some(ControlState::HOVER),
            "disabled" => Some(ControlState::DISABLED),
            "selected" => Some(ControlState::SELECTED),
            "focused" => Some(ControlState::FOCUSED),
            _ => None,
        }
    }
}

/// The live control a node wraps: what the style engine sees.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub(crate) class_name: String,
    pub(crate) classes: Vec<String>,
    pub(crate) state: ControlState,
    /// Style properties whose value is overridden (locally or by the prototype).
    pub(crate) local_set: StylePropertySet,
    /// Style properties whose current value comes from a style rule.
    pub(crate) styled_set: StylePropertySet,
    pub(crate) style_initialized: bool,
}

impl Control {
    pub(crate) fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            classes: Vec::new(),
            state: ControlState::empty(),
            local_set: StylePropertySet::new(),
            styled_set: StylePropertySet::new(),
            style_initialized: false,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Classes from the `classes` property, in declaration order, de-duplicated.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Whether style index `index` currently gets its value from a style rule.
    pub fn is_styled(&self, index: usize) -> bool {
        self.styled_set.contains(index)
    }

    pub fn styled_properties(&self) -> StylePropertySet {
        self.styled_set
    }

    pub fn local_properties(&self) -> StylePropertySet {
        self.local_set
    }

    pub fn is_style_initialized(&self) -> bool {
        self.style_initialized
    }

    /// Replace the class list from a space separated string. Returns `true`
    /// if the list changed.
    pub(crate) fn set_classes_from(&mut self, text: &str) -> bool {
        let mut classes: Vec<String> = Vec::new();
        for class in text.split_whitespace() {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_owned());
            }
        }
        if classes == self.classes {
            return false;
        }
        self.classes = classes;
        true
    }
}

/// A control in the document hierarchy.
#[derive(Debug, Clone)]
pub struct ControlNode {
    pub(crate) control: Control,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<ContainerId>,
    pub(crate) creation: CreationKind,
    pub(crate) properties: RootProperty,
    pub(crate) prototype: Option<NodeId>,
    /// Nodes created from this one that are currently in a hierarchy.
    pub(crate) instances: Vec<NodeId>,
}

impl ControlNode {
    pub(crate) fn new(
        class_name: &str,
        creation: CreationKind,
        properties: RootProperty,
        prototype: Option<NodeId>,
    ) -> Self {
        Self {
            control: Control::new(class_name),
            children: Vec::new(),
            parent: None,
            creation,
            properties,
            prototype,
            instances: Vec::new(),
        }
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    /// The node's current name.
    pub fn name(&self) -> &str {
        self.properties.name_property().value().as_str().unwrap_or("")
    }

    pub fn class_name(&self) -> &str {
        self.control.class_name()
    }

    pub fn custom_class(&self) -> Option<&str> {
        self.properties
            .custom_class_property()
            .value()
            .as_str()
            .filter(|s| !s.is_empty())
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    pub fn creation(&self) -> CreationKind {
        self.creation
    }

    pub fn properties(&self) -> &RootProperty {
        &self.properties
    }

    pub fn prototype(&self) -> Option<NodeId> {
        self.prototype
    }

    pub fn instances(&self) -> &[NodeId] {
        &self.instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_parse_and_dedup() {
        let mut control = Control::new("UIControl");
        assert!(control.set_classes_from("warning  big warning"));
        assert_eq!(control.classes(), &["warning".to_owned(), "big".to_owned()]);
        assert!(control.has_class("big"));
        assert!(!control.set_classes_from("warning big"));
        assert!(control.set_classes_from(""));
        assert!(control.classes().is_empty());
    }

    #[test]
    fn state_names() {
        assert_eq!(ControlState::from_state_name("hover"), Some(ControlState::HOVER));
        assert_eq!(ControlState::from_state_name("normal"), Some(ControlState::empty()));
        assert_eq!(ControlState::from_state_name("wobbly"), None);
    }

    #[test]
    fn container_control_accessor() {
        fn assert_copy<T: Copy>() {}
        assert_copy::<NodeId>();
        assert_copy::<ContainerId>();
    }
}
