//! A single editable attribute with override tracking.

use std::rc::Rc;

use crate::registry::{PropertyDescriptor, PropertyKind, Value};

/// One editable attribute of a control.
///
/// Holds three layers: the local override (if any), the value the style
/// cascade last resolved for it (if any), and the current value that the
/// control displays. The current value is recomputed by the document's
/// refresh pipeline; it is never written directly by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueProperty {
    descriptor: Rc<PropertyDescriptor>,
    local: Option<Value>,
    style_value: Option<Value>,
    value: Value,
    read_only: bool,
}

impl ValueProperty {
    pub fn new(descriptor: Rc<PropertyDescriptor>) -> Self {
        let value = descriptor.default.clone();
        let read_only = descriptor.read_only;
        Self {
            descriptor,
            local: None,
            style_value: None,
            value,
            read_only,
        }
    }

    pub(crate) fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.descriptor.kind
    }

    pub fn descriptor(&self) -> &Rc<PropertyDescriptor> {
        &self.descriptor
    }

    pub fn default_value(&self) -> &Value {
        &self.descriptor.default
    }

    /// The value the control currently shows.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn local_value(&self) -> Option<&Value> {
        self.local.as_ref()
    }

    /// The value the winning style rule assigns, whether or not it applies.
    pub fn style_value(&self) -> Option<&Value> {
        self.style_value.as_ref()
    }

    pub fn is_overridden_locally(&self) -> bool {
        self.local.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn style_index(&self) -> Option<usize> {
        self.descriptor.style_index
    }

    pub(crate) fn set_local(&mut self, value: Option<Value>) {
        self.local = value;
    }

    pub(crate) fn set_style_value(&mut self, value: Option<Value>) {
        self.style_value = value;
    }

    /// Returns `true` if the current value changed.
    pub(crate) fn set_current(&mut self, value: Value) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}
