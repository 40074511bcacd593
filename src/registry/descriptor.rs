//! Static descriptions of properties, sections, components and enums.

use std::fmt;
use std::rc::Rc;

use super::value::Value;

/// Index of an [`EnumMap`] inside a [`Registry`](super::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumId(pub(crate) usize);

/// Name <-> integer table for enum and flag properties.
#[derive(Debug, Clone)]
pub struct EnumMap {
    name: &'static str,
    entries: Vec<(&'static str, i64)>,
}

impl EnumMap {
    pub fn new(name: &'static str, entries: &[(&'static str, i64)]) -> Self {
        Self {
            name,
            entries: entries.to_vec(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &[(&'static str, i64)] {
        &self.entries
    }

    pub fn to_name(&self, value: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| *n)
    }

    pub fn to_value(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Split a flags value into the names of its set bits, in table order.
    pub fn flags_to_names(&self, value: i64) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(_, bit)| *bit != 0 && value & bit == *bit)
            .map(|(n, _)| *n)
            .collect()
    }

    /// Combine flag names into a value. `None` if any name is unknown.
    pub fn names_to_flags<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Option<i64> {
        names
            .into_iter()
            .try_fold(0i64, |acc, name| self.to_value(name).map(|bit| acc | bit))
    }
}

/// How a property's value is typed and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    String,
    Vector2,
    Color,
    /// An `Int` value with one name per value.
    Enum(EnumId),
    /// An `Int` value written as a list of bit names.
    Flags(EnumId),
}

impl PropertyKind {
    /// Whether `value` has the shape this kind stores.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PropertyKind::Bool, Value::Bool(_))
                | (PropertyKind::Int, Value::Int(_))
                | (PropertyKind::Enum(_), Value::Int(_))
                | (PropertyKind::Flags(_), Value::Int(_))
                | (PropertyKind::Float, Value::Float(_))
                | (PropertyKind::String, Value::String(_))
                | (PropertyKind::Vector2, Value::Vector2(_))
                | (PropertyKind::Color, Value::Color(_))
        )
    }
}

/// Description of one editable attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub default: Value,
    pub read_only: bool,
    /// Index into the style property table if style rules can set this property.
    pub style_index: Option<usize>,
}

/// An ordered group of property descriptors (a class's own properties or a
/// component's fields).
#[derive(Debug, Clone, PartialEq)]
pub struct SectionDescriptor {
    pub name: &'static str,
    pub properties: Vec<Rc<PropertyDescriptor>>,
}

impl SectionDescriptor {
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }
}

/// Closed set of component types a control may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Background,
    Anchor,
    LinearLayout,
    SizePolicy,
    Action,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Background,
        ComponentKind::Anchor,
        ComponentKind::LinearLayout,
        ComponentKind::SizePolicy,
        ComponentKind::Action,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Background => "Background",
            ComponentKind::Anchor => "Anchor",
            ComponentKind::LinearLayout => "LinearLayout",
            ComponentKind::SizePolicy => "SizePolicy",
            ComponentKind::Action => "Action",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Multiple components may appear several times on one control and are
    /// addressed by index.
    pub fn is_multiple(self) -> bool {
        matches!(self, ComponentKind::Action)
    }

    pub(crate) fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a style property lands on a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleTarget {
    /// A control-section property with this name, in whichever section declares it.
    Control(&'static str),
    /// A field of a component. Applies to the component at index 0.
    Component(ComponentKind, &'static str),
}

/// One row of the style property database.
#[derive(Debug, Clone, PartialEq)]
pub struct StylePropertyDescriptor {
    pub index: usize,
    pub name: &'static str,
    pub target: StyleTarget,
    pub kind: PropertyKind,
    pub default: Value,
}

/// A fixed-size bitset over style property indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct StylePropertySet(u64);

impl StylePropertySet {
    pub const CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize) {
        self.0 |= 1 << index;
    }

    pub fn remove(&mut self, index: usize) {
        self.0 &= !(1 << index);
    }

    pub fn set(&mut self, index: usize, on: bool) {
        if on {
            self.insert(index);
        } else {
            self.remove(index);
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index < Self::CAPACITY && self.0 & (1 << index) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..Self::CAPACITY).filter(|i| self.contains(*i))
    }
}
