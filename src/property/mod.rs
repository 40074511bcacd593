//! Per-control property tree: value properties, class sections, component
//! sections, and the paths that address them.

pub mod root;
pub mod section;
pub mod value_property;

pub use root::{PropertyPath, PropertyVisitor, RootProperty};
pub use section::{ComponentSection, ControlSection};
pub use value_property::ValueProperty;
