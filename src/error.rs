//! Error types for editing and loading.
//!
//! Contract violations (inserting a node that already has a parent, removing a
//! node from a container that does not own it, stale ids) are panics. Everything
//! a caller can legitimately ask for and be refused lands here.

use crate::css::parser::SelectorError;
use crate::registry::ComponentKind;

/// A refused edit. Returned before anything was mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("target is read-only")]
    ReadOnly,
    #[error("control '{0}' cannot be inserted there")]
    CannotInsert(String),
    #[error("insertion would make the prototype graph cyclic")]
    PrototypeCycle,
    #[error("control '{0}' cannot be removed")]
    CannotRemove(String),
    #[error("control '{0}' cannot be copied")]
    CannotCopy(String),
    #[error("control '{0}' cannot be used as a prototype")]
    NotAPrototype(String),
    #[error("unknown control class '{0}'")]
    UnknownClass(String),
    #[error("no property at the given path")]
    UnknownProperty,
    #[error("property '{property}' does not accept that value")]
    InvalidValue { property: String },
    #[error("component {0} cannot be added")]
    CannotAddComponent(ComponentKind),
    #[error("component {kind} #{index} cannot be removed")]
    CannotRemoveComponent { kind: ComponentKind, index: u32 },
    #[error("package '{0}' cannot be imported")]
    CannotImport(String),
    #[error("package '{0}' is not imported")]
    NotImported(String),
    #[error("package '{0}' is still used by controls")]
    PackageInUse(String),
    #[error("style sheet edit refused: {0}")]
    InvalidStyle(String),
    #[error("nothing to do")]
    Empty,
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A failed load. No partially built document or package survives it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("missing header")]
    MissingHeader,
    #[error("invalid version '{0}'")]
    BadVersion(String),
    #[error("unsupported version {version} (supported {min}..={max})")]
    UnsupportedVersion { version: u32, min: u32, max: u32 },
    #[error("missing key '{0}'")]
    MissingKey(&'static str),
    #[error("unknown control class '{0}'")]
    UnknownClass(String),
    #[error("unknown prototype '{0}'")]
    UnknownPrototype(String),
    #[error("unknown package '{0}'")]
    UnknownPackage(String),
    #[error("no prototype child at path '{0}'")]
    UnknownPath(String),
    #[error("unknown component '{0}'")]
    UnknownComponent(String),
    #[error("invalid value for '{property}': {reason}")]
    InvalidValue { property: String, reason: String },
    #[error("import cycle through '{0}'")]
    ImportCycle(String),
    #[error("cannot read package '{path}': {reason}")]
    Source { path: String, reason: String },
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Malformed(err.to_string())
    }
}
