//! Document arena: control nodes, packages, containers, queries and the
//! refresh pipeline that keeps current values in sync.

pub mod construct;
pub mod mutate;
pub mod node;
pub mod package;
pub mod query;
pub mod refresh;
pub mod tree;

pub use node::{
    ContainerId, Control, ControlNode, ControlState, CreationKind, NodeId, PackageId,
    PackageSection, StyleSheetId,
};
pub use package::{package_name, PackageNode};
pub use tree::Document;
