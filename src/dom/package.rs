//! Package nodes: the edited document and the packages it imports.

use super::node::{NodeId, PackageId, StyleSheetId};

/// One package: imported packages, style sheets, prototypes and controls, in
/// that order.
#[derive(Debug, Clone)]
pub struct PackageNode {
    pub(crate) path: String,
    pub(crate) imported: Vec<PackageId>,
    pub(crate) style_sheets: Vec<StyleSheetId>,
    pub(crate) prototypes: Vec<NodeId>,
    pub(crate) controls: Vec<NodeId>,
    pub(crate) read_only: bool,
}

impl PackageNode {
    pub(crate) fn new(path: impl Into<String>, read_only: bool) -> Self {
        Self {
            path: path.into(),
            imported: Vec::new(),
            style_sheets: Vec::new(),
            prototypes: Vec::new(),
            controls: Vec::new(),
            read_only,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The name other packages use to refer to this one: the file stem of its path.
    pub fn name(&self) -> &str {
        package_name(&self.path)
    }

    pub fn imported_packages(&self) -> &[PackageId] {
        &self.imported
    }

    pub fn style_sheets(&self) -> &[StyleSheetId] {
        &self.style_sheets
    }

    pub fn prototypes(&self) -> &[NodeId] {
        &self.prototypes
    }

    pub fn controls(&self) -> &[NodeId] {
        &self.controls
    }

    /// Imported packages are never edited.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// File stem of a package path: `~res:/UI/Lib.yaml` -> `Lib`.
pub fn package_name(path: &str) -> &str {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    }
}
