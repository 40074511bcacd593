//! The package text format.
//!
//! A package is a JSON map with a `Header` carrying the format version and
//! optional `ImportedPackages`, `StyleSheets`, `Prototypes` and `Controls`
//! sections. Loading goes through [`PackageLoader`], which reports to a
//! [`PackageBuilder`]; writing goes through [`PackageSerializer`].

mod builder;
mod loader;
mod serializer;
mod source;
mod value;

use std::rc::Rc;

pub(crate) use builder::{BuildMode, BuildOutput, ModelBuilder};
pub use builder::{ControlPlace, PackageBuilder};
pub use loader::PackageLoader;
pub use serializer::PackageSerializer;
pub use source::{FsSource, MemorySource, PackageSource};

use crate::dom::{Document, NodeId, PackageId, StyleSheetId};
use crate::error::LoadError;
use crate::registry::Registry;

/// Version written by default.
pub const CURRENT_VERSION: u32 = 5;
/// Oldest version still read.
pub const MIN_SUPPORTED_VERSION: u32 = 1;
/// Up to this version anchors were written as `*Align` control keys.
pub(crate) const LEGACY_ALIGNS_VERSION: u32 = 1;
/// Up to this version every class-created control had an implicit background.
pub(crate) const LEGACY_BACKGROUND_VERSION: u32 = 2;
/// Up to this version layout orientation was `Horizontal` or `Vertical`.
pub(crate) const LEGACY_ORIENTATION_VERSION: u32 = 4;

/// Read the package at `path` from `source` and everything it imports.
pub fn load_document(
    registry: Rc<Registry>,
    path: &str,
    source: &dyn PackageSource,
) -> Result<Document, LoadError> {
    let text = source.read(path)?;
    load_document_from_str(registry, path, &text, source)
}

/// Like [`load_document`] with the text of the root package given; imports
/// still come from `source`.
pub fn load_document_from_str(
    registry: Rc<Registry>,
    path: &str,
    text: &str,
    source: &dyn PackageSource,
) -> Result<Document, LoadError> {
    let mut doc = Document::new(registry, path);
    {
        let mut builder = ModelBuilder::new(&mut doc, BuildMode::Document);
        PackageLoader::new(source).load_text(text, path, &mut builder)?;
    }
    let packages: Vec<PackageId> = doc.packages().map(|(id, _)| id).collect();
    refresh_packages(&mut doc, &packages);
    doc.discard_changes();
    tracing::info!(
        path,
        packages = packages.len(),
        nodes = doc.node_count(),
        "document loaded"
    );
    Ok(doc)
}

pub fn save_document(doc: &Document) -> String {
    save_document_with_version(doc, CURRENT_VERSION)
}

pub fn save_document_with_version(doc: &Document, version: u32) -> String {
    PackageSerializer::new(doc)
        .with_version(version)
        .serialize_package(doc.root())
}

/// Clipboard text for `controls` and `styles`.
pub fn copy_to_text(doc: &Document, controls: &[NodeId], styles: &[StyleSheetId]) -> String {
    PackageSerializer::new(doc).serialize_selection(controls, styles)
}

/// Load the package at `path` as a read-only import, with its own imports.
/// Returns the package and every package created on the way; a package already
/// in the document is returned as is. On error nothing is left behind.
pub(crate) fn load_package(
    doc: &mut Document,
    path: &str,
    source: &dyn PackageSource,
) -> Result<(PackageId, Vec<PackageId>), LoadError> {
    if let Some((id, _)) = doc.packages().find(|(_, p)| p.path() == path) {
        return Ok((id, Vec::new()));
    }
    let mut builder = ModelBuilder::new(doc, BuildMode::Import);
    if let Err(err) = PackageLoader::new(source).load_package(path, &mut builder) {
        builder.abort();
        return Err(err);
    }
    let output = builder.finish();
    let package = output
        .package
        .ok_or_else(|| LoadError::Malformed(format!("'{path}' produced no package")))?;
    refresh_packages(doc, &output.created_packages);
    Ok((package, output.created_packages))
}

/// Build the controls and styles of clipboard `text` without attaching them.
/// Names inside the text resolve against the edited package and its imports.
pub(crate) fn paste_from_text(
    doc: &mut Document,
    text: &str,
    source: &dyn PackageSource,
) -> Result<BuildOutput, LoadError> {
    let root_path = doc.package(doc.root()).path().to_owned();
    let mut builder = ModelBuilder::new(doc, BuildMode::Paste);
    if let Err(err) = PackageLoader::new(source).load_fragment(text, &root_path, &mut builder) {
        builder.abort();
        return Err(err);
    }
    let output = builder.finish();
    refresh_packages(doc, &output.created_packages);
    Ok(output)
}

/// Bring current values and styles of freshly built packages up to date.
fn refresh_packages(doc: &mut Document, packages: &[PackageId]) {
    doc.begin_update();
    for &package in packages {
        for root in doc.package_roots(package) {
            doc.refresh_subtree_properties(root);
        }
        doc.request_package_refresh(package);
    }
    doc.end_update();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ContainerId, PackageSection};
    use crate::registry::Value;
    use pretty_assertions::assert_eq;

    const BUTTONS: &str = r#"{
        "Header": {"version": "5"},
        "StyleSheets": [
            {"selector": ".warning", "properties": {"textColor": [1.0, 0.0, 0.0, 1.0]}}
        ],
        "Prototypes": [
            {"class": "UIStaticText", "name": "ButtonA", "text": "OK"}
        ]
    }"#;

    const MAIN: &str = r#"{
        "Header": {"version": "5"},
        "ImportedPackages": ["Buttons.yaml"],
        "Controls": [
            {"prototype": "Buttons/ButtonA", "name": "Ok"},
            {"class": "UIStaticText", "name": "Label", "classes": "warning"}
        ]
    }"#;

    fn source() -> MemorySource {
        MemorySource::new()
            .with("Buttons.yaml", BUTTONS)
            .with("Main.yaml", MAIN)
    }

    #[test]
    fn load_resolves_imports_and_styles() {
        let doc = load_document(Rc::new(Registry::with_defaults()), "Main.yaml", &source()).unwrap();
        let controls = ContainerId::Section(doc.root(), PackageSection::Controls);
        assert_eq!(doc.children(controls).len(), 2);

        let ok = doc.find_by_name(controls, "Ok").unwrap();
        let text = doc.node(ok).properties().find_path("text").unwrap();
        assert_eq!(doc.node(ok).properties().get(text).unwrap().value(), &Value::from("OK"));

        let label = doc.find_by_name(controls, "Label").unwrap();
        let color = doc.node(label).properties().find_path("textColor").unwrap();
        assert_eq!(
            doc.node(label).properties().get(color).unwrap().value(),
            &Value::Color(crate::registry::Color::RED)
        );
        assert!(doc.pending_changes().is_empty());
    }

    #[test]
    fn save_writes_qualified_prototype_names() {
        let doc = load_document(Rc::new(Registry::with_defaults()), "Main.yaml", &source()).unwrap();
        let text = save_document(&doc);
        assert!(text.contains(r#""prototype": "Buttons/ButtonA""#));
        assert!(text.contains(r#""ImportedPackages": ["#));
        assert!(text.ends_with("}\n"));

        let again = load_document_from_str(doc.registry_rc(), "Main.yaml", &text, &source()).unwrap();
        assert_eq!(save_document(&again), text);
    }

    const MIRRORS: &str = r#"{
        "Header": {"version": "5"},
        "Prototypes": [
            {"class": "UIControl", "name": "Dialog", "children": [
                {"class": "UIStaticText", "name": "Title", "text": "Title"},
                {"class": "UIControl", "name": "Panel", "children": [
                    {"class": "UIStaticText", "name": "Deep"}
                ]}
            ]}
        ],
        "Controls": [
            {"prototype": "Dialog", "name": "D1", "children": [
                {"path": "Title", "text": "Hi"},
                {"path": "Panel/Deep", "text": "Deep"},
                {"class": "UIStaticText", "name": "Extra", "text": "Mine"}
            ]}
        ]
    }"#;

    fn text_of(doc: &Document, node: NodeId) -> Value {
        let text = doc.node(node).properties().find_path("text").unwrap();
        doc.node(node).properties().get(text).unwrap().value().clone()
    }

    #[test]
    fn round_trip_keeps_prototype_child_overrides() {
        let registry = Rc::new(Registry::with_defaults());
        let source = MemorySource::new().with("Mirrors.yaml", MIRRORS);
        let doc = load_document(registry.clone(), "Mirrors.yaml", &source).unwrap();

        let controls = ContainerId::Section(doc.root(), PackageSection::Controls);
        let d1 = doc.find_by_name(controls, "D1").unwrap();
        let d1 = ContainerId::Control(d1);
        assert_eq!(text_of(&doc, doc.find_by_path(d1, "Title").unwrap()), Value::from("Hi"));
        assert_eq!(text_of(&doc, doc.find_by_path(d1, "Panel/Deep").unwrap()), Value::from("Deep"));
        assert_eq!(text_of(&doc, doc.find_by_path(d1, "Extra").unwrap()), Value::from("Mine"));
        assert_eq!(doc.children(d1).len(), 3);

        let first = save_document(&doc);
        assert!(first.contains(r#""path": "Title""#));
        assert!(first.contains(r#""path": "Panel/Deep""#));

        let again = load_document_from_str(registry, "Mirrors.yaml", &first, &source).unwrap();
        assert_eq!(save_document(&again), first);
    }

    #[test]
    fn failed_import_leaves_no_package_behind() {
        let mut doc = Document::new(Rc::new(Registry::with_defaults()), "Main.yaml");
        let broken = MemorySource::new().with("Broken.yaml", r#"{"Header": {"version": "9"}}"#);
        let err = load_package(&mut doc, "Broken.yaml", &broken).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedVersion { version: 9, .. }));
        assert_eq!(doc.packages().count(), 1);

        let (package, created) = load_package(&mut doc, "Buttons.yaml", &source()).unwrap();
        assert_eq!(created, vec![package]);
        assert!(doc.package(package).is_read_only());
        let (again, created) = load_package(&mut doc, "Buttons.yaml", &source()).unwrap();
        assert_eq!(again, package);
        assert!(created.is_empty());
    }
}
