//! Turning loader events into document nodes.
//!
//! The loader walks the text and reports what it finds through
//! [`PackageBuilder`]; [`ModelBuilder`] is the implementation that builds
//! packages, controls and style sheets inside a [`Document`].

use std::rc::Rc;

use crate::css::model::Selector;
use crate::css::stylesheet::{StyleProperty, StyleSheetNode};
use crate::dom::{package_name, ContainerId, Document, NodeId, PackageId, PackageSection, StyleSheetId};
use crate::error::LoadError;
use crate::property::{ComponentSection, PropertyPath};
use crate::registry::{ComponentKind, Registry, Value};

/// Where a finished control goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPlace {
    Prototypes,
    Controls,
    /// Child of the control that was begun before it.
    PreviousControl,
}

/// Receiver of loader events.
///
/// Every `begin_*` is matched by the corresponding `end_*` unless an error
/// aborts the load.
pub trait PackageBuilder {
    fn registry(&self) -> Rc<Registry>;

    fn begin_package(&mut self, path: &str) -> Result<(), LoadError>;

    fn end_package(&mut self) -> Result<(), LoadError>;

    /// Record an import of the current package. Returns `false` if the
    /// package at `path` is not available yet and must be loaded first; the
    /// loader then brackets it with `begin_package`/`end_package`.
    fn process_imported_package(&mut self, path: &str) -> Result<bool, LoadError>;

    fn process_style_sheet(&mut self, selectors: Vec<Selector>, properties: Vec<StyleProperty>);

    /// Returns the class name of the new control.
    fn begin_control_with_class(&mut self, name: &str, class: &str) -> Result<String, LoadError>;

    fn begin_control_with_custom_class(
        &mut self,
        name: &str,
        custom_class: &str,
        class: &str,
    ) -> Result<String, LoadError>;

    /// `Ok(None)` if an unqualified prototype is not known yet; the loader
    /// may load it from the current package and retry.
    fn begin_control_with_prototype(
        &mut self,
        name: &str,
        package: Option<&str>,
        prototype: &str,
        custom_class: Option<&str>,
    ) -> Result<Option<String>, LoadError>;

    /// Reopen an existing prototype child of the current control.
    fn begin_control_with_path(
        &mut self,
        path: &str,
        custom_class: Option<&str>,
    ) -> Result<String, LoadError>;

    fn end_control(&mut self, place: ControlPlace) -> Result<(), LoadError>;

    fn begin_control_properties_section(&mut self, section: &str) -> Result<(), LoadError>;

    fn end_control_properties_section(&mut self);

    fn begin_component_properties_section(
        &mut self,
        kind: ComponentKind,
        index: u32,
    ) -> Result<(), LoadError>;

    fn end_component_properties_section(&mut self);

    /// Set `name` in the open section of the current control.
    fn process_property(&mut self, name: &str, value: Value) -> Result<(), LoadError>;
}

/// What the outermost package of a build is turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuildMode {
    /// The document's own root package.
    Document,
    /// A new read-only package for an import.
    Import,
    /// Nothing: controls and styles stay detached for a paste.
    Paste,
}

/// Everything a build produced.
#[derive(Debug, Default)]
pub(crate) struct BuildOutput {
    /// The outermost package, unless pasting.
    pub package: Option<PackageId>,
    /// Root controls of pasted text, detached.
    pub controls: Vec<NodeId>,
    /// Style sheets of pasted text, detached.
    pub styles: Vec<StyleSheetId>,
    /// Packages the outermost text imports, when it is not a package itself.
    pub imported: Vec<PackageId>,
    /// Packages created by this build, in creation order.
    pub created_packages: Vec<PackageId>,
    created_nodes: Vec<NodeId>,
}

#[derive(Debug)]
struct PackageFrame {
    id: Option<PackageId>,
    imports: Vec<PackageId>,
}

#[derive(Debug, Clone, Copy)]
struct ControlFrame {
    node: NodeId,
    from_path: bool,
}

#[derive(Debug, Clone, Copy)]
enum OpenSection {
    Control(usize),
    Component(ComponentKind, u32),
}

pub(crate) struct ModelBuilder<'a> {
    doc: &'a mut Document,
    mode: BuildMode,
    packages: Vec<PackageFrame>,
    controls: Vec<ControlFrame>,
    section: Option<OpenSection>,
    /// Packages by path that an import can resolve to without loading.
    loaded: Vec<(String, PackageId)>,
    output: BuildOutput,
}

impl<'a> ModelBuilder<'a> {
    pub(crate) fn new(doc: &'a mut Document, mode: BuildMode) -> Self {
        let loaded = match mode {
            BuildMode::Document => Vec::new(),
            BuildMode::Import | BuildMode::Paste => doc
                .packages()
                .map(|(id, p)| (p.path().to_owned(), id))
                .collect(),
        };
        Self {
            doc,
            mode,
            packages: Vec::new(),
            controls: Vec::new(),
            section: None,
            loaded,
            output: BuildOutput::default(),
        }
    }

    pub(crate) fn finish(self) -> BuildOutput {
        self.output
    }

    /// Drop everything this build created. Only meaningful for
    /// [`BuildMode::Import`] and [`BuildMode::Paste`]: a failed document
    /// load discards the whole document instead.
    pub(crate) fn abort(self) {
        let doc = self.doc;
        // Creation order: parents go first and take their subtrees along.
        for id in self.output.created_nodes {
            if doc.contains(id) {
                doc.nodes[id].parent = None;
                doc.discard_node(id);
            }
        }
        for package in self.output.created_packages {
            if let Some(removed) = doc.packages.remove(package) {
                for style in removed.style_sheets {
                    doc.style_sheets.remove(style);
                }
            }
        }
        for style in self.output.styles {
            doc.style_sheets.remove(style);
        }
    }

    fn current_package(&self) -> Option<PackageId> {
        self.packages.last().and_then(|f| f.id)
    }

    fn current_control(&self) -> Result<NodeId, LoadError> {
        self.controls
            .last()
            .map(|f| f.node)
            .ok_or_else(|| LoadError::Malformed("no open control".to_owned()))
    }

    fn push_control(&mut self, node: NodeId, from_path: bool) {
        if !from_path {
            self.output.created_nodes.push(node);
        }
        self.controls.push(ControlFrame { node, from_path });
    }

    fn record_import(&mut self, imported: PackageId) {
        let Some(frame) = self.packages.last_mut() else {
            return;
        };
        if frame.imports.contains(&imported) {
            tracing::warn!(path = self.doc.package(imported).path(), "duplicate import ignored");
            return;
        }
        frame.imports.push(imported);
        if let Some(package) = frame.id {
            let index = self.doc.package(package).imported_packages().len();
            self.doc.insert_imported_at(package, index, imported);
        }
    }

    /// Package called `name` among the imports visible to the current package.
    /// Pasted text also sees the edited package and its imports.
    fn find_visible_package(&self, name: &str) -> Option<PackageId> {
        let frame = self.packages.last()?;
        let mut visible = frame.imports.clone();
        if frame.id.is_none() {
            let root = self.doc.root();
            visible.push(root);
            visible.extend_from_slice(self.doc.package(root).imported_packages());
        }
        visible
            .into_iter()
            .find(|&p| package_name(self.doc.package(p).path()) == name)
    }

    fn set_local(&mut self, node: NodeId, path: PropertyPath, value: Value) {
        if let Some(prop) = self.doc.nodes[node].properties.get_mut(path) {
            prop.set_local(Some(value));
        }
    }
}

impl PackageBuilder for ModelBuilder<'_> {
    fn registry(&self) -> Rc<Registry> {
        self.doc.registry_rc()
    }

    fn begin_package(&mut self, path: &str) -> Result<(), LoadError> {
        let outermost = self.packages.is_empty();
        let id = match (self.mode, outermost) {
            (BuildMode::Document, true) => {
                self.doc.set_root_path(path);
                Some(self.doc.root())
            }
            (BuildMode::Paste, true) => None,
            _ => {
                let id = self.doc.add_package(path, true);
                self.output.created_packages.push(id);
                Some(id)
            }
        };
        if let Some(id) = id {
            self.loaded.push((path.to_owned(), id));
            if outermost {
                self.output.package = Some(id);
            }
        }
        tracing::trace!(path, depth = self.packages.len(), "begin package");
        self.packages.push(PackageFrame {
            id,
            imports: Vec::new(),
        });
        Ok(())
    }

    fn end_package(&mut self) -> Result<(), LoadError> {
        let frame = self
            .packages
            .pop()
            .ok_or_else(|| LoadError::Malformed("unbalanced package".to_owned()))?;
        if self.packages.is_empty() {
            self.output.imported = frame.imports;
        } else if let Some(id) = frame.id {
            self.record_import(id);
        }
        Ok(())
    }

    fn process_imported_package(&mut self, path: &str) -> Result<bool, LoadError> {
        let found = self
            .loaded
            .iter()
            .find(|(p, _)| p == path)
            .map(|&(_, id)| id);
        match found {
            Some(id) => {
                self.record_import(id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn process_style_sheet(&mut self, selectors: Vec<Selector>, properties: Vec<StyleProperty>) {
        let style = self
            .doc
            .add_style_sheet(StyleSheetNode::new(selectors, properties));
        match self.current_package() {
            Some(package) => {
                let index = self.doc.package(package).style_sheets().len();
                self.doc.insert_style_sheet_at(package, index, style);
            }
            None => self.output.styles.push(style),
        }
    }

    fn begin_control_with_class(&mut self, name: &str, class: &str) -> Result<String, LoadError> {
        let node = self
            .doc
            .create_from_class(class, name)
            .map_err(|_| LoadError::UnknownClass(class.to_owned()))?;
        self.push_control(node, false);
        Ok(class.to_owned())
    }

    fn begin_control_with_custom_class(
        &mut self,
        name: &str,
        custom_class: &str,
        class: &str,
    ) -> Result<String, LoadError> {
        let class = self.begin_control_with_class(name, class)?;
        let node = self.current_control()?;
        self.set_local(node, PropertyPath::CustomClass, Value::from(custom_class));
        Ok(class)
    }

    fn begin_control_with_prototype(
        &mut self,
        name: &str,
        package: Option<&str>,
        prototype: &str,
        custom_class: Option<&str>,
    ) -> Result<Option<String>, LoadError> {
        let found = match package {
            Some(package_name) => {
                let package = self
                    .find_visible_package(package_name)
                    .ok_or_else(|| LoadError::UnknownPackage(package_name.to_owned()))?;
                let proto = self.doc.find_package_control(package, prototype).ok_or_else(|| {
                    LoadError::UnknownPrototype(format!("{package_name}/{prototype}"))
                })?;
                Some(proto)
            }
            None => {
                let package = self.current_package().unwrap_or(self.doc.root());
                self.doc.find_package_control(package, prototype)
            }
        };
        let Some(proto) = found else {
            return Ok(None);
        };

        let node = self.doc.create_from_prototype(proto);
        self.set_local(node, PropertyPath::Name, Value::from(name));
        if let Some(custom) = custom_class {
            self.set_local(node, PropertyPath::CustomClass, Value::from(custom));
        }
        self.push_control(node, false);
        Ok(Some(self.doc.node(node).class_name().to_owned()))
    }

    fn begin_control_with_path(
        &mut self,
        path: &str,
        custom_class: Option<&str>,
    ) -> Result<String, LoadError> {
        let parent = self.current_control()?;
        let node = self
            .doc
            .find_by_path(ContainerId::Control(parent), path)
            .ok_or_else(|| LoadError::UnknownPath(path.to_owned()))?;
        if let Some(custom) = custom_class {
            self.set_local(node, PropertyPath::CustomClass, Value::from(custom));
        }
        self.push_control(node, true);
        Ok(self.doc.node(node).class_name().to_owned())
    }

    fn end_control(&mut self, place: ControlPlace) -> Result<(), LoadError> {
        let frame = self
            .controls
            .pop()
            .ok_or_else(|| LoadError::Malformed("unbalanced control".to_owned()))?;
        self.section = None;
        if frame.from_path {
            return Ok(());
        }
        let section = match place {
            ControlPlace::PreviousControl => {
                let parent = self.current_control()?;
                self.doc.add(ContainerId::Control(parent), frame.node);
                return Ok(());
            }
            ControlPlace::Prototypes => PackageSection::Prototypes,
            ControlPlace::Controls => PackageSection::Controls,
        };
        match self.current_package() {
            Some(package) => self.doc.add(ContainerId::Section(package, section), frame.node),
            None => self.output.controls.push(frame.node),
        }
        Ok(())
    }

    fn begin_control_properties_section(&mut self, section: &str) -> Result<(), LoadError> {
        let node = self.current_control()?;
        let index = self.doc.node(node)
            .properties()
            .sections()
            .iter()
            .position(|s| s.name() == section)
            .ok_or_else(|| LoadError::Malformed(format!("no section '{section}' on this control")))?;
        self.section = Some(OpenSection::Control(index));
        Ok(())
    }

    fn end_control_properties_section(&mut self) {
        self.section = None;
    }

    fn begin_component_properties_section(
        &mut self,
        kind: ComponentKind,
        index: u32,
    ) -> Result<(), LoadError> {
        let node = self.current_control()?;
        let properties = self.doc.node(node).properties();
        if properties.find_component(kind, index).is_none() {
            if index > properties.component_count(kind) || (!kind.is_multiple() && index > 0) {
                return Err(LoadError::UnknownComponent(format!("{kind}{index}")));
            }
            let registry = self.doc.registry_rc();
            self.doc.nodes[node]
                .properties
                .insert_component(ComponentSection::created(&registry, kind, index));
        }
        self.section = Some(OpenSection::Component(kind, index));
        Ok(())
    }

    fn end_component_properties_section(&mut self) {
        self.section = None;
    }

    fn process_property(&mut self, name: &str, value: Value) -> Result<(), LoadError> {
        let node = self.current_control()?;
        let properties = self.doc.node(node).properties();
        let path = match self.section {
            Some(OpenSection::Control(section)) => properties.sections()[section]
                .find(name)
                .map(|index| PropertyPath::Control { section, index }),
            Some(OpenSection::Component(kind, index)) => {
                properties.find_component_property(kind, index, name)
            }
            None => None,
        }
        .ok_or_else(|| LoadError::Malformed(format!("property '{name}' outside its section")))?;
        self.set_local(node, path, value);
        Ok(())
    }
}
