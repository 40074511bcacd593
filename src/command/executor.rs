//! The editing façade.
//!
//! [`Editor`] owns a document and its undo history. Every request is checked
//! against the document's policy first; refused requests change nothing and
//! are logged as warnings. Accepted requests run as one named batch, with the
//! structural edits fanned out to prototype instances.

use crate::codec::{self, MemorySource, PackageSource};
use crate::config::EditorConfig;
use crate::css::parser::parse_selector;
use crate::css::stylesheet::StyleProperty;
use crate::css::transition::TransitionSpec;
use crate::dom::{
    ContainerId, ControlState, CreationKind, Document, NodeId, PackageId, StyleSheetId,
};
use crate::error::{EditError, LoadError};
use crate::event::{ListenerId, PackageListener};
use crate::property::PropertyPath;
use crate::registry::{ComponentKind, PropertyKind, Registry, Value};

use super::commands::Command;
use super::propagation;
use super::stack::CommandStack;

use std::rc::Rc;

/// How many names a batch title lists before `etc.`.
const MAX_LISTED_NAMES: usize = 3;

fn format_names<S: AsRef<str>>(names: &[S]) -> String {
    let mut list = names
        .iter()
        .take(MAX_LISTED_NAMES)
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > MAX_LISTED_NAMES {
        list.push_str(", etc.");
    }
    list
}

/// First refusal of a multi-item request; the rest are only logged.
#[derive(Default)]
struct Refusals {
    first: Option<EditError>,
}

impl Refusals {
    fn note(&mut self, err: EditError) {
        tracing::warn!(%err, "request refused");
        self.first.get_or_insert(err);
    }

    fn into_error(self) -> EditError {
        self.first.unwrap_or(EditError::Empty)
    }
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// A document plus its undo history.
pub struct Editor {
    document: Document,
    stack: CommandStack,
    config: EditorConfig,
    source: Box<dyn PackageSource>,
}

impl Editor {
    /// Wrap an existing document. Imports resolve against an empty source
    /// until [`with_source`](Self::with_source) sets one.
    pub fn new(mut document: Document, config: EditorConfig) -> Self {
        document.set_animate_transitions(config.animate_transitions);
        Self {
            document,
            stack: CommandStack::with_max_levels(config.max_undo_levels),
            config,
            source: Box::new(MemorySource::new()),
        }
    }

    /// Set where imported packages are read from (builder).
    pub fn with_source(mut self, source: impl PackageSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Load the document at `path` and edit it.
    pub fn open(
        registry: Rc<Registry>,
        path: &str,
        source: impl PackageSource + 'static,
        config: EditorConfig,
    ) -> Result<Self, LoadError> {
        let document = codec::load_document(registry, path, &source)?;
        Ok(Self::new(document, config).with_source(source))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// For building detached controls and style sheets. Attached content is
    /// only changed through the editor's own methods.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn stack(&self) -> &CommandStack {
        &self.stack
    }

    /// Group the following requests into one undo step, named `name`.
    pub fn begin_batch(&mut self, name: &str) {
        self.stack.begin_batch(&mut self.document, name, 0);
    }

    pub fn end_batch(&mut self) {
        self.stack.end_batch(&mut self.document);
    }

    // -----------------------------------------------------------------------
    // Controls
    // -----------------------------------------------------------------------

    /// Why `node` cannot go into `dest`.
    fn insert_refusal(&self, node: NodeId, dest: ContainerId) -> EditError {
        let doc = &self.document;
        if doc.is_container_read_only(dest) {
            return EditError::ReadOnly;
        }
        match dest.control() {
            Some(parent) if doc.is_instanced_from(node, parent) => EditError::PrototypeCycle,
            _ => EditError::CannotInsert(doc.node(node).name().to_owned()),
        }
    }

    /// Why an instance of `prototype` cannot go into `dest`.
    fn instance_refusal(&self, prototype: NodeId, dest: ContainerId) -> EditError {
        let doc = &self.document;
        if doc.is_container_read_only(dest) {
            return EditError::ReadOnly;
        }
        match dest.control() {
            Some(parent) if doc.node(parent).creation() != CreationKind::FromPrototypeChild => {
                EditError::PrototypeCycle
            }
            _ => EditError::CannotInsert(doc.node(prototype).name().to_owned()),
        }
    }

    fn remove_refusal(&self, node: NodeId) -> EditError {
        if self.document.is_read_only(node) {
            EditError::ReadOnly
        } else {
            EditError::CannotRemove(self.document.node(node).name().to_owned())
        }
    }

    fn clamp(&self, container: ContainerId, index: usize) -> usize {
        index.min(self.document.children(container).len())
    }

    /// Insert the detached `node` into `dest`, mirroring it into every
    /// instance of `dest`.
    pub fn insert_control(
        &mut self,
        node: NodeId,
        dest: ContainerId,
        index: usize,
    ) -> Result<(), EditError> {
        if !self.document.can_insert_control(node, dest) {
            let err = self.insert_refusal(node, dest);
            tracing::warn!(%err, ?node, "cannot insert control");
            return Err(err);
        }
        let n = self.document.node(node);
        let name = format!("Insert Control {}({})", n.name(), n.class_name());
        let index = self.clamp(dest, index);

        self.stack.begin_batch(&mut self.document, &name, 1);
        propagation::insert_control(&mut self.document, &mut self.stack, node, dest, index);
        self.stack.end_batch(&mut self.document);
        Ok(())
    }

    /// Insert a new instance of each of `prototypes` into `dest`, in order.
    pub fn insert_instances(
        &mut self,
        prototypes: &[NodeId],
        dest: ContainerId,
        index: usize,
    ) -> Result<Vec<NodeId>, EditError> {
        let mut refusals = Refusals::default();
        let mut accepted = Vec::with_capacity(prototypes.len());
        for &prototype in prototypes {
            let doc = &self.document;
            if !doc.can_copy(prototype) || !doc.is_in_hierarchy(prototype) {
                refusals.note(EditError::NotAPrototype(doc.node(prototype).name().to_owned()));
            } else if !doc.can_insert_control(prototype, dest) {
                refusals.note(self.instance_refusal(prototype, dest));
            } else {
                accepted.push(prototype);
            }
        }
        if accepted.is_empty() {
            return Err(refusals.into_error());
        }

        let names: Vec<&str> = accepted.iter().map(|&p| self.document.node(p).name()).collect();
        let name = format!("Instance Controls {}", format_names(&names));
        let mut index = self.clamp(dest, index);
        let mut inserted = Vec::with_capacity(accepted.len());

        self.stack.begin_batch(&mut self.document, &name, accepted.len());
        for prototype in accepted {
            let instance = self.document.create_from_prototype(prototype);
            propagation::insert_control(&mut self.document, &mut self.stack, instance, dest, index);
            inserted.push(instance);
            index += 1;
        }
        self.stack.end_batch(&mut self.document);
        Ok(inserted)
    }

    /// Insert deep copies of `nodes` into `dest`, in order.
    pub fn copy_controls(
        &mut self,
        nodes: &[NodeId],
        dest: ContainerId,
        index: usize,
    ) -> Result<Vec<NodeId>, EditError> {
        let mut refusals = Refusals::default();
        let mut copies = Vec::with_capacity(nodes.len());
        for &node in nodes {
            if !self.document.can_copy(node) {
                refusals.note(EditError::CannotCopy(self.document.node(node).name().to_owned()));
                continue;
            }
            let copy = self.document.clone_node(node);
            if self.document.can_insert_control(copy, dest) {
                copies.push(copy);
            } else {
                refusals.note(self.insert_refusal(copy, dest));
                self.document.discard_node(copy);
            }
        }
        if copies.is_empty() {
            return Err(refusals.into_error());
        }

        let names: Vec<&str> = nodes.iter().map(|&n| self.document.node(n).name()).collect();
        let name = format!("Copy Controls {}", format_names(&names));
        let mut index = self.clamp(dest, index);

        self.stack.begin_batch(&mut self.document, &name, copies.len());
        for &copy in &copies {
            propagation::insert_control(&mut self.document, &mut self.stack, copy, dest, index);
            index += 1;
        }
        self.stack.end_batch(&mut self.document);
        Ok(copies)
    }

    /// Move `nodes` into `dest`, starting at `index` as counted before the
    /// move. Returns the nodes that ended up in `dest`.
    pub fn move_controls(
        &mut self,
        nodes: &[NodeId],
        dest: ContainerId,
        index: usize,
    ) -> Result<Vec<NodeId>, EditError> {
        let mut refusals = Refusals::default();
        let mut accepted = Vec::with_capacity(nodes.len());
        for &node in nodes {
            if !self.document.can_remove(node) {
                refusals.note(self.remove_refusal(node));
            } else if !self.document.can_insert_control(node, dest) {
                refusals.note(self.insert_refusal(node, dest));
            } else {
                accepted.push(node);
            }
        }
        if accepted.is_empty() {
            return Err(refusals.into_error());
        }

        let names: Vec<&str> = nodes.iter().map(|&n| self.document.node(n).name()).collect();
        let name = format!("Move Controls {}", format_names(&names));
        let mut index = index;
        let mut moved = Vec::with_capacity(accepted.len());

        self.stack.begin_batch(&mut self.document, &name, accepted.len());
        for node in accepted {
            let Some(src) = self.document.parent(node) else {
                continue;
            };
            let src_index = self.document.index_of(src, node).unwrap_or_default();
            if src == dest && index > src_index {
                index -= 1;
            }
            let len = self.document.children(dest).len() - usize::from(src == dest);
            let at = index.min(len);
            if propagation::move_control(&mut self.document, &mut self.stack, node, dest, at) {
                moved.push(node);
            }
            index += 1;
        }
        self.stack.end_batch(&mut self.document);
        Ok(moved)
    }

    /// Remove `controls` and `styles` in one step. A control whose prototype
    /// is removed along with it is skipped: it goes away with the prototype.
    /// Returns how many items were removed.
    pub fn remove(
        &mut self,
        controls: &[NodeId],
        styles: &[StyleSheetId],
    ) -> Result<usize, EditError> {
        let mut refusals = Refusals::default();
        let doc = &self.document;

        let mut controls_to_remove = Vec::new();
        for &control in controls {
            if !doc.can_remove(control) {
                refusals.note(self.remove_refusal(control));
                continue;
            }
            let prototype_removed = doc
                .node(control)
                .prototype()
                .is_some_and(|p| controls.contains(&p));
            if !prototype_removed {
                controls_to_remove.push(control);
            }
        }

        let mut styles_to_remove = Vec::new();
        for &style in styles {
            match doc.style_sheet(style).package() {
                Some(package) if doc.package(package).is_read_only() => {
                    refusals.note(EditError::ReadOnly);
                }
                Some(package) => styles_to_remove.push((style, package)),
                None => refusals.note(EditError::InvalidStyle(
                    "style sheet is not in a package".to_owned(),
                )),
            }
        }

        let count = controls_to_remove.len() + styles_to_remove.len();
        if count == 0 {
            return Err(refusals.into_error());
        }

        let names: Vec<String> = controls_to_remove
            .iter()
            .map(|&c| doc.node(c).name().to_owned())
            .chain(styles_to_remove.iter().map(|&(s, _)| doc.style_sheet(s).selector_text()))
            .collect();
        let name = format!("Remove {}", format_names(&names));

        self.stack.begin_batch(&mut self.document, &name, count);
        for control in controls_to_remove {
            propagation::remove_control(&mut self.document, &mut self.stack, control);
        }
        for (style, package) in styles_to_remove {
            let index = self.document.style_index_of(package, style).unwrap_or_default();
            self.stack.exec(
                &mut self.document,
                Command::RemoveStyle {
                    style,
                    package,
                    index,
                },
            );
        }
        self.stack.end_batch(&mut self.document);
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Properties and components
    // -----------------------------------------------------------------------

    fn writable_property(&self, node: NodeId, path: PropertyPath) -> Result<(), EditError> {
        let prop = self
            .document
            .node(node)
            .properties()
            .get(path)
            .ok_or(EditError::UnknownProperty)?;
        if prop.is_read_only() || self.document.is_read_only(node) {
            return Err(EditError::ReadOnly);
        }
        Ok(())
    }

    /// Override the property at `path` on `node`.
    pub fn change_property(
        &mut self,
        node: NodeId,
        path: PropertyPath,
        value: Value,
    ) -> Result<(), EditError> {
        if let Err(err) = self.writable_property(node, path) {
            tracing::warn!(%err, ?node, ?path, "cannot change property");
            return Err(err);
        }
        let prop = self.document.node(node).properties().get(path).ok_or(EditError::UnknownProperty)?;
        if !prop.kind().accepts(&value) || !self.is_known_enum_value(prop.kind(), &value) {
            let err = EditError::InvalidValue {
                property: prop.name().to_owned(),
            };
            tracing::warn!(%err, ?value, "cannot change property");
            return Err(err);
        }
        self.stack.exec(
            &mut self.document,
            Command::change_property(node, path, Some(value)),
        );
        Ok(())
    }

    fn is_known_enum_value(&self, kind: PropertyKind, value: &Value) -> bool {
        let registry = self.document.registry();
        match (kind, value) {
            (PropertyKind::Enum(id), Value::Int(v)) => registry.enum_map(id).to_name(*v).is_some(),
            (PropertyKind::Flags(id), Value::Int(v)) => {
                let map = registry.enum_map(id);
                map.names_to_flags(map.flags_to_names(*v)) == Some(*v)
            }
            _ => true,
        }
    }

    /// Drop the override of the property at `path`. Nothing happens if it is
    /// not overridden on `node` itself.
    pub fn reset_property(&mut self, node: NodeId, path: PropertyPath) -> Result<(), EditError> {
        if let Err(err) = self.writable_property(node, path) {
            tracing::warn!(%err, ?node, ?path, "cannot reset property");
            return Err(err);
        }
        let overridden = self
            .document
            .node(node)
            .properties()
            .get(path)
            .is_some_and(|p| p.is_overridden_locally());
        if overridden {
            self.stack
                .exec(&mut self.document, Command::change_property(node, path, None));
        }
        Ok(())
    }

    /// Add a `kind` component to `node` and to every instance of it. Returns
    /// the index of the new component.
    pub fn add_component(&mut self, node: NodeId, kind: ComponentKind) -> Result<u32, EditError> {
        let err = if self.document.is_read_only(node) {
            Some(EditError::ReadOnly)
        } else if !self.document.node(node).properties().can_add_component(kind) {
            Some(EditError::CannotAddComponent(kind))
        } else {
            None
        };
        if let Some(err) = err {
            tracing::warn!(%err, ?node, "cannot add component");
            return Err(err);
        }

        let index = self.document.node(node).properties().component_count(kind);
        let name = format!("Add Component {kind}");
        self.stack.begin_batch(&mut self.document, &name, 1);
        propagation::add_component(&mut self.document, &mut self.stack, node, kind, index, None);
        self.stack.end_batch(&mut self.document);
        Ok(index)
    }

    pub fn remove_component(
        &mut self,
        node: NodeId,
        kind: ComponentKind,
        index: u32,
    ) -> Result<(), EditError> {
        let err = if self.document.is_read_only(node) {
            Some(EditError::ReadOnly)
        } else if !self
            .document
            .node(node)
            .properties()
            .can_remove_component(kind, index)
        {
            Some(EditError::CannotRemoveComponent { kind, index })
        } else {
            None
        };
        if let Some(err) = err {
            tracing::warn!(%err, ?node, "cannot remove component");
            return Err(err);
        }

        let name = format!("Remove Component {kind}");
        self.stack.begin_batch(&mut self.document, &name, 1);
        propagation::remove_component(&mut self.document, &mut self.stack, node, kind, index);
        self.stack.end_batch(&mut self.document);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Style sheets
    // -----------------------------------------------------------------------

    fn check_package_writable(&self, package: PackageId) -> Result<(), EditError> {
        if self.document.package(package).is_read_only() {
            tracing::warn!(path = self.document.package(package).path(), "package is read-only");
            return Err(EditError::ReadOnly);
        }
        Ok(())
    }

    /// Rules of read-only packages cannot be edited; detached rules can.
    fn check_style_writable(&self, style: StyleSheetId) -> Result<(), EditError> {
        match self.document.style_sheet(style).package() {
            Some(package) => self.check_package_writable(package),
            None => Ok(()),
        }
    }

    fn style_descriptor_kind(&self, index: usize) -> Result<(&'static str, PropertyKind), EditError> {
        self.document
            .registry()
            .style_properties()
            .get(index)
            .map(|d| (d.name, d.kind))
            .ok_or_else(|| EditError::InvalidStyle(format!("no style property #{index}")))
    }

    /// Insert the detached rule `style` into `package`.
    pub fn insert_style(
        &mut self,
        style: StyleSheetId,
        package: PackageId,
        index: usize,
    ) -> Result<(), EditError> {
        self.check_package_writable(package)?;
        if self.document.style_sheet(style).package().is_some() {
            let err = EditError::InvalidStyle("style sheet already belongs to a package".to_owned());
            tracing::warn!(%err, "cannot insert style");
            return Err(err);
        }
        let index = index.min(self.document.package(package).style_sheets().len());
        self.stack.exec(
            &mut self.document,
            Command::InsertStyle {
                style,
                package,
                index,
            },
        );
        Ok(())
    }

    /// Insert copies of `styles` into `package`. Returns the copies.
    pub fn copy_styles(
        &mut self,
        styles: &[StyleSheetId],
        package: PackageId,
        index: usize,
    ) -> Result<Vec<StyleSheetId>, EditError> {
        self.check_package_writable(package)?;
        if styles.is_empty() {
            return Err(EditError::Empty);
        }

        let names: Vec<String> = styles
            .iter()
            .map(|&s| self.document.style_sheet(s).selector_text())
            .collect();
        let name = format!("Copy Styles {}", format_names(&names));
        let mut index = index.min(self.document.package(package).style_sheets().len());
        let mut copies = Vec::with_capacity(styles.len());

        self.stack.begin_batch(&mut self.document, &name, styles.len());
        for &style in styles {
            let mut sheet = self.document.style_sheet(style).clone();
            sheet.package = None;
            let copy = self.document.add_style_sheet(sheet);
            self.stack.exec(
                &mut self.document,
                Command::InsertStyle {
                    style: copy,
                    package,
                    index,
                },
            );
            copies.push(copy);
            index += 1;
        }
        self.stack.end_batch(&mut self.document);
        Ok(copies)
    }

    /// Move `styles` into `package`, starting at `index` as counted before the
    /// move. Returns how many moved.
    pub fn move_styles(
        &mut self,
        styles: &[StyleSheetId],
        package: PackageId,
        index: usize,
    ) -> Result<usize, EditError> {
        self.check_package_writable(package)?;
        let mut refusals = Refusals::default();
        let mut accepted = Vec::with_capacity(styles.len());
        for &style in styles {
            match self.document.style_sheet(style).package() {
                Some(src) if self.document.package(src).is_read_only() => {
                    refusals.note(EditError::ReadOnly);
                }
                Some(src) => accepted.push((style, src)),
                None => refusals.note(EditError::InvalidStyle(
                    "style sheet is not in a package".to_owned(),
                )),
            }
        }
        if accepted.is_empty() {
            return Err(refusals.into_error());
        }

        let names: Vec<String> = styles
            .iter()
            .map(|&s| self.document.style_sheet(s).selector_text())
            .collect();
        let name = format!("Move Styles {}", format_names(&names));
        let mut index = index;

        self.stack.begin_batch(&mut self.document, &name, accepted.len() * 2);
        for &(style, src) in &accepted {
            let src_index = self.document.style_index_of(src, style).unwrap_or_default();
            if src == package && index > src_index {
                index -= 1;
            }
            self.stack.exec(
                &mut self.document,
                Command::RemoveStyle {
                    style,
                    package: src,
                    index: src_index,
                },
            );
            let at = index.min(self.document.package(package).style_sheets().len());
            self.stack.exec(
                &mut self.document,
                Command::InsertStyle {
                    style,
                    package,
                    index: at,
                },
            );
            index += 1;
        }
        self.stack.end_batch(&mut self.document);
        Ok(accepted.len())
    }

    /// Change the value and transition of a property the rule already sets.
    pub fn change_style_property(
        &mut self,
        style: StyleSheetId,
        index: usize,
        value: Value,
        transition: Option<TransitionSpec>,
    ) -> Result<(), EditError> {
        self.check_style_writable(style)?;
        let (name, kind) = self.style_descriptor_kind(index)?;
        if self.document.style_sheet(style).property(index).is_none() {
            return Err(EditError::InvalidStyle(format!("rule does not set '{name}'")));
        }
        if !kind.accepts(&value) || !self.is_known_enum_value(kind, &value) {
            let err = EditError::InvalidValue {
                property: name.to_owned(),
            };
            tracing::warn!(%err, ?value, "cannot change style property");
            return Err(err);
        }
        let mut property = StyleProperty::new(index, value);
        property.transition = transition;
        self.stack.exec(
            &mut self.document,
            Command::ChangeStyleProperty {
                style,
                property,
                previous: None,
            },
        );
        Ok(())
    }

    /// Make the rule set style property `index` to its default value.
    pub fn add_style_property(&mut self, style: StyleSheetId, index: usize) -> Result<(), EditError> {
        self.check_style_writable(style)?;
        let (name, _) = self.style_descriptor_kind(index)?;
        if self.document.style_sheet(style).property(index).is_some() {
            let err = EditError::InvalidStyle(format!("rule already sets '{name}'"));
            tracing::warn!(%err, "cannot add style property");
            return Err(err);
        }
        let default = self.document.registry().style_property(index).default.clone();
        self.stack.exec(
            &mut self.document,
            Command::AddStyleProperty {
                style,
                property: StyleProperty::new(index, default),
            },
        );
        Ok(())
    }

    pub fn remove_style_property(
        &mut self,
        style: StyleSheetId,
        index: usize,
    ) -> Result<(), EditError> {
        self.check_style_writable(style)?;
        let (name, _) = self.style_descriptor_kind(index)?;
        if self.document.style_sheet(style).property(index).is_none() {
            let err = EditError::InvalidStyle(format!("rule does not set '{name}'"));
            tracing::warn!(%err, "cannot remove style property");
            return Err(err);
        }
        self.stack.exec(
            &mut self.document,
            Command::RemoveStyleProperty {
                style,
                index,
                removed: None,
            },
        );
        Ok(())
    }

    /// Append the selector chain `text` to the rule.
    pub fn add_style_selector(&mut self, style: StyleSheetId, text: &str) -> Result<(), EditError> {
        self.check_style_writable(style)?;
        let selector = parse_selector(text).map_err(|err| {
            tracing::warn!(%err, text, "cannot add style selector");
            EditError::InvalidStyle(err.to_string())
        })?;
        let index = self.document.style_sheet(style).selectors().len();
        self.stack.exec(
            &mut self.document,
            Command::AddStyleSelector {
                style,
                index,
                selector,
            },
        );
        Ok(())
    }

    /// Remove selector chain `index`. A rule keeps at least one chain.
    pub fn remove_style_selector(
        &mut self,
        style: StyleSheetId,
        index: usize,
    ) -> Result<(), EditError> {
        self.check_style_writable(style)?;
        let count = self.document.style_sheet(style).selectors().len();
        let err = if index >= count {
            Some(EditError::InvalidStyle(format!("no selector #{index}")))
        } else if count == 1 {
            Some(EditError::InvalidStyle("a rule needs a selector".to_owned()))
        } else {
            None
        };
        if let Some(err) = err {
            tracing::warn!(%err, "cannot remove style selector");
            return Err(err);
        }
        self.stack.exec(
            &mut self.document,
            Command::RemoveStyleSelector {
                style,
                index,
                removed: None,
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Imported packages
    // -----------------------------------------------------------------------

    /// Load the packages at `paths` and import them into the edited package.
    /// Returns the packages imported.
    pub fn add_imported_packages(&mut self, paths: &[&str]) -> Result<Vec<PackageId>, EditError> {
        let root = self.document.root();
        let mut refusals = Refusals::default();
        let mut accepted: Vec<PackageId> = Vec::new();
        let mut created = Vec::new();

        self.document.begin_update();
        for &path in paths {
            let root_path = self.document.package(root).path();
            if path == root_path || self.document.find_imported_package(root, path).is_some() {
                refusals.note(EditError::CannotImport(path.to_owned()));
                continue;
            }
            match codec::load_package(&mut self.document, path, self.source.as_ref()) {
                Ok((package, new)) => {
                    created.extend(new);
                    if !accepted.contains(&package)
                        && self.document.can_insert_imported_package(root, package)
                    {
                        accepted.push(package);
                    } else {
                        refusals.note(EditError::CannotImport(path.to_owned()));
                    }
                }
                Err(err) => refusals.note(err.into()),
            }
        }

        if !accepted.is_empty() {
            self.stack
                .begin_batch(&mut self.document, "Insert Packages", accepted.len());
            for &imported in &accepted {
                self.exec_insert_imported(root, imported);
            }
            self.stack.end_batch(&mut self.document);
        }
        self.document.discard_unreferenced_packages(&created);
        self.document.end_update();

        if accepted.is_empty() {
            return Err(refusals.into_error());
        }
        Ok(accepted)
    }

    fn exec_insert_imported(&mut self, package: PackageId, imported: PackageId) {
        let index = self.document.package(package).imported_packages().len();
        self.stack.exec(
            &mut self.document,
            Command::InsertImportedPackage {
                package,
                imported,
                index,
            },
        );
    }

    /// Stop importing `packages`. A package some control of the edited
    /// package still depends on is kept. Returns how many were removed.
    pub fn remove_imported_packages(&mut self, packages: &[PackageId]) -> Result<usize, EditError> {
        let doc = &self.document;
        let root = doc.root();
        let roots = doc.package_roots(root);
        let mut refusals = Refusals::default();
        let mut accepted = Vec::new();
        for &package in packages {
            let path = doc.package(package).path().to_owned();
            if !doc.package(root).imported_packages().contains(&package) {
                refusals.note(EditError::NotImported(path));
            } else if roots.iter().any(|&c| doc.is_depends_on_package(c, package)) {
                refusals.note(EditError::PackageInUse(path));
            } else {
                accepted.push(package);
            }
        }
        if accepted.is_empty() {
            return Err(refusals.into_error());
        }

        self.stack
            .begin_batch(&mut self.document, "Remove Imported Packages", accepted.len());
        for &imported in &accepted {
            self.stack.exec(
                &mut self.document,
                Command::RemoveImportedPackage {
                    package: root,
                    imported,
                    index: 0,
                },
            );
        }
        self.stack.end_batch(&mut self.document);
        Ok(accepted.len())
    }

    // -----------------------------------------------------------------------
    // Clipboard
    // -----------------------------------------------------------------------

    /// Clipboard text for `controls` and `styles`.
    pub fn copy(&self, controls: &[NodeId], styles: &[StyleSheetId]) -> String {
        codec::copy_to_text(&self.document, controls, styles)
    }

    /// Insert the controls of clipboard `text` into `dest`. Packages the text
    /// imports are imported too, unless that is not allowed; controls that
    /// need such a package are dropped. Returns the inserted controls.
    pub fn paste(
        &mut self,
        dest: ContainerId,
        index: usize,
        text: &str,
    ) -> Result<Vec<NodeId>, EditError> {
        if self.document.is_container_read_only(dest) {
            tracing::warn!(?dest, "cannot paste into a read-only container");
            return Err(EditError::ReadOnly);
        }
        self.document.begin_update();
        let result = self.paste_controls(dest, index, text);
        self.document.end_update();
        result
    }

    fn paste_controls(
        &mut self,
        dest: ContainerId,
        index: usize,
        text: &str,
    ) -> Result<Vec<NodeId>, EditError> {
        let output = codec::paste_from_text(&mut self.document, text, self.source.as_ref())?;
        let root = self.document.root();

        let mut accepted_packages = Vec::new();
        let mut declined_packages = Vec::new();
        for &package in &output.imported {
            if package == root || self.document.package(root).imported_packages().contains(&package) {
                continue;
            }
            if self.document.can_insert_imported_package(root, package) {
                accepted_packages.push(package);
            } else {
                declined_packages.push(package);
            }
        }

        let mut refusals = Refusals::default();
        let mut accepted = Vec::new();
        for &control in &output.controls {
            let declined = declined_packages
                .iter()
                .copied()
                .find(|&p| self.document.is_depends_on_package(control, p));
            if !self.document.can_insert_control(control, dest) {
                refusals.note(self.insert_refusal(control, dest));
            } else if let Some(package) = declined {
                let path = self.document.package(package).path().to_owned();
                refusals.note(EditError::CannotImport(path));
            } else {
                accepted.push(control);
            }
        }
        for &control in &output.controls {
            if !accepted.contains(&control) {
                self.document.discard_node(control);
            }
        }
        for &style in &output.styles {
            self.document.discard_style_sheet(style);
        }

        if !accepted.is_empty() {
            self.stack
                .begin_batch(&mut self.document, "Paste", accepted.len() + accepted_packages.len());
            for &package in &accepted_packages {
                self.exec_insert_imported(root, package);
            }
            let mut index = self.clamp(dest, index);
            for &control in &accepted {
                propagation::insert_control(&mut self.document, &mut self.stack, control, dest, index);
                index += 1;
            }
            self.stack.end_batch(&mut self.document);
        }
        self.document.discard_unreferenced_packages(&output.created_packages);

        if accepted.is_empty() {
            return Err(refusals.into_error());
        }
        Ok(accepted)
    }

    /// Insert the style rules of clipboard `text` into `package`.
    pub fn paste_styles(
        &mut self,
        package: PackageId,
        index: usize,
        text: &str,
    ) -> Result<Vec<StyleSheetId>, EditError> {
        self.check_package_writable(package)?;
        self.document.begin_update();
        let result = self.paste_style_sheets(package, index, text);
        self.document.end_update();
        result
    }

    fn paste_style_sheets(
        &mut self,
        package: PackageId,
        index: usize,
        text: &str,
    ) -> Result<Vec<StyleSheetId>, EditError> {
        let output = codec::paste_from_text(&mut self.document, text, self.source.as_ref())?;
        for &control in &output.controls {
            self.document.discard_node(control);
        }

        if !output.styles.is_empty() {
            self.stack
                .begin_batch(&mut self.document, "Paste", output.styles.len());
            let mut index = index.min(self.document.package(package).style_sheets().len());
            for &style in &output.styles {
                self.stack.exec(
                    &mut self.document,
                    Command::InsertStyle {
                        style,
                        package,
                        index,
                    },
                );
                index += 1;
            }
            self.stack.end_batch(&mut self.document);
        }
        self.document.discard_unreferenced_packages(&output.created_packages);

        if output.styles.is_empty() {
            return Err(EditError::Empty);
        }
        Ok(output.styles)
    }

    // -----------------------------------------------------------------------
    // History and saving
    // -----------------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        self.stack.undo(&mut self.document)
    }

    pub fn redo(&mut self) -> bool {
        self.stack.redo(&mut self.document)
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn undo_text(&self) -> Option<&str> {
        self.stack.undo_text()
    }

    pub fn redo_text(&self) -> Option<&str> {
        self.stack.redo_text()
    }

    pub fn set_clean(&mut self) {
        self.stack.set_clean();
    }

    pub fn is_clean(&self) -> bool {
        self.stack.is_clean()
    }

    /// The edited package as text, in the configured format version. Marks
    /// the history clean.
    pub fn save(&mut self) -> String {
        let text = codec::save_document_with_version(&self.document, self.config.format_version);
        self.stack.set_clean();
        text
    }

    /// Free detached nodes no undo step can bring back.
    pub fn collect_garbage(&mut self) -> usize {
        let retained = self.stack.referenced_nodes();
        self.document.collect_garbage(&retained)
    }

    // -----------------------------------------------------------------------
    // Pass-through
    // -----------------------------------------------------------------------

    pub fn subscribe(&mut self, listener: Box<dyn PackageListener>) -> ListenerId {
        self.document.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.document.unsubscribe(id)
    }

    pub fn add_global_class(&mut self, class: &str) -> bool {
        self.document.add_global_class(class)
    }

    pub fn remove_global_class(&mut self, class: &str) -> bool {
        self.document.remove_global_class(class)
    }

    pub fn set_control_state(&mut self, node: NodeId, state: ControlState) {
        self.document.set_control_state(node, state);
    }

    pub fn advance_transitions(&mut self, dt: f64) {
        self.document.advance_transitions(dt);
    }
}
