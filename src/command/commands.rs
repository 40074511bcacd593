//! Reversible document mutations.
//!
//! Each variant captures what it needs to invert itself the first time it
//! runs, so `undo` is a pure inverse of the last `redo`.

use crate::css::model::Selector;
use crate::css::stylesheet::StyleProperty;
use crate::dom::{ContainerId, Document, NodeId, PackageId, StyleSheetId};
use crate::property::{ComponentSection, PropertyPath};
use crate::registry::{ComponentKind, Value};

#[derive(Debug, Clone)]
pub enum Command {
    InsertControl {
        node: NodeId,
        dest: ContainerId,
        index: usize,
    },
    RemoveControl {
        node: NodeId,
        from: ContainerId,
        index: usize,
    },
    /// `value: None` resets the property.
    ChangeProperty {
        node: NodeId,
        path: PropertyPath,
        value: Option<Value>,
        previous: Option<Value>,
    },
    AddComponent {
        node: NodeId,
        section: ComponentSection,
    },
    RemoveComponent {
        node: NodeId,
        kind: ComponentKind,
        index: u32,
        removed: Option<ComponentSection>,
    },
    /// Wire (or with `prototype: None`, unwire) a section to the section with
    /// the same kind and index on `prototype`.
    AttachComponentPrototype {
        node: NodeId,
        kind: ComponentKind,
        index: u32,
        prototype: Option<NodeId>,
        previous: (Option<NodeId>, bool),
    },
    InsertStyle {
        style: StyleSheetId,
        package: PackageId,
        index: usize,
    },
    RemoveStyle {
        style: StyleSheetId,
        package: PackageId,
        index: usize,
    },
    ChangeStyleProperty {
        style: StyleSheetId,
        property: StyleProperty,
        previous: Option<StyleProperty>,
    },
    AddStyleProperty {
        style: StyleSheetId,
        property: StyleProperty,
    },
    RemoveStyleProperty {
        style: StyleSheetId,
        index: usize,
        removed: Option<StyleProperty>,
    },
    AddStyleSelector {
        style: StyleSheetId,
        index: usize,
        selector: Selector,
    },
    RemoveStyleSelector {
        style: StyleSheetId,
        index: usize,
        removed: Option<Selector>,
    },
    InsertImportedPackage {
        package: PackageId,
        imported: PackageId,
        index: usize,
    },
    RemoveImportedPackage {
        package: PackageId,
        imported: PackageId,
        index: usize,
    },
}

impl Command {
    pub fn insert_control(node: NodeId, dest: ContainerId, index: usize) -> Self {
        Command::InsertControl { node, dest, index }
    }

    pub fn remove_control(node: NodeId, from: ContainerId, index: usize) -> Self {
        Command::RemoveControl { node, from, index }
    }

    pub fn change_property(node: NodeId, path: PropertyPath, value: Option<Value>) -> Self {
        Command::ChangeProperty {
            node,
            path,
            value,
            previous: None,
        }
    }

    pub fn remove_component(node: NodeId, kind: ComponentKind, index: u32) -> Self {
        Command::RemoveComponent {
            node,
            kind,
            index,
            removed: None,
        }
    }

    pub fn attach_component_prototype(
        node: NodeId,
        kind: ComponentKind,
        index: u32,
        prototype: Option<NodeId>,
    ) -> Self {
        Command::AttachComponentPrototype {
            node,
            kind,
            index,
            prototype,
            previous: (None, false),
        }
    }

    /// Human readable name, used for single-command undo entries.
    pub fn name(&self) -> &'static str {
        match self {
            Command::InsertControl { .. } => "Insert Control",
            Command::RemoveControl { .. } => "Remove Control",
            Command::ChangeProperty { value: Some(_), .. } => "Change Property",
            Command::ChangeProperty { value: None, .. } => "Reset Property",
            Command::AddComponent { .. } => "Add Component",
            Command::RemoveComponent { .. } => "Remove Component",
            Command::AttachComponentPrototype { prototype: Some(_), .. } => "Attach Component",
            Command::AttachComponentPrototype { prototype: None, .. } => "Detach Component",
            Command::InsertStyle { .. } => "Insert Style",
            Command::RemoveStyle { .. } => "Remove Style",
            Command::ChangeStyleProperty { .. } => "Change Style Property",
            Command::AddStyleProperty { .. } => "Add Style Property",
            Command::RemoveStyleProperty { .. } => "Remove Style Property",
            Command::AddStyleSelector { .. } => "Add Style Selector",
            Command::RemoveStyleSelector { .. } => "Remove Style Selector",
            Command::InsertImportedPackage { .. } => "Insert Imported Package",
            Command::RemoveImportedPackage { .. } => "Remove Imported Package",
        }
    }

    /// Control nodes this command may bring back into a document. They must
    /// survive garbage collection while the command is on a stack.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        match self {
            Command::InsertControl { node, .. } | Command::RemoveControl { node, .. } => vec![*node],
            Command::ChangeProperty { node, .. }
            | Command::RemoveComponent { node, .. }
            | Command::AddComponent { node, .. } => vec![*node],
            Command::AttachComponentPrototype {
                node,
                prototype,
                previous,
                ..
            } => std::iter::once(*node)
                .chain(*prototype)
                .chain(previous.0)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn redo(&mut self, doc: &mut Document) {
        match self {
            Command::InsertControl { node, dest, index } => {
                doc.insert_control(*node, *dest, *index);
            }
            Command::RemoveControl { node, from, index } => {
                *index = doc.remove_control(*node, *from);
            }
            Command::ChangeProperty {
                node,
                path,
                value,
                previous,
            } => {
                *previous = doc.set_local_value(*node, *path, value.clone());
            }
            Command::AddComponent { node, section } => {
                doc.insert_component_section(*node, section.clone());
            }
            Command::RemoveComponent {
                node,
                kind,
                index,
                removed,
            } => {
                *removed = Some(doc.remove_component_section(*node, *kind, *index));
            }
            Command::AttachComponentPrototype {
                node,
                kind,
                index,
                prototype,
                previous,
            } => {
                *previous =
                    doc.set_component_link(*node, *kind, *index, *prototype, prototype.is_some());
            }
            Command::InsertStyle {
                style,
                package,
                index,
            } => doc.insert_style(*package, *index, *style),
            Command::RemoveStyle {
                style,
                package,
                index,
            } => {
                *index = doc.remove_style(*package, *style);
            }
            Command::ChangeStyleProperty {
                style,
                property,
                previous,
            } => {
                *previous = doc.set_style_property(*style, property.clone());
            }
            Command::AddStyleProperty { style, property } => {
                doc.set_style_property(*style, property.clone());
            }
            Command::RemoveStyleProperty {
                style,
                index,
                removed,
            } => {
                *removed = doc.remove_style_property(*style, *index);
            }
            Command::AddStyleSelector {
                style,
                index,
                selector,
            } => doc.insert_style_selector(*style, *index, selector.clone()),
            Command::RemoveStyleSelector {
                style,
                index,
                removed,
            } => {
                *removed = Some(doc.remove_style_selector(*style, *index));
            }
            Command::InsertImportedPackage {
                package,
                imported,
                index,
            } => doc.insert_imported(*package, *index, *imported),
            Command::RemoveImportedPackage {
                package,
                imported,
                index,
            } => {
                *index = doc.remove_imported(*package, *imported);
            }
        }
    }

    pub fn undo(&mut self, doc: &mut Document) {
        match self {
            Command::InsertControl { node, dest, .. } => {
                doc.remove_control(*node, *dest);
            }
            Command::RemoveControl { node, from, index } => {
                doc.insert_control(*node, *from, *index);
            }
            Command::ChangeProperty {
                node,
                path,
                previous,
                ..
            } => {
                doc.set_local_value(*node, *path, previous.clone());
            }
            Command::AddComponent { node, section } => {
                doc.remove_component_section(*node, section.kind(), section.index());
            }
            Command::RemoveComponent { node, removed, .. } => {
                if let Some(section) = removed.take() {
                    doc.insert_component_section(*node, section);
                }
            }
            Command::AttachComponentPrototype {
                node,
                kind,
                index,
                previous,
                ..
            } => {
                doc.set_component_link(*node, *kind, *index, previous.0, previous.1);
            }
            Command::InsertStyle { style, package, .. } => {
                doc.remove_style(*package, *style);
            }
            Command::RemoveStyle {
                style,
                package,
                index,
            } => doc.insert_style(*package, *index, *style),
            Command::ChangeStyleProperty {
                style,
                property,
                previous,
            } => match previous.clone() {
                Some(old) => {
                    doc.set_style_property(*style, old);
                }
                None => {
                    doc.remove_style_property(*style, property.index);
                }
            },
            Command::AddStyleProperty { style, property } => {
                doc.remove_style_property(*style, property.index);
            }
            Command::RemoveStyleProperty { style, removed, .. } => {
                if let Some(property) = removed.clone() {
                    doc.set_style_property(*style, property);
                }
            }
            Command::AddStyleSelector { style, index, .. } => {
                doc.remove_style_selector(*style, *index);
            }
            Command::RemoveStyleSelector {
                style,
                index,
                removed,
            } => {
                if let Some(selector) = removed.take() {
                    doc.insert_style_selector(*style, *index, selector);
                }
            }
            Command::InsertImportedPackage {
                package, imported, ..
            } => {
                doc.remove_imported(*package, *imported);
            }
            Command::RemoveImportedPackage {
                package,
                imported,
                index,
            } => doc.insert_imported(*package, *index, *imported),
        }
    }
}
