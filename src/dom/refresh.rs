//! The refresh pipeline: effective values, two-phase property refresh and the
//! re-entrancy guard that defers style work to the end of the outermost batch.

use super::node::{ControlState, NodeId, PackageId};
use super::tree::Document;
use crate::event::Change;
use crate::property::PropertyPath;
use crate::registry::{Value, CLASSES_PROPERTY};

/// Batch depth plus the work deferred until it drops back to zero.
#[derive(Debug, Default)]
pub(crate) struct UpdateState {
    depth: usize,
    dirty_roots: Vec<NodeId>,
    dirty_packages: Vec<PackageId>,
}

impl Document {
    // -----------------------------------------------------------------------
    // Re-entrancy guard
    // -----------------------------------------------------------------------

    /// Open an update scope. Style refreshes requested inside it run once,
    /// when the outermost scope ends.
    pub fn begin_update(&mut self) {
        self.update.depth += 1;
    }

    /// Close an update scope. The outermost one flushes deferred refreshes and
    /// publishes the collected changes.
    ///
    /// # Panics
    ///
    /// Panics if no scope is open.
    pub fn end_update(&mut self) {
        assert!(self.update.depth > 0, "end_update without begin_update");
        self.update.depth -= 1;
        if self.update.depth == 0 {
            self.flush_updates();
            self.publish();
        }
    }

    /// `true` outside any update scope.
    pub fn can_update_all(&self) -> bool {
        self.update.depth == 0
    }

    /// Restyle the subtree of `node` now, or at the end of the current scope.
    pub(crate) fn request_styles_refresh(&mut self, node: NodeId) {
        if !self.is_in_hierarchy(node) {
            return;
        }
        if !self.update.dirty_roots.contains(&node) {
            self.update.dirty_roots.push(node);
        }
        if self.can_update_all() {
            self.flush_updates();
        }
    }

    /// Recompile the rules of `package` and of every package importing it,
    /// then restyle their controls.
    pub(crate) fn request_package_refresh(&mut self, package: PackageId) {
        for p in self.packages_depending_on(package) {
            if !self.update.dirty_packages.contains(&p) {
                self.update.dirty_packages.push(p);
            }
        }
        if self.can_update_all() {
            self.flush_updates();
        }
    }

    fn flush_updates(&mut self) {
        // Work done here may request more work; keep it deferred.
        self.update.depth += 1;
        loop {
            if let Some(package) = self.update.dirty_packages.pop() {
                if !self.packages.contains_key(package) {
                    continue;
                }
                self.rebuild_style_sheets(package);
                for root in self.package_roots(package) {
                    if !self.update.dirty_roots.contains(&root) {
                        self.update.dirty_roots.push(root);
                    }
                }
                continue;
            }
            if !self.update.dirty_roots.is_empty() {
                let root = self.update.dirty_roots.remove(0);
                if self.contains(root) && self.is_in_hierarchy(root) {
                    self.refresh_styles(root);
                }
                continue;
            }
            break;
        }
        self.update.depth -= 1;
    }

    // -----------------------------------------------------------------------
    // Effective values
    // -----------------------------------------------------------------------

    /// The node a property at `path` inherits from: the component section's
    /// prototype for component fields, the node's prototype otherwise.
    fn inheritance_source(&self, node: NodeId, path: PropertyPath) -> Option<NodeId> {
        let n = &self.nodes[node];
        match path {
            PropertyPath::Component { kind, index, .. } => {
                n.properties.find_component(kind, index)?.prototype()
            }
            _ => n.prototype,
        }
    }

    /// The nearest override of `path` along the prototype chain of `node`,
    /// not counting `node` itself.
    pub fn inherited_override(&self, node: NodeId, path: PropertyPath) -> Option<&Value> {
        let mut current = self.inheritance_source(node, path);
        while let Some(source) = current {
            let prop = self.nodes.get(source)?.properties.get(path)?;
            if let Some(value) = prop.local_value() {
                return Some(value);
            }
            current = self.inheritance_source(source, path);
        }
        None
    }

    /// Whether `path` on `node` is overridden locally or by its prototype chain.
    pub fn is_property_overridden(&self, node: NodeId, path: PropertyPath) -> bool {
        self.nodes[node]
            .properties
            .get(path)
            .is_some_and(|p| p.is_overridden_locally())
            || self.inherited_override(node, path).is_some()
    }

    /// Local override, else prototype override, else style value, else default.
    pub fn effective_value(&self, node: NodeId, path: PropertyPath) -> Option<Value> {
        let prop = self.nodes[node].properties.get(path)?;
        let value = prop
            .local_value()
            .or_else(|| self.inherited_override(node, path))
            .or_else(|| prop.style_value())
            .unwrap_or_else(|| prop.default_value());
        Some(value.clone())
    }

    // -----------------------------------------------------------------------
    // Property refresh
    // -----------------------------------------------------------------------

    /// Recompute the current value of one property, then the values that
    /// depend on it.
    pub fn refresh_property(&mut self, node: NodeId, path: PropertyPath) {
        let Some(value) = self.effective_value(node, path) else {
            return;
        };
        let overridden = self.is_property_overridden(node, path);
        self.transitions.cancel(node, path);

        let n = &mut self.nodes[node];
        let Some(prop) = n.properties.get_mut(path) else {
            return;
        };
        let style_index = prop.style_index();
        let from_style = prop.style_value().is_some() && !overridden;
        let changed = prop.set_current(value.clone());
        if let Some(index) = style_index {
            n.control.local_set.set(index, overridden);
            n.control.styled_set.set(index, from_style);
        }
        if changed {
            self.changes.push(Change::PropertyChanged { node, path });
        }

        let is_classes = matches!(path, PropertyPath::Control { .. })
            && self.nodes[node]
                .properties
                .get(path)
                .is_some_and(|p| p.name() == CLASSES_PROPERTY);
        if is_classes {
            let text = value.as_str().unwrap_or("");
            if self.nodes[node].control.set_classes_from(text) {
                self.request_styles_refresh(node);
            }
        } else if path == PropertyPath::Name && changed {
            self.request_styles_refresh(node);
        }
    }

    /// Refresh `path` on `node` and on every registered instance inheriting it,
    /// recursively.
    pub fn refresh_property_in_instances(&mut self, node: NodeId, path: PropertyPath) {
        self.refresh_property(node, path);
        let instances = self.nodes[node].instances.clone();
        for instance in instances {
            let inherits = match path {
                PropertyPath::Component { kind, index, .. } => self.nodes[instance]
                    .properties
                    .find_component(kind, index)
                    .is_some_and(|s| s.prototype() == Some(node)),
                _ => true,
            };
            if inherits {
                self.refresh_property_in_instances(instance, path);
            }
        }
    }

    /// Refresh every property of one node.
    pub(crate) fn refresh_node_properties(&mut self, node: NodeId) {
        for path in self.nodes[node].properties.paths() {
            self.refresh_property(node, path);
        }
    }

    /// Refresh every property of every node in the subtree.
    pub(crate) fn refresh_subtree_properties(&mut self, root: NodeId) {
        for id in self.walk_depth_first(root) {
            self.refresh_node_properties(id);
        }
    }

    // -----------------------------------------------------------------------
    // Control state and transitions
    // -----------------------------------------------------------------------

    /// Change the interaction state matched by `?state` selectors.
    pub fn set_control_state(&mut self, node: NodeId, state: ControlState) {
        if self.nodes[node].control.state == state {
            return;
        }
        self.nodes[node].control.state = state;
        self.request_styles_refresh(node);
    }

    /// Advance running style transitions by `dt` seconds and publish the
    /// resulting property changes.
    pub fn advance_transitions(&mut self, dt: f64) {
        for (node, path, value) in self.transitions.advance(dt) {
            let Some(prop) = self.nodes.get_mut(node).and_then(|n| n.properties.get_mut(path))
            else {
                continue;
            };
            if prop.set_current(value) {
                self.changes.push(Change::PropertyChanged { node, path });
            }
        }
        self.publish();
    }
}
