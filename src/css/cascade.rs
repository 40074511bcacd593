//! Cascade resolution: compile the style rules visible to a package, match
//! them against controls and push the winning values down as style defaults.
//!
//! Matching walks a selector chain right to left: the rightmost compound must
//! match the control itself, then each combinator moves up the control tree.

use std::collections::HashMap;

use slotmap::SecondaryMap;

use crate::css::model::{Combinator, CompoundSelector, Selector, SelectorComponent, SelectorPart};
use crate::css::specificity::Specificity;
use crate::css::stylesheet::StyleProperty;
use crate::css::transition::{Transition, TransitionSpec};
use crate::dom::{ControlState, Document, NodeId, PackageId, StyleSheetId};
use crate::event::Change;
use crate::registry::Value;

/// One selector chain of one rule, with its place in the cascade.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub selector: Selector,
    pub specificity: Specificity,
    pub style: StyleSheetId,
}

/// The rules visible to one package, strongest first.
#[derive(Debug, Clone, Default)]
pub struct CompiledStyles {
    rules: Vec<CompiledRule>,
}

impl CompiledStyles {
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}

/// Cascade context shared by a document.
#[derive(Debug, Default)]
pub struct Cascade {
    global_classes: Vec<String>,
    compiled: SecondaryMap<PackageId, CompiledStyles>,
}

impl Cascade {
    pub fn global_classes(&self) -> &[String] {
        &self.global_classes
    }

    pub fn is_global_class(&self, class: &str) -> bool {
        self.global_classes.iter().any(|c| c == class)
    }

    pub fn compiled(&self, package: PackageId) -> Option<&CompiledStyles> {
        self.compiled.get(package)
    }
}

impl Document {
    /// Packages whose rules `package` sees, with their import depth. Each path
    /// appears once, at its smallest depth.
    pub fn collect_style_packages(&self, package: PackageId) -> Vec<(PackageId, usize)> {
        let mut result: Vec<(PackageId, usize)> = Vec::new();
        let mut by_path: HashMap<&str, usize> = HashMap::new();
        let mut queue = vec![(package, 0usize)];
        // Breadth first so the first visit of a path is its shallowest.
        while !queue.is_empty() {
            let mut next = Vec::new();
            for (p, depth) in queue {
                let path = self.packages[p].path.as_str();
                if by_path.contains_key(path) {
                    continue;
                }
                by_path.insert(path, result.len());
                result.push((p, depth));
                next.extend(self.packages[p].imported.iter().map(|&i| (i, depth + 1)));
            }
            queue = next;
        }
        result
    }

    /// Recompile the rules visible to `package`.
    pub(crate) fn rebuild_style_sheets(&mut self, package: PackageId) {
        let mut rules = Vec::new();
        let mut order: u32 = 0;
        for (p, depth) in self.collect_style_packages(package) {
            let priority = Specificity::priority_for_depth(depth);
            for &style in &self.packages[p].style_sheets {
                for selector in &self.style_sheets[style].selectors {
                    rules.push(CompiledRule {
                        selector: selector.clone(),
                        specificity: Specificity::from_selector(selector, priority, order),
                        style,
                    });
                    order += 1;
                }
            }
        }
        rules.sort_by(|a, b| b.specificity.cmp(&a.specificity));
        tracing::debug!(rules = rules.len(), "style sheets rebuilt");
        self.cascade.compiled.insert(package, CompiledStyles { rules });
        self.changes.push(Change::StyleSheetsRebuilt { package });
    }

    /// Selector texts of the compiled rules of `package`, strongest first.
    pub fn compiled_selectors(&self, package: PackageId) -> Vec<String> {
        self.cascade
            .compiled(package)
            .map(|c| c.rules.iter().map(|r| r.selector.to_string()).collect())
            .unwrap_or_default()
    }

    pub fn global_classes(&self) -> &[String] {
        self.cascade.global_classes()
    }

    /// Add a class every control is considered to carry. Returns `false` if
    /// it was already set.
    pub fn add_global_class(&mut self, class: &str) -> bool {
        if self.cascade.is_global_class(class) {
            return false;
        }
        self.cascade.global_classes.push(class.to_owned());
        self.refresh_all_styles();
        true
    }

    pub fn remove_global_class(&mut self, class: &str) -> bool {
        let before = self.cascade.global_classes.len();
        self.cascade.global_classes.retain(|c| c != class);
        if self.cascade.global_classes.len() == before {
            return false;
        }
        self.refresh_all_styles();
        true
    }

    fn refresh_all_styles(&mut self) {
        let roots: Vec<NodeId> = self
            .packages
            .keys()
            .flat_map(|p| self.package_roots(p))
            .collect();
        self.begin_update();
        for root in roots {
            self.request_styles_refresh(root);
        }
        self.end_update();
    }

    /// Restyle every control of the subtree rooted at `root`.
    pub(crate) fn refresh_styles(&mut self, root: NodeId) {
        for id in self.walk_depth_first(root) {
            self.apply_styles(id);
        }
    }

    /// Resolve the style value of every styleable property of one control.
    pub(crate) fn apply_styles(&mut self, node: NodeId) {
        let Some(package) = self.package_of(node) else {
            return;
        };
        if self.cascade.compiled(package).is_none() {
            self.rebuild_style_sheets(package);
        }

        // Winning property per style index: rules are strongest first.
        let mut winners: HashMap<usize, StyleProperty> = HashMap::new();
        if let Some(compiled) = self.cascade.compiled(package) {
            for rule in &compiled.rules {
                if !self.matches_selector(&rule.selector, node) {
                    continue;
                }
                for property in &self.style_sheets[rule.style].properties {
                    winners
                        .entry(property.index)
                        .or_insert_with(|| property.clone());
                }
            }
        }

        let initialized = self.nodes[node].control.style_initialized;
        for (path, index) in self.nodes[node].properties.style_paths() {
            let winner = winners.get(&index);
            let new_style = winner.map(|w| w.value.clone());
            let overridden = self.is_property_overridden(node, path);

            let Some(prop) = self.nodes[node].properties.get_mut(path) else {
                continue;
            };
            let old_style = prop.style_value().cloned();
            prop.set_style_value(new_style.clone());
            let current = prop.value().clone();

            let n = &mut self.nodes[node];
            n.control.local_set.set(index, overridden);
            n.control.styled_set.set(index, new_style.is_some() && !overridden);

            let Some(target) = self.effective_value(node, path) else {
                continue;
            };
            let transition = winner.and_then(|w| w.transition);
            if let Some(spec) = transition.filter(|_| {
                initialized
                    && self.animate_transitions
                    && !overridden
                    && old_style != new_style
                    && current != target
                    && current.is_animatable()
                    && target.is_animatable()
            }) {
                self.start_transition(node, path, current, target, spec);
                continue;
            }

            if self
                .transitions
                .get(node, path)
                .is_some_and(|t| t.to == target)
            {
                continue;
            }
            self.transitions.cancel(node, path);
            if let Some(prop) = self.nodes[node].properties.get_mut(path) {
                if prop.set_current(target) {
                    self.changes.push(Change::PropertyChanged { node, path });
                }
            }
        }
        self.nodes[node].control.style_initialized = true;
    }

    fn start_transition(
        &mut self,
        node: NodeId,
        path: crate::property::PropertyPath,
        from: Value,
        to: Value,
        spec: TransitionSpec,
    ) {
        self.transitions.schedule(Transition {
            node,
            path,
            from,
            to,
            spec,
            elapsed: 0.0,
        });
    }

    /// Whether `selector` matches `node`, walking the chain right to left.
    pub fn matches_selector(&self, selector: &Selector, node: NodeId) -> bool {
        let mut parts = selector.parts.iter().rev();
        match parts.next() {
            Some(SelectorPart::Compound(compound)) => {
                if !self.matches_compound(compound, node) {
                    return false;
                }
            }
            _ => return false,
        }

        let mut current = node;
        while let Some(part) = parts.next() {
            let SelectorPart::Combinator(combinator) = part else {
                return false;
            };
            let Some(SelectorPart::Compound(compound)) = parts.next() else {
                return false;
            };
            match combinator {
                Combinator::Child => {
                    let Some(parent) = self.parent_control(current) else {
                        return false;
                    };
                    if !self.matches_compound(compound, parent) {
                        return false;
                    }
                    current = parent;
                }
                Combinator::Descendant => {
                    let found = self
                        .ancestors(current)
                        .into_iter()
                        .find(|&a| self.matches_compound(compound, a));
                    match found {
                        Some(ancestor) => current = ancestor,
                        None => return false,
                    }
                }
            }
        }
        true
    }

    /// Whether every component of `compound` holds for `node`.
    pub fn matches_compound(&self, compound: &CompoundSelector, node: NodeId) -> bool {
        let n = &self.nodes[node];
        compound.components.iter().all(|component| match component {
            SelectorComponent::Type(name) => n.class_name() == name,
            SelectorComponent::Universal => true,
            SelectorComponent::Class(class) => {
                n.control.has_class(class) || self.cascade.is_global_class(class)
            }
            SelectorComponent::Id(name) => n.name() == name,
            SelectorComponent::State(state) => match ControlState::from_state_name(state) {
                Some(flag) if flag.is_empty() => n.control.state.is_empty(),
                Some(flag) => n.control.state.contains(flag),
                None => false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::css::parser::{parse_selector, parse_selector_list};
    use crate::css::stylesheet::StyleSheetNode;
    use crate::dom::{ContainerId, PackageSection};
    use crate::property::PropertyPath;
    use crate::registry::{Color, Registry};
    use pretty_assertions::assert_eq;

    /// ```text
    /// Controls
    ///   Dialog (UIControl .panel)
    ///   ├── Title (UIStaticText .warning)
    ///   └── Body (UIControl)
    ///       └── Ok (UIButton)
    /// ```
    struct Fixture {
        doc: Document,
        title: NodeId,
        ok: NodeId,
    }

    fn set_classes(doc: &mut Document, node: NodeId, classes: &str) {
        let path = doc.node(node).properties().find_path("classes").unwrap();
        doc.node_mut(node)
            .properties
            .get_mut(path)
            .unwrap()
            .set_local(Some(Value::from(classes)));
        doc.refresh_property(node, path);
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new(Rc::new(Registry::with_defaults()), "Main.yaml");
        let controls = ContainerId::Section(doc.root(), PackageSection::Controls);
        let dialog = doc.create_from_class("UIControl", "Dialog").unwrap();
        let title = doc.create_from_class("UIStaticText", "Title").unwrap();
        let body = doc.create_from_class("UIControl", "Body").unwrap();
        let ok = doc.create_from_class("UIButton", "Ok").unwrap();
        doc.add(ContainerId::Control(dialog), title);
        doc.add(ContainerId::Control(dialog), body);
        doc.add(ContainerId::Control(body), ok);
        doc.add(controls, dialog);
        set_classes(&mut doc, dialog, "panel");
        set_classes(&mut doc, title, "warning");
        Fixture { doc, title, ok }
    }

    fn add_rule(doc: &mut Document, package: PackageId, selectors: &str, props: Vec<StyleProperty>) {
        let sheet = StyleSheetNode::new(parse_selector_list(selectors).unwrap(), props);
        let id = doc.add_style_sheet(sheet);
        let index = doc.package(package).style_sheets().len();
        doc.insert_style_sheet_at(package, index, id);
        doc.request_package_refresh(package);
    }

    fn text_color(doc: &Document, node: NodeId) -> Value {
        let path = doc.node(node).properties().find_path("textColor").unwrap();
        doc.node(node).properties().get(path).unwrap().value().clone()
    }

    fn text_color_index(doc: &Document) -> usize {
        doc.registry().style_property_by_name("textColor").unwrap().index
    }

    #[test]
    fn match_type_class_and_id() {
        let f = fixture();
        let doc = &f.doc;
        assert!(doc.matches_selector(&parse_selector("UIStaticText").unwrap(), f.title));
        assert!(doc.matches_selector(&parse_selector(".warning").unwrap(), f.title));
        assert!(doc.matches_selector(&parse_selector("#Ok").unwrap(), f.ok));
        assert!(!doc.matches_selector(&parse_selector("UIButton").unwrap(), f.title));
    }

    #[test]
    fn match_descendant_and_child() {
        let f = fixture();
        let doc = &f.doc;
        assert!(doc.matches_selector(&parse_selector(".panel UIButton").unwrap(), f.ok));
        assert!(!doc.matches_selector(&parse_selector(".panel > UIButton").unwrap(), f.ok));
        assert!(doc.matches_selector(&parse_selector("#Body > UIButton").unwrap(), f.ok));
        assert!(doc.matches_selector(&parse_selector("* > .warning").unwrap(), f.title));
    }

    #[test]
    fn match_states() {
        let mut f = fixture();
        let hover = parse_selector("UIButton?hover").unwrap();
        let normal = parse_selector("UIButton?normal").unwrap();
        assert!(!f.doc.matches_selector(&hover, f.ok));
        assert!(f.doc.matches_selector(&normal, f.ok));
        f.doc.set_control_state(f.ok, ControlState::HOVER);
        assert!(f.doc.matches_selector(&hover, f.ok));
        assert!(!f.doc.matches_selector(&normal, f.ok));
    }

    #[test]
    fn style_value_applies_and_sets_styled_bit() {
        let mut f = fixture();
        let root = f.doc.root();
        let idx = text_color_index(&f.doc);
        add_rule(&mut f.doc, root, ".warning", vec![StyleProperty::new(idx, Color::RED)]);
        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::RED));
        assert!(f.doc.node(f.title).control().is_styled(idx));
    }

    #[test]
    fn local_override_wins_over_style() {
        let mut f = fixture();
        let root = f.doc.root();
        let path = f.doc.node(f.title).properties().find_path("textColor").unwrap();
        f.doc
            .node_mut(f.title)
            .properties
            .get_mut(path)
            .unwrap()
            .set_local(Some(Value::Color(Color::BLUE)));
        f.doc.refresh_property(f.title, path);
        let idx = text_color_index(&f.doc);
        add_rule(&mut f.doc, root, ".warning", vec![StyleProperty::new(idx, Color::RED)]);

        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::BLUE));
        assert!(!f.doc.node(f.title).control().is_styled(idx));
        assert!(f.doc.node(f.title).control().local_properties().contains(idx));
    }

    #[test]
    fn higher_specificity_wins_regardless_of_order() {
        let mut f = fixture();
        let root = f.doc.root();
        let idx = text_color_index(&f.doc);
        add_rule(&mut f.doc, root, "UIStaticText.warning", vec![StyleProperty::new(idx, Color::GREEN)]);
        add_rule(&mut f.doc, root, ".warning", vec![StyleProperty::new(idx, Color::RED)]);
        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::GREEN));
        assert_eq!(
            f.doc.compiled_selectors(root),
            vec!["UIStaticText.warning".to_owned(), ".warning".to_owned()]
        );
    }

    #[test]
    fn imported_rules_lose_to_local_ones() {
        let mut f = fixture();
        let root = f.doc.root();
        let lib = f.doc.add_package("Lib.yaml", true);
        let idx = text_color_index(&f.doc);
        add_rule(&mut f.doc, root, ".warning", vec![StyleProperty::new(idx, Color::RED)]);
        add_rule(&mut f.doc, lib, "#Dialog UIStaticText.warning", vec![StyleProperty::new(idx, Color::GREEN)]);
        f.doc.insert_imported_at(root, 0, lib);
        f.doc.request_package_refresh(root);
        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::RED));
    }

    #[test]
    fn global_class_matches_everything() {
        let mut f = fixture();
        let root = f.doc.root();
        let idx = text_color_index(&f.doc);
        add_rule(&mut f.doc, root, ".dark UIStaticText", vec![StyleProperty::new(idx, Color::BLACK)]);
        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::WHITE));
        assert!(f.doc.add_global_class("dark"));
        assert!(!f.doc.add_global_class("dark"));
        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::BLACK));
        assert!(f.doc.remove_global_class("dark"));
        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::WHITE));
    }

    #[test]
    fn first_styling_is_instant_then_transitions() {
        let mut f = fixture();
        let root = f.doc.root();
        let idx = text_color_index(&f.doc);
        let fade = TransitionSpec::new(0.3, crate::css::transition::Interpolation::Linear);
        add_rule(
            &mut f.doc,
            root,
            ".alert",
            vec![StyleProperty::new(idx, Color::RED).with_transition(fade)],
        );
        let path: PropertyPath = f.doc.node(f.title).properties().find_path("textColor").unwrap();
        assert!(f.doc.node(f.title).control().is_style_initialized());

        set_classes(&mut f.doc, f.title, "warning alert");
        assert!(f.doc.transitions().is_animating(f.title, path));
        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::WHITE));

        f.doc.advance_transitions(0.15);
        let Value::Color(mid) = text_color(&f.doc, f.title) else {
            panic!("textColor is not a color");
        };
        assert!(mid.g < 1.0 && mid.g > 0.0);

        f.doc.advance_transitions(0.2);
        assert_eq!(text_color(&f.doc, f.title), Value::Color(Color::RED));
        assert!(f.doc.transitions().is_empty());
    }
}
