//! Style sheet rules as stored in a package.

use crate::css::model::{format_selector_list, Selector};
use crate::css::transition::TransitionSpec;
use crate::dom::PackageId;
use crate::registry::Value;

/// One property assignment of a style rule.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleProperty {
    /// Row in the registry's style property table.
    pub index: usize,
    pub value: Value,
    pub transition: Option<TransitionSpec>,
}

impl StyleProperty {
    pub fn new(index: usize, value: impl Into<Value>) -> Self {
        Self {
            index,
            value: value.into(),
            transition: None,
        }
    }

    /// Attach a transition (builder).
    pub fn with_transition(mut self, transition: TransitionSpec) -> Self {
        self.transition = Some(transition);
        self
    }
}

/// A style rule: a list of selector chains and the properties they assign.
///
/// Properties are kept sorted by style index; a rule assigns each index at
/// most once.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSheetNode {
    pub(crate) selectors: Vec<Selector>,
    pub(crate) properties: Vec<StyleProperty>,
    pub(crate) package: Option<PackageId>,
}

impl StyleSheetNode {
    pub fn new(selectors: Vec<Selector>, properties: Vec<StyleProperty>) -> Self {
        let mut node = Self {
            selectors,
            properties: Vec::with_capacity(properties.len()),
            package: None,
        };
        for property in properties {
            node.set_property(property);
        }
        node
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// The selector list as written in a style sheet.
    pub fn selector_text(&self) -> String {
        format_selector_list(&self.selectors)
    }

    pub fn properties(&self) -> &[StyleProperty] {
        &self.properties
    }

    pub fn property(&self, index: usize) -> Option<&StyleProperty> {
        self.properties.iter().find(|p| p.index == index)
    }

    /// The package that owns this rule, if it is attached.
    pub fn package(&self) -> Option<PackageId> {
        self.package
    }

    /// Insert or replace by style index. Returns the replaced property.
    pub(crate) fn set_property(&mut self, property: StyleProperty) -> Option<StyleProperty> {
        match self.properties.binary_search_by_key(&property.index, |p| p.index) {
            Ok(pos) => Some(std::mem::replace(&mut self.properties[pos], property)),
            Err(pos) => {
                self.properties.insert(pos, property);
                None
            }
        }
    }

    pub(crate) fn remove_property(&mut self, index: usize) -> Option<StyleProperty> {
        let pos = self.properties.iter().position(|p| p.index == index)?;
        Some(self.properties.remove(pos))
    }

    pub(crate) fn insert_selector(&mut self, index: usize, selector: Selector) {
        self.selectors.insert(index.min(self.selectors.len()), selector);
    }

    pub(crate) fn remove_selector(&mut self, index: usize) -> Selector {
        self.selectors.remove(index)
    }

    /// Whether any chain of this rule mentions `class`.
    pub fn mentions_class(&self, class: &str) -> bool {
        self.selectors.iter().any(|s| s.classes().any(|c| c == class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parser::parse_selector_list;

    #[test]
    fn properties_stay_sorted_and_unique() {
        let mut sheet = StyleSheetNode::new(
            parse_selector_list(".a").unwrap(),
            vec![StyleProperty::new(6, 1.0), StyleProperty::new(2, 2.0)],
        );
        let replaced = sheet.set_property(StyleProperty::new(6, 3.0));
        assert_eq!(replaced, Some(StyleProperty::new(6, 1.0)));
        let indices: Vec<_> = sheet.properties().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![2, 6]);
    }

    #[test]
    fn selector_text_joins_chains() {
        let sheet = StyleSheetNode::new(parse_selector_list("A > B, .c").unwrap(), Vec::new());
        assert_eq!(sheet.selector_text(), "A > B, .c");
        assert!(sheet.mentions_class("c"));
        assert!(!sheet.mentions_class("A"));
    }

    #[test]
    fn selector_edits() {
        let mut sheet = StyleSheetNode::new(parse_selector_list("A").unwrap(), Vec::new());
        let extra = parse_selector_list(".x").unwrap().remove(0);
        sheet.insert_selector(0, extra.clone());
        assert_eq!(sheet.selector_text(), ".x, A");
        assert_eq!(sheet.remove_selector(0), extra);
        assert!(sheet.remove_property(3).is_none());
    }
}
