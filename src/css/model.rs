//! Selector model: simple selectors, compounds, combinators and chains.

use std::fmt;

/// A single selector component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectorComponent {
    /// Type selector: matches the control class name (e.g. `UIButton`).
    Type(String),
    /// Universal selector: `*`.
    Universal,
    /// Style class selector: `.classname`.
    Class(String),
    /// Name selector: `#name`.
    Id(String),
    /// Control state: `?hover`, `?pressed`.
    State(String),
}

impl fmt::Display for SelectorComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorComponent::Type(name) => f.write_str(name),
            SelectorComponent::Universal => f.write_str("*"),
            SelectorComponent::Class(name) => write!(f, ".{name}"),
            SelectorComponent::Id(name) => write!(f, "#{name}"),
            SelectorComponent::State(name) => write!(f, "?{name}"),
        }
    }
}

/// A combinator between compound selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Descendant combinator (whitespace): `A B`.
    Descendant,
    /// Child combinator: `A > B`.
    Child,
}

/// A sequence of components with no combinator between them.
///
/// `UIButton.warning?pressed` is one compound with three components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompoundSelector {
    pub components: Vec<SelectorComponent>,
}

impl CompoundSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, component: SelectorComponent) {
        self.components.push(component);
    }

    /// Returns `true` if this compound is `*` alone.
    pub fn is_universal(&self) -> bool {
        self.components.len() == 1
            && matches!(self.components[0], SelectorComponent::Universal)
    }

    /// Style classes this compound requires.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.components.iter().filter_map(|c| match c {
            SelectorComponent::Class(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for CompoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

/// One element of a selector chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectorPart {
    Compound(CompoundSelector),
    Combinator(Combinator),
}

/// A selector chain: compounds joined by combinators.
///
/// `Dialog > UIButton.warning` has parts
/// `[Compound(Dialog), Combinator(Child), Compound(UIButton.warning)]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    /// Alternating compounds and combinators; starts and ends with a compound.
    pub parts: Vec<SelectorPart>,
}

impl Selector {
    /// A chain consisting of a single compound.
    pub fn single(compound: CompoundSelector) -> Self {
        Self {
            parts: vec![SelectorPart::Compound(compound)],
        }
    }

    pub fn compounds(&self) -> impl Iterator<Item = &CompoundSelector> {
        self.parts.iter().filter_map(|p| match p {
            SelectorPart::Compound(c) => Some(c),
            SelectorPart::Combinator(_) => None,
        })
    }

    /// Every style class mentioned anywhere in the chain.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.compounds().flat_map(CompoundSelector::classes)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                SelectorPart::Compound(c) => write!(f, "{c}")?,
                SelectorPart::Combinator(Combinator::Descendant) => f.write_str(" ")?,
                SelectorPart::Combinator(Combinator::Child) => f.write_str(" > ")?,
            }
        }
        Ok(())
    }
}

/// Format a selector list the way it is written in a style sheet: `A, B.c`.
pub fn format_selector_list(selectors: &[Selector]) -> String {
    selectors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compound(components: Vec<SelectorComponent>) -> CompoundSelector {
        CompoundSelector { components }
    }

    #[test]
    fn compound_display() {
        let c = compound(vec![
            SelectorComponent::Type("UIButton".into()),
            SelectorComponent::Class("warning".into()),
            SelectorComponent::State("pressed".into()),
        ]);
        assert_eq!(c.to_string(), "UIButton.warning?pressed");
    }

    #[test]
    fn selector_display_with_combinators() {
        let sel = Selector {
            parts: vec![
                SelectorPart::Compound(compound(vec![SelectorComponent::Id("Dialog".into())])),
                SelectorPart::Combinator(Combinator::Child),
                SelectorPart::Compound(compound(vec![SelectorComponent::Universal])),
                SelectorPart::Combinator(Combinator::Descendant),
                SelectorPart::Compound(compound(vec![SelectorComponent::Class("a".into())])),
            ],
        };
        assert_eq!(sel.to_string(), "#Dialog > * .a");
    }

    #[test]
    fn collects_classes() {
        let sel = Selector {
            parts: vec![
                SelectorPart::Compound(compound(vec![SelectorComponent::Class("a".into())])),
                SelectorPart::Combinator(Combinator::Descendant),
                SelectorPart::Compound(compound(vec![
                    SelectorComponent::Type("UIControl".into()),
                    SelectorComponent::Class("b".into()),
                ])),
            ],
        };
        assert_eq!(sel.classes().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn universal_detection() {
        assert!(compound(vec![SelectorComponent::Universal]).is_universal());
        assert!(!CompoundSelector::new().is_universal());
    }

    #[test]
    fn list_formatting() {
        let a = Selector::single(compound(vec![SelectorComponent::Type("A".into())]));
        let b = Selector::single(compound(vec![SelectorComponent::Class("b".into())]));
        assert_eq!(format_selector_list(&[a, b]), "A, .b");
    }
}
