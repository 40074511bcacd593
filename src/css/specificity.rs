//! Specificity tuple calculation and comparison.
//!
//! Specificity determines which style rule wins when several rules match the
//! same control. The 5-tuple model is:
//!
//! ```text
//! (priority, id_count, class_count, type_count, source_order)
//! ```
//!
//! Fields are ordered so that `Ord` (lexicographic) gives the cascade order:
//! - Rules from nearer packages beat rules from farther imports
//! - More names (`#name`) beat fewer
//! - More classes/states beat fewer
//! - More type selectors beat fewer
//! - Later source order wins as tie-breaker

use crate::css::model::{Selector, SelectorComponent};

/// Rule specificity, ordered from highest to lowest significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Specificity {
    /// Package priority: `u8::MAX` for the edited package, one less per import level.
    pub priority: u8,
    /// Number of name selectors (`#name`).
    pub id_count: u16,
    /// Number of class and state selectors (`.warning`, `?hover`).
    pub class_count: u16,
    /// Number of type selectors (`UIButton`).
    pub type_count: u16,
    /// Source order across the collected packages (later rules have higher values).
    pub source_order: u32,
}

impl Specificity {
    /// Priority for a package `depth` import levels below the edited package.
    pub fn priority_for_depth(depth: usize) -> u8 {
        u8::MAX.saturating_sub(u8::try_from(depth).unwrap_or(u8::MAX))
    }

    /// Compute specificity from a parsed selector chain.
    pub fn from_selector(selector: &Selector, priority: u8, source_order: u32) -> Self {
        let mut id_count: u16 = 0;
        let mut class_count: u16 = 0;
        let mut type_count: u16 = 0;

        for compound in selector.compounds() {
            for component in &compound.components {
                match component {
                    SelectorComponent::Id(_) => id_count += 1,
                    SelectorComponent::Class(_) | SelectorComponent::State(_) => class_count += 1,
                    SelectorComponent::Type(_) => type_count += 1,
                    SelectorComponent::Universal => {}
                }
            }
        }

        Self {
            priority,
            id_count,
            class_count,
            type_count,
            source_order,
        }
    }
}
