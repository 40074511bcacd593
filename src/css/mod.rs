//! Style engine: selector tokenizer and parser, specificity, style rules,
//! cascade resolution and transitions.

pub mod cascade;
pub mod model;
pub mod parser;
pub mod specificity;
pub mod stylesheet;
pub mod tokenizer;
pub mod transition;

pub use cascade::{Cascade, CompiledRule, CompiledStyles};
pub use model::{Combinator, CompoundSelector, Selector, SelectorComponent, SelectorPart};
pub use parser::{parse_selector, parse_selector_list, SelectorError};
pub use specificity::Specificity;
pub use stylesheet::{StyleProperty, StyleSheetNode};
pub use transition::{Interpolation, Transition, TransitionScheduler, TransitionSpec};
