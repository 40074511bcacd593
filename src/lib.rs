//! # uipack
//!
//! Document model for a UI package editor.
//!
//! A document is a set of packages. Each package holds style sheets,
//! prototypes and controls, and may import other packages read-only. Controls
//! created from a prototype mirror its structure and inherit its property
//! values until they override them; style rules cascade onto controls by
//! class, type, name and state, optionally animating the change.
//!
//! ## Core Systems
//!
//! - **[`registry`]** - Control classes, components, enums and style properties
//! - **[`property`]** - Per-control property trees with local overrides
//! - **[`dom`]** - Slotmap-backed arena of packages, controls and style sheets
//! - **[`css`]** - Selector tokenizer and parser, specificity, cascade, transitions
//! - **[`event`]** - Change sets published to document listeners
//! - **[`command`]** - Reversible commands, undo history and the [`Editor`]
//! - **[`codec`]** - Package text loading and saving, clipboard text
//!
//! ```no_run
//! use std::rc::Rc;
//! use uipack::{codec::FsSource, Editor, EditorConfig, Registry};
//!
//! let registry = Rc::new(Registry::with_defaults());
//! let mut editor = Editor::open(registry, "Main.yaml", FsSource::new("ui"), EditorConfig::new())?;
//! editor.undo();
//! let text = editor.save();
//! # let _ = text;
//! # Ok::<(), uipack::LoadError>(())
//! ```

// Foundation
pub mod config;
pub mod error;
pub mod registry;

// Document model
pub mod css;
pub mod dom;
pub mod property;

// Editing
pub mod command;
pub mod event;

// Persistence
pub mod codec;

pub use command::Editor;
pub use config::EditorConfig;
pub use dom::Document;
pub use error::{EditError, LoadError};
pub use registry::Registry;
