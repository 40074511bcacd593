//! Undoable editing: reversible commands, the history stack, prototype
//! fan-out and the [`Editor`] façade that ties them to a document.

pub mod commands;
pub mod executor;
mod propagation;
pub mod stack;

pub use commands::Command;
pub use executor::Editor;
pub use stack::{Batch, CommandStack};
