//! Undo/redo history with named, nestable batches.
//!
//! - Every executed command lands in the open batch, or in a batch of its own
//! - Nested batches coalesce into the outermost one
//! - Undo replays a batch's inverses in reverse order; redo replays forward
//! - A new batch clears the redo history

use crate::dom::{Document, NodeId};

use super::commands::Command;

/// Commands undone and redone as one unit.
#[derive(Debug, Clone)]
pub struct Batch {
    name: String,
    commands: Vec<Command>,
}

impl Batch {
    fn new(name: impl Into<String>, expected: usize) -> Self {
        Self {
            name: name.into(),
            commands: Vec::with_capacity(expected),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Undo/redo stack for one document.
#[derive(Debug)]
pub struct CommandStack {
    undo_stack: Vec<Batch>,
    redo_stack: Vec<Batch>,
    /// Maximum number of undo levels (0 = unlimited).
    max_levels: usize,
    current: Option<Batch>,
    depth: usize,
    /// Undo depth at which the document was last marked clean.
    clean_index: Option<usize>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current: None,
            depth: 0,
            clean_index: Some(0),
        }
    }

    /// Open a batch. `expected` is a capacity hint for the number of commands.
    /// Batches opened inside another one join it.
    pub fn begin_batch(&mut self, doc: &mut Document, name: &str, expected: usize) {
        if self.depth == 0 {
            self.current = Some(Batch::new(name, expected));
        }
        self.depth += 1;
        doc.begin_update();
        tracing::debug!(name, depth = self.depth, "batch begin");
    }

    /// Close the innermost batch. Closing the outermost one records it.
    ///
    /// # Panics
    ///
    /// Panics if no batch is open.
    pub fn end_batch(&mut self, doc: &mut Document) {
        assert!(self.depth > 0, "end_batch without begin_batch");
        self.depth -= 1;
        if self.depth == 0 {
            if let Some(batch) = self.current.take() {
                tracing::debug!(name = batch.name(), commands = batch.len(), "batch end");
                if !batch.is_empty() {
                    self.push_batch(batch);
                }
            }
        }
        doc.end_update();
    }

    pub fn is_in_batch(&self) -> bool {
        self.depth > 0
    }

    /// Run `command` and record it.
    pub fn exec(&mut self, doc: &mut Document, mut command: Command) {
        doc.begin_update();
        command.redo(doc);
        match &mut self.current {
            Some(batch) => batch.commands.push(command),
            None => {
                let mut batch = Batch::new(command.name(), 1);
                batch.commands.push(command);
                self.push_batch(batch);
            }
        }
        doc.end_update();
    }

    fn push_batch(&mut self, batch: Batch) {
        self.undo_stack.push(batch);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
            self.clean_index = self.clean_index.and_then(|i| i.checked_sub(1));
        }
        if self.clean_index.is_some_and(|i| i > self.undo_stack.len() - 1) {
            // The clean state lived in the redo history being dropped.
            self.clean_index = None;
        }
        self.redo_stack.clear();
    }

    /// Undo the most recent batch. Returns `false` if there was none.
    ///
    /// # Panics
    ///
    /// Panics if a batch is open.
    pub fn undo(&mut self, doc: &mut Document) -> bool {
        assert!(!self.is_in_batch(), "undo inside a batch");
        let Some(mut batch) = self.undo_stack.pop() else {
            return false;
        };
        doc.begin_update();
        for command in batch.commands.iter_mut().rev() {
            command.undo(doc);
        }
        doc.end_update();
        self.redo_stack.push(batch);
        true
    }

    /// Redo the most recently undone batch. Returns `false` if there was none.
    pub fn redo(&mut self, doc: &mut Document) -> bool {
        assert!(!self.is_in_batch(), "redo inside a batch");
        let Some(mut batch) = self.redo_stack.pop() else {
            return false;
        };
        doc.begin_update();
        for command in batch.commands.iter_mut() {
            command.redo(doc);
        }
        doc.end_update();
        self.undo_stack.push(batch);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_text(&self) -> Option<&str> {
        self.undo_stack.last().map(Batch::name)
    }

    pub fn redo_text(&self) -> Option<&str> {
        self.redo_stack.last().map(Batch::name)
    }

    /// Mark the current state as saved.
    pub fn set_clean(&mut self) {
        self.clean_index = Some(self.undo_stack.len());
    }

    pub fn is_clean(&self) -> bool {
        self.clean_index == Some(self.undo_stack.len())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.clean_index = None;
    }

    /// Nodes referenced by any recorded command.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .chain(self.current.iter())
            .flat_map(|b| b.commands.iter())
            .flat_map(Command::referenced_nodes)
            .collect()
    }
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new()
    }
}
