//! Editor configuration.

use crate::codec::CURRENT_VERSION;

/// Configuration for an [`Editor`](crate::command::Editor).
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Maximum number of undo levels kept. `0` keeps everything.
    pub max_undo_levels: usize,
    /// When `false`, style transitions are applied instantly.
    pub animate_transitions: bool,
    /// Format version written into saved documents.
    pub format_version: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo_levels: 100,
            animate_transitions: true,
            format_version: CURRENT_VERSION,
        }
    }
}

impl EditorConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the undo depth limit (builder).
    pub fn with_max_undo_levels(mut self, levels: usize) -> Self {
        self.max_undo_levels = levels;
        self
    }

    /// Enable or disable animated style transitions (builder).
    pub fn with_animate_transitions(mut self, animate: bool) -> Self {
        self.animate_transitions = animate;
        self
    }

    /// Set the version written on save (builder).
    pub fn with_format_version(mut self, version: u32) -> Self {
        self.format_version = version;
        self
    }
}
