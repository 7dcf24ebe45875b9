use std::collections::HashMap;

/// Mutable state of one run, shared by every tool call in it.
///
/// Created empty per run and dropped with it; never shared across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// Relative path to full file text. Only grows during a run.
    pub files: HashMap<String, String>,
    summary: Option<String>,
}

impl RunState {
    /// Record one file write. A later write to the same path wins.
    pub fn merge_file(&mut self, path: String, content: String) {
        self.files.insert(path, content);
    }

    /// Set the completion summary. The first summary sticks: returns `false`
    /// and leaves the state untouched if one is already recorded.
    pub fn record_summary(&mut self, summary: impl Into<String>) -> bool {
        if self.summary.is_some() {
            return false;
        }
        self.summary = Some(summary.into());
        true
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.summary.is_some()
    }
}
