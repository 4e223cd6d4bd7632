//! Command history with prefix-filtered navigation.
//!
//! Arrow-up starts browsing and locks whatever was typed as a prefix
//! filter; only entries starting with it (case-insensitive) are offered.
//! Arrow-down past the newest match restores the saved input.

#[derive(Debug)]
pub struct CommandHistory {
    history: Vec<String>,
    max_size: usize,
    /// Index into the filtered view; None when not browsing
    index: Option<usize>,
    /// Input buffer content before browsing started
    saved_input: String,
    /// Prefix filter locked when browsing starts
    prefix: String,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl CommandHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            history: Vec::new(),
            max_size,
            index: None,
            saved_input: String::new(),
            prefix: String::new(),
        }
    }

    /// Add a command. Empty commands and consecutive duplicates are skipped.
    pub fn add(&mut self, cmd: &str) {
        if cmd.trim().is_empty() {
            return;
        }
        if self.history.last().is_some_and(|last| last == cmd) {
            return;
        }
        self.history.push(cmd.to_string());
        if self.history.len() > self.max_size {
            let excess = self.history.len() - self.max_size;
            self.history.drain(..excess);
        }
        self.reset();
    }

    /// Reset browsing state
    pub fn reset(&mut self) {
        self.index = None;
        self.saved_input.clear();
        self.prefix.clear();
    }

    fn filtered(&self) -> Vec<String> {
        if self.prefix.is_empty() {
            return self.history.clone();
        }
        let lp = self.prefix.to_lowercase();
        self.history
            .iter()
            .filter(|h| h.to_lowercase().starts_with(&lp))
            .cloned()
            .collect()
    }

    /// Move to an older entry. Returns the new input text.
    pub fn navigate_up(&mut self, current_input: &str) -> String {
        if self.history.is_empty() {
            return current_input.to_string();
        }
        if self.index.is_none() {
            // Start browsing - lock the current input as the prefix
            self.saved_input = current_input.to_string();
            self.prefix = current_input.to_string();
        }
        let filtered = self.filtered();
        if filtered.is_empty() {
            return current_input.to_string();
        }
        let next = match self.index {
            None => filtered.len() - 1,
            Some(i) if i > 0 => i - 1,
            Some(i) => i,
        };
        self.index = Some(next);
        filtered[next].clone()
    }

    /// Move to a newer entry. Returns the new input text.
    pub fn navigate_down(&mut self, current_input: &str) -> String {
        let Some(index) = self.index else {
            return current_input.to_string();
        };
        let filtered = self.filtered();
        if filtered.is_empty() {
            let result = std::mem::take(&mut self.saved_input);
            self.reset();
            return result;
        }
        if index + 1 < filtered.len() {
            let text = filtered[index + 1].clone();
            self.index = Some(index + 1);
            return text;
        }
        // Past the newest match - restore the saved input
        let result = std::mem::take(&mut self.saved_input);
        self.reset();
        result
    }
}
