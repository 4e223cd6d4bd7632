//! Speech detection and the conversation overlay.
//!
//! Lines like `Bob says, 'hello'` are matched against an ordered list of
//! speech patterns (first match wins). Speech that opens a quote without
//! closing it on the same line accumulates follow-up lines until one ends
//! with the matching quote character. Finalized entries land in an
//! append-only log behind a view cursor; the overlay closes itself once
//! the reader is caught up and the channel has gone quiet.

use std::time::{Duration, Instant};

use jiff::Timestamp;
use regex::Regex;

use crate::config::ConversationPatterns;
use crate::errors::{ClientError, ClientResult};

/// One finalized piece of speech
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub speaker: String,
    /// Message text without the enclosing quotes, fragments space-joined
    pub message: String,
    /// Original line(s) with color preserved, newline-joined
    pub raw_line: String,
    pub timestamp: Timestamp,
}

#[derive(Debug)]
struct CompiledPattern {
    regex: Regex,
    #[allow(dead_code)]
    label: String,
}

/// Tracks overheard speech and the overlay view state.
#[derive(Debug)]
pub struct ConversationTracker {
    patterns: Vec<CompiledPattern>,
    auto_close: Duration,

    entries: Vec<ConversationEntry>,
    view_index: usize,
    visible: bool,
    last_speech: Option<Instant>,

    // Multi-line accumulation state
    pending: Option<ConversationEntry>,
    /// Quote character that opened the pending block
    open_quote: Option<char>,
}

impl ConversationTracker {
    /// Compile the configured speech patterns. Each must define the named
    /// groups `speaker`, `quote`, and `message`.
    pub fn new(patterns: &ConversationPatterns, auto_close: Duration) -> ClientResult<Self> {
        let mut compiled = Vec::with_capacity(patterns.patterns.len());
        for sp in &patterns.patterns {
            let regex = Regex::new(&sp.pattern)?;
            for group in ["speaker", "quote", "message"] {
                if !regex.capture_names().flatten().any(|n| n == group) {
                    return Err(ClientError::Pattern(format!(
                        "speech pattern '{}' is missing the named group '{}'",
                        sp.label, group
                    )));
                }
            }
            compiled.push(CompiledPattern {
                regex,
                label: sp.label.clone(),
            });
        }
        Ok(Self {
            patterns: compiled,
            auto_close,
            entries: Vec::new(),
            view_index: 0,
            visible: false,
            last_speech: None,
            pending: None,
            open_quote: None,
        })
    }

    /// Try the patterns in order against a plain line.
    /// Returns `(speaker, message, quote_char)` for the first match.
    pub fn match_line(&self, plain: &str) -> Option<(String, String, char)> {
        for cp in &self.patterns {
            let Some(caps) = cp.regex.captures(plain) else {
                continue;
            };
            let (Some(speaker), Some(quote), Some(message)) = (
                caps.name("speaker"),
                caps.name("quote"),
                caps.name("message"),
            ) else {
                continue;
            };
            let quote_char = quote.as_str().chars().next()?;
            let mut message = message.as_str().to_string();
            // Single-line speech carries its closing quote - drop it
            if message.ends_with('\'') || message.ends_with('"') {
                message.pop();
            }
            return Some((speaker.as_str().to_string(), message, quote_char));
        }
        None
    }

    /// True while a multi-line speech block is being accumulated.
    ///
    /// Continuation lines carry no speaker, so the classifier treats any
    /// line as speech while this holds.
    pub fn is_continuing(&self) -> bool {
        self.pending.is_some()
    }

    /// Process one line. Returns true when the line was consumed as speech.
    pub fn feed_line(&mut self, plain: &str, raw: &str, now: Instant) -> bool {
        // Accumulating: every line belongs to the pending entry until the
        // closing quote shows up at a line end
        if let Some(mut pending) = self.pending.take() {
            let quote = self.open_quote.unwrap_or('\'');
            pending.message.push(' ');
            pending.message.push_str(plain.trim());
            pending.raw_line.push('\n');
            pending.raw_line.push_str(raw);

            if plain.trim_end().ends_with(quote) {
                if pending.message.ends_with(quote) {
                    pending.message.pop();
                }
                self.open_quote = None;
                self.add_entry(pending, now);
            } else {
                self.pending = Some(pending);
            }
            return true;
        }

        let Some((speaker, message, quote)) = self.match_line(plain) else {
            return false;
        };

        let entry = ConversationEntry {
            speaker,
            message,
            raw_line: raw.to_string(),
            timestamp: Timestamp::now(),
        };

        let stripped = plain.trim_end();
        if stripped.ends_with(quote) && stripped.matches(quote).count() >= 2 {
            // Quote opens and closes on the same line
            self.add_entry(entry, now);
        } else {
            self.pending = Some(entry);
            self.open_quote = Some(quote);
        }
        true
    }

    /// Append a finalized entry. The overlay opens on the new entry when
    /// hidden; otherwise the entry queues behind the view cursor.
    pub fn add_entry(&mut self, entry: ConversationEntry, now: Instant) {
        self.entries.push(entry);
        self.last_speech = Some(now);
        if !self.visible {
            self.visible = true;
            self.view_index = self.entries.len() - 1;
        }
    }

    /// Step forward; stepping past the newest entry dismisses the overlay
    pub fn navigate_next(&mut self, now: Instant) {
        if self.entries.is_empty() {
            return;
        }
        if self.view_index + 1 < self.entries.len() {
            self.view_index += 1;
            self.last_speech = Some(now);
        } else {
            self.dismiss();
        }
    }

    pub fn navigate_prev(&mut self, now: Instant) {
        if !self.entries.is_empty() && self.view_index > 0 {
            self.view_index -= 1;
            self.last_speech = Some(now);
        }
    }

    /// Close the overlay and drop the whole log
    pub fn dismiss(&mut self) {
        self.visible = false;
        self.entries.clear();
        self.view_index = 0;
        self.pending = None;
        self.open_quote = None;
    }

    pub fn current_entry(&self) -> Option<&ConversationEntry> {
        self.entries.get(self.view_index)
    }

    /// Cursor position display, e.g. "2/5"
    pub fn queue_status(&self) -> String {
        if self.entries.is_empty() {
            String::new()
        } else {
            format!("{}/{}", self.view_index + 1, self.entries.len())
        }
    }

    pub fn has_unread(&self) -> bool {
        self.view_index + 1 < self.entries.len()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// True when the overlay should close: idle past the configured
    /// duration with the cursor already on the newest entry.
    pub fn check_auto_close(&self, now: Instant) -> bool {
        if !self.visible || self.has_unread() {
            return false;
        }
        match self.last_speech {
            Some(last) => now.duration_since(last) >= self.auto_close,
            None => false,
        }
    }
}
