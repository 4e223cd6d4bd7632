//! Help pager overlay fed by `{help}`/`{/help}` tagged content.
//!
//! Servers wrap help entries in tag lines:
//!
//! ```text
//! {help}
//! COMBAT {helpkeywords}
//! ----------------------
//! {helptags}fighting, pvp
//! {helpbody}
//! ...body with color preserved...
//! {/helpbody}
//! {/help}
//! ```
//!
//! Everything between the outer tags is consumed from the display stream.
//! Content is published only when the closing tag arrives; an unterminated
//! block never replaces what the pager already shows.

use regex::Regex;

use crate::config::HelpPatterns;
use crate::errors::ClientResult;

/// Parsed help content from a completed block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelpContent {
    /// From the first non-empty, non-separator header line (or "Help")
    pub title: String,
    /// Lines before `{helpbody}` - metadata, keyword lists, separators
    pub header_lines: Vec<String>,
    /// Raw body lines with color codes preserved
    pub body_lines: Vec<String>,
    /// Keywords from the `{helptags}` line
    pub tags: Vec<String>,
}

/// Detects help blocks and holds the pager overlay state.
#[derive(Debug)]
pub struct HelpTracker {
    start_tag: Regex,
    end_tag: Regex,
    body_start: Regex,
    body_end: Regex,
    tags_line: Regex,
    keywords_tag: Regex,

    /// Published content shown by the pager
    content: Option<HelpContent>,
    visible: bool,
    scroll_offset: usize,

    // Parsing state for the block being accumulated
    in_help_block: bool,
    in_body_block: bool,
    header_lines: Vec<String>,
    body_lines: Vec<String>,
    tags: Vec<String>,
    title: String,
}

impl HelpTracker {
    pub fn new(patterns: &HelpPatterns) -> ClientResult<Self> {
        Ok(Self {
            start_tag: Regex::new(&patterns.start_tag)?,
            end_tag: Regex::new(&patterns.end_tag)?,
            body_start: Regex::new(&patterns.body_start)?,
            body_end: Regex::new(&patterns.body_end)?,
            tags_line: Regex::new(&patterns.tags)?,
            keywords_tag: Regex::new(&patterns.keywords)?,
            content: None,
            visible: false,
            scroll_offset: 0,
            in_help_block: false,
            in_body_block: false,
            header_lines: Vec::new(),
            body_lines: Vec::new(),
            tags: Vec::new(),
            title: String::new(),
        })
    }

    /// Process one line. Returns true when the line is consumed as help
    /// data (tag lines included) and must not reach the display stream.
    pub fn feed_line(&mut self, plain: &str, raw: &str) -> bool {
        // {help} - start of a block; a conflicting earlier block is dropped
        if self.start_tag.is_match(plain) {
            self.in_help_block = true;
            self.in_body_block = false;
            self.header_lines.clear();
            self.body_lines.clear();
            self.tags.clear();
            self.title.clear();
            return true;
        }

        // {/help} - publish if a block is open, consume either way
        if self.end_tag.is_match(plain) {
            if self.in_help_block {
                self.finalize();
            }
            self.in_help_block = false;
            self.in_body_block = false;
            return true;
        }

        if !self.in_help_block {
            return false;
        }

        if self.body_start.is_match(plain) {
            self.in_body_block = true;
            return true;
        }

        if self.body_end.is_match(plain) {
            self.in_body_block = false;
            return true;
        }

        if let Some(caps) = self.tags_line.captures(plain) {
            if let Some(m) = caps.get(1) {
                let tags_str = m.as_str().trim();
                if !tags_str.is_empty() {
                    self.tags = tags_str
                        .split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect();
                }
            }
            return true;
        }

        if self.in_body_block {
            self.body_lines.push(raw.to_string());
            return true;
        }

        // Header/metadata line. The embedded keyword tag is stripped for
        // display but the line itself is kept.
        let clean_raw = self.keywords_tag.replace_all(raw, "").into_owned();
        self.header_lines.push(clean_raw);

        let stripped = plain.trim();
        if !stripped.is_empty() && self.title.is_empty() && !stripped.starts_with('-') {
            let clean_title = self
                .keywords_tag
                .replace_all(stripped, "")
                .trim()
                .to_string();
            if !clean_title.is_empty() {
                self.title = clean_title;
            }
        }

        true
    }

    fn finalize(&mut self) {
        let title = if self.title.is_empty() {
            "Help".to_string()
        } else {
            self.title.clone()
        };
        self.content = Some(HelpContent {
            title,
            header_lines: self.header_lines.clone(),
            body_lines: self.body_lines.clone(),
            tags: self.tags.clone(),
        });
        self.visible = true;
        self.scroll_offset = 0;
    }

    pub fn content(&self) -> Option<&HelpContent> {
        self.content.as_ref()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    fn total_lines(&self) -> usize {
        self.content
            .as_ref()
            .map(|c| c.header_lines.len() + c.body_lines.len())
            .unwrap_or(0)
    }

    /// Scroll down by `amount` lines, bounded so the last page stays full
    pub fn scroll_down(&mut self, amount: usize, visible_height: usize) {
        if self.content.is_none() {
            return;
        }
        let max_offset = self.total_lines().saturating_sub(visible_height.max(1));
        self.scroll_offset = (self.scroll_offset + amount).min(max_offset);
    }

    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn scroll_to_bottom(&mut self, visible_height: usize) {
        self.scroll_offset = self.total_lines().saturating_sub(visible_height.max(1));
    }

    /// Close the overlay, keeping the content for a later reopen
    pub fn dismiss(&mut self) {
        self.visible = false;
    }

    /// Show the overlay again if there is anything to show
    pub fn reopen(&mut self) {
        if self.content.is_some() {
            self.visible = true;
        }
    }

    pub fn clear(&mut self) {
        self.content = None;
        self.visible = false;
        self.scroll_offset = 0;
        self.in_help_block = false;
        self.in_body_block = false;
        self.header_lines.clear();
        self.body_lines.clear();
        self.tags.clear();
        self.title.clear();
    }
}
