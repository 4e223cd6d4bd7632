//! Line classification pipeline.
//!
//! Every cooked line of server text is offered to the taggers in a fixed
//! precedence order - info, help, map, conversation - and is either
//! consumed into that tracker's state or appended to the filtered display
//! stream. The unfiltered transcript always gets every line first, so
//! nothing the server sent is ever lost.
//!
//! The classifier owns the two output streams and the blank-line
//! suppression that keeps the filtered view tidy: one blank immediately
//! before a consumed info/speech line is removed, and blanks immediately
//! after are swallowed until real content resumes.

pub mod conversation;
pub mod help;
pub mod info;
pub mod map;

pub use conversation::{ConversationEntry, ConversationTracker};
pub use help::{HelpContent, HelpTracker};
pub use info::{InfoEntry, InfoTracker};
pub use map::MapTracker;

use std::time::Instant;

use crate::ansi::{AnsiState, parse_sgr, strip_sgr};
use crate::config::ClientConfig;
use crate::errors::ClientResult;

/// Which tagger consumed a line. `None` means the line reached the
/// filtered display stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumedBy {
    Info,
    Help,
    Map,
    Conversation,
    None,
}

/// A stored output line together with the ANSI attribute state that was
/// active when it started, so rendering any slice of history resumes
/// colors correctly.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub raw: String,
    pub entry_style: AnsiState,
}

/// The classification pipeline and its two output streams.
#[derive(Debug)]
pub struct OutputClassifier {
    pub info: InfoTracker,
    pub help: HelpTracker,
    pub map: MapTracker,
    pub conversation: ConversationTracker,

    /// Unfiltered transcript - every cooked line
    transcript: Vec<OutputLine>,
    /// Filtered view - consumed lines and suppressed blanks removed
    display: Vec<OutputLine>,
    max_lines: usize,
    color_enabled: bool,

    skip_next_blank: bool,
    skip_blank_after_speech: bool,
    /// Partial line waiting for the rest of its bytes (TCP fragmentation)
    incomplete_line: String,

    // Independent carried ANSI states - the two streams see different
    // line sequences once classification diverges them
    transcript_style: AnsiState,
    display_style: AnsiState,
}

impl OutputClassifier {
    pub fn new(config: &ClientConfig, color_enabled: bool) -> ClientResult<Self> {
        Ok(Self {
            info: InfoTracker::new(&config.patterns.info, &config.timers.info)?,
            help: HelpTracker::new(&config.patterns.help)?,
            map: MapTracker::new(&config.patterns.map)?,
            conversation: ConversationTracker::new(
                &config.patterns.conversation,
                config.timers.conversation.auto_close,
            )?,
            transcript: Vec::new(),
            display: Vec::new(),
            max_lines: config.ui.max_output_lines,
            color_enabled,
            skip_next_blank: false,
            skip_blank_after_speech: false,
            incomplete_line: String::new(),
            transcript_style: AnsiState::default(),
            display_style: AnsiState::default(),
        })
    }

    /// Feed a chunk of cooked text (Telnet removed, newlines normalized
    /// to `\n`). A trailing fragment without its newline is buffered until
    /// the next chunk completes it.
    pub fn push_text(&mut self, text: &str, now: Instant) {
        let mut text = text;
        let joined;
        if !self.incomplete_line.is_empty() {
            joined = format!("{}{}", self.incomplete_line, text);
            self.incomplete_line.clear();
            text = &joined;
        }

        let mut lines: Vec<&str> = text.split('\n').collect();
        if lines.last().is_some_and(|l| l.is_empty()) {
            // Chunk ended on a newline: drop the empty tail split() leaves
            lines.pop();
        } else if let Some(fragment) = lines.pop() {
            // Chunk ended mid-line: keep the fragment for the next call
            self.incomplete_line = fragment.to_string();
        }

        for line in lines {
            if self.color_enabled {
                self.classify_line(line, now);
            } else {
                let stripped = strip_sgr(line);
                self.classify_line(&stripped, now);
            }
        }

        self.trim_streams();
    }

    /// Run one line through the taggers in precedence order.
    pub fn classify_line(&mut self, line: &str, now: Instant) -> ConsumedBy {
        // The transcript gets everything, before any classification
        self.append_transcript(line);

        let plain = strip_sgr(line);

        if self.info.matches(&plain) {
            self.info.add(&plain, line, now);
            self.skip_next_blank = true;
            // A blank immediately before the info line leaves the view too
            self.pop_trailing_display_blank();
            return ConsumedBy::Info;
        }
        if self.skip_next_blank && plain.trim().is_empty() {
            return ConsumedBy::Info;
        }
        self.skip_next_blank = false;

        if self.help.feed_line(&plain, line) {
            return ConsumedBy::Help;
        }

        if self.map.feed_line(&plain, line) {
            return ConsumedBy::Map;
        }

        self.route_to_display(&plain, line, now)
    }

    /// Last stage: speech detection, then the filtered display stream.
    fn route_to_display(&mut self, plain: &str, line: &str, now: Instant) -> ConsumedBy {
        if self.is_other_speech(plain) && self.conversation.feed_line(plain, line, now) {
            self.pop_trailing_display_blank();
            self.skip_blank_after_speech = true;
            return ConsumedBy::Conversation;
        }
        if self.skip_blank_after_speech && plain.trim().is_empty() {
            return ConsumedBy::Conversation;
        }
        self.skip_blank_after_speech = false;

        self.append_display(line);
        ConsumedBy::None
    }

    /// Speech from anyone but the player. Continuation lines of an open
    /// speech block have no speaker to check and always count.
    fn is_other_speech(&self, plain: &str) -> bool {
        if self.conversation.is_continuing() {
            return true;
        }
        match self.conversation.match_line(plain) {
            Some((speaker, _, _)) => speaker != "You",
            None => false,
        }
    }

    fn append_transcript(&mut self, line: &str) {
        let (_, next) = parse_sgr(line, self.transcript_style);
        self.transcript.push(OutputLine {
            raw: line.to_string(),
            entry_style: self.transcript_style,
        });
        self.transcript_style = next;
    }

    fn append_display(&mut self, line: &str) {
        let (_, next) = parse_sgr(line, self.display_style);
        self.display.push(OutputLine {
            raw: line.to_string(),
            entry_style: self.display_style,
        });
        self.display_style = next;
    }

    /// Remove a blank line sitting at the end of the filtered view.
    /// Its escape codes never render, so the carried style rewinds.
    fn pop_trailing_display_blank(&mut self) {
        if let Some(last) = self.display.last() {
            if strip_sgr(&last.raw).trim().is_empty() {
                let popped = self.display.pop();
                if let Some(popped) = popped {
                    self.display_style = popped.entry_style;
                }
            }
        }
    }

    fn trim_streams(&mut self) {
        if self.transcript.len() > self.max_lines {
            let excess = self.transcript.len() - self.max_lines;
            self.transcript.drain(..excess);
        }
        if self.display.len() > self.max_lines {
            let excess = self.display.len() - self.max_lines;
            self.display.drain(..excess);
        }
    }

    /// Append a client-generated notice to both streams, bypassing
    /// classification.
    pub fn add_system_message(&mut self, text: &str) {
        let line = format!("-- {} --", text);
        self.append_transcript(&line);
        self.append_display(&line);
    }

    pub fn transcript(&self) -> &[OutputLine] {
        &self.transcript
    }

    pub fn display(&self) -> &[OutputLine] {
        &self.display
    }

    /// Drop both streams (the `/clear` command). Tracker state survives.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.display.clear();
        self.skip_next_blank = false;
        self.skip_blank_after_speech = false;
        self.transcript_style = AnsiState::default();
        self.display_style = AnsiState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> OutputClassifier {
        OutputClassifier::new(&ClientConfig::default(), true).unwrap()
    }

    fn display_texts(c: &OutputClassifier) -> Vec<String> {
        c.display().iter().map(|l| l.raw.clone()).collect()
    }

    fn transcript_texts(c: &OutputClassifier) -> Vec<String> {
        c.transcript().iter().map(|l| l.raw.clone()).collect()
    }

    #[test]
    fn test_plain_lines_reach_both_streams() {
        let mut c = classifier();
        let now = Instant::now();

        assert_eq!(c.classify_line("a quiet evening", now), ConsumedBy::None);
        assert_eq!(display_texts(&c), vec!["a quiet evening"]);
        assert_eq!(transcript_texts(&c), vec!["a quiet evening"]);
    }

    #[test]
    fn test_info_consumed_with_surrounding_blanks() {
        let mut c = classifier();
        let now = Instant::now();

        c.classify_line("before", now);
        c.classify_line("", now);
        assert_eq!(c.classify_line("INFO: Kira has arrived.", now), ConsumedBy::Info);
        assert_eq!(c.classify_line("", now), ConsumedBy::Info);
        assert_eq!(c.classify_line("", now), ConsumedBy::Info);
        c.classify_line("after", now);

        // Filtered view loses the info line and its surrounding blanks
        assert_eq!(display_texts(&c), vec!["before", "after"]);
        // Transcript keeps everything
        assert_eq!(
            transcript_texts(&c),
            vec!["before", "", "INFO: Kira has arrived.", "", "", "after"]
        );
        assert!(c.info.visible());
    }

    #[test]
    fn test_help_block_consumed() {
        let mut c = classifier();
        let now = Instant::now();

        for line in ["{help}", "TOPIC", "{helpbody}", "text", "{/helpbody}", "{/help}"] {
            assert_eq!(c.classify_line(line, now), ConsumedBy::Help);
        }
        assert!(display_texts(&c).is_empty());
        assert_eq!(transcript_texts(&c).len(), 6);
        assert!(c.help.visible());
    }

    #[test]
    fn test_map_block_consumed_when_enabled() {
        let mut c = classifier();
        let now = Instant::now();
        c.map.set_enabled(true);

        for line in ["<MAPSTART>", "Grand Hall", "+--+", "[ Exits: N ]", "<MAPEND>"] {
            assert_eq!(c.classify_line(line, now), ConsumedBy::Map);
        }
        assert!(display_texts(&c).is_empty());
        assert_eq!(c.map.room_name(), "Grand Hall");
    }

    #[test]
    fn test_disabled_map_lines_fall_through() {
        let mut c = classifier();
        let now = Instant::now();

        assert_eq!(c.classify_line("<MAPSTART>", now), ConsumedBy::None);
        assert_eq!(display_texts(&c), vec!["<MAPSTART>"]);
    }

    #[test]
    fn test_speech_consumed_with_blanks() {
        let mut c = classifier();
        let now = Instant::now();

        c.classify_line("before", now);
        c.classify_line("", now);
        assert_eq!(
            c.classify_line("Bob says, 'hello there'", now),
            ConsumedBy::Conversation
        );
        assert_eq!(c.classify_line("", now), ConsumedBy::Conversation);
        c.classify_line("after", now);

        assert_eq!(display_texts(&c), vec!["before", "after"]);
        assert!(c.conversation.visible());
    }

    #[test]
    fn test_own_speech_not_consumed() {
        let mut c = classifier();
        let now = Instant::now();

        assert_eq!(
            c.classify_line("You say, 'hello'", now),
            ConsumedBy::None
        );
        // "You says" is what the patterns actually produce for other
        // players; the literal speaker "You" is the player's own echo
        assert_eq!(
            c.classify_line("You says, 'hello'", now),
            ConsumedBy::None
        );
        assert_eq!(display_texts(&c).len(), 2);
    }

    #[test]
    fn test_multi_line_speech_spans_classification() {
        let mut c = classifier();
        let now = Instant::now();

        assert_eq!(
            c.classify_line("The Old Man says, 'Let me tell you", now),
            ConsumedBy::Conversation
        );
        // Mid-block, even an ordinary line is part of the speech
        assert_eq!(c.classify_line("a long story.'", now), ConsumedBy::Conversation);
        assert!(!c.conversation.is_continuing());
        assert_eq!(
            c.conversation.current_entry().unwrap().message,
            "Let me tell you a long story."
        );
    }

    #[test]
    fn test_precedence_info_before_speech() {
        // An info line that would also match a speech pattern goes to info
        let mut c = classifier();
        let now = Instant::now();

        let consumed = c.classify_line("INFO: Bob says, 'hi'", now);
        assert_eq!(consumed, ConsumedBy::Info);
        assert!(!c.conversation.visible());
    }

    #[test]
    fn test_push_text_buffers_incomplete_lines() {
        let mut c = classifier();
        let now = Instant::now();

        c.push_text("first li", now);
        assert!(transcript_texts(&c).is_empty());
        c.push_text("ne\nsecond\n", now);

        assert_eq!(transcript_texts(&c), vec!["first line", "second"]);
    }

    #[test]
    fn test_push_text_no_spurious_blank_between_chunks() {
        let mut c = classifier();
        let now = Instant::now();

        c.push_text("one\ntwo\n", now);
        c.push_text("three\n", now);

        assert_eq!(transcript_texts(&c), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_color_disabled_strips_lines() {
        let mut c = OutputClassifier::new(&ClientConfig::default(), false).unwrap();
        c.push_text("\x1b[31mred\x1b[0m\n", Instant::now());

        assert_eq!(transcript_texts(&c), vec!["red"]);
        assert_eq!(display_texts(&c), vec!["red"]);
    }

    #[test]
    fn test_streams_are_capped() {
        let mut config = ClientConfig::default();
        config.ui.max_output_lines = 10;
        let mut c = OutputClassifier::new(&config, true).unwrap();
        let now = Instant::now();

        let mut text = String::new();
        for i in 0..25 {
            text.push_str(&format!("line {i}\n"));
        }
        c.push_text(&text, now);

        assert_eq!(c.transcript().len(), 10);
        assert_eq!(c.transcript()[0].raw, "line 15");
    }

    #[test]
    fn test_color_state_carries_across_display_lines() {
        let mut c = classifier();
        let now = Instant::now();

        c.classify_line("\x1b[31mred starts here", now);
        c.classify_line("still red", now);

        let display = c.display();
        assert_eq!(display[0].entry_style, AnsiState::default());
        assert_eq!(display[1].entry_style.fg, 1);
    }

    #[test]
    fn test_stream_styles_diverge_after_consumption() {
        let mut c = classifier();
        let now = Instant::now();

        // The info line turns everything green, but never reaches the
        // filtered view - only the transcript's carried state changes
        c.classify_line("\x1b[32mINFO: green alert", now);
        c.classify_line("next line", now);

        let transcript = c.transcript();
        let display = c.display();
        assert_eq!(transcript.last().unwrap().entry_style.fg, 2);
        assert_eq!(display.last().unwrap().entry_style.fg, 7);
    }

    #[test]
    fn test_system_message_bypasses_classification() {
        let mut c = classifier();
        c.add_system_message("Connected to mud.example.com:4000");

        assert_eq!(
            display_texts(&c),
            vec!["-- Connected to mud.example.com:4000 --"]
        );
        assert_eq!(transcript_texts(&c), display_texts(&c));
    }

    #[test]
    fn test_clear_drops_streams_keeps_trackers() {
        let mut c = classifier();
        let now = Instant::now();

        c.classify_line("INFO: sticky", now);
        c.classify_line("text", now);
        c.clear();

        assert!(c.transcript().is_empty());
        assert!(c.display().is_empty());
        assert!(c.info.visible());
    }
}
