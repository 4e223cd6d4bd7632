//! Room map extraction.
//!
//! Servers bracket the minimap with `<MAPSTART>`/`<MAPEND>` tag lines and
//! the room description with `{rdesc}`/`{/rdesc}`. A `{coords}` tag can
//! appear on its own at any time. Right after `<MAPEND>` the server prints
//! the room-name line (possibly with `(G)`/`(123)` style markers).
//!
//! The tracker stays disabled until the session enables it after login -
//! the tags never appear before that, and a disabled tracker must not
//! swallow ordinary text.

use regex::Regex;

use crate::ansi::strip_sgr;
use crate::config::MapPatterns;
use crate::errors::ClientResult;

/// Room name line after `<MAPEND>`: a name, optionally followed by
/// parenthetical markers. Only the name portion is kept.
const ROOM_NAME_LINE: &str = r"^[A-Za-z][A-Za-z0-9\s'\-,\.]+(?:\s*\([A-Za-z0-9]+\))*\s*$";
const ROOM_NAME_EXTRACT: &str = r"^([A-Za-z][A-Za-z0-9\s'\-,\.]+?)(?:\s*\([A-Za-z0-9]+\))*\s*$";

/// Detects and extracts map blocks, room descriptions, and coordinates.
#[derive(Debug)]
pub struct MapTracker {
    start_tag: Regex,
    end_tag: Regex,
    rdesc_start: Regex,
    rdesc_end: Regex,
    coords_tag: Regex,
    exits_line: Regex,
    room_name_line: Regex,
    room_name_extract: Regex,
    /// A run of 2+ alphabetic characters - the word test separating ASCII
    /// art from prose
    alpha_run: Regex,

    // Published state, wholesale-replaced per finalized block
    map_lines: Vec<String>,
    room_name: String,
    room_name_raw: String,
    room_desc: Vec<String>,
    coords: String,
    exits: String,
    exits_raw: String,

    // Block accumulation state
    in_map_block: bool,
    in_rdesc_block: bool,
    expect_room_name: bool,
    block_lines: Vec<(String, String)>,
    rdesc_lines: Vec<String>,

    enabled: bool,
}

impl MapTracker {
    pub fn new(patterns: &MapPatterns) -> ClientResult<Self> {
        Ok(Self {
            start_tag: Regex::new(&patterns.start_tag)?,
            end_tag: Regex::new(&patterns.end_tag)?,
            rdesc_start: Regex::new(&patterns.rdesc_start)?,
            rdesc_end: Regex::new(&patterns.rdesc_end)?,
            coords_tag: Regex::new(&patterns.coords)?,
            exits_line: Regex::new(&patterns.exits)?,
            room_name_line: Regex::new(ROOM_NAME_LINE)?,
            room_name_extract: Regex::new(ROOM_NAME_EXTRACT)?,
            alpha_run: Regex::new(r"[a-zA-Z]{2,}")?,
            map_lines: Vec::new(),
            room_name: String::new(),
            room_name_raw: String::new(),
            room_desc: Vec::new(),
            coords: String::new(),
            exits: String::new(),
            exits_raw: String::new(),
            in_map_block: false,
            in_rdesc_block: false,
            expect_room_name: false,
            block_lines: Vec::new(),
            rdesc_lines: Vec::new(),
            enabled: false,
        })
    }

    /// Enable detection. Done once after login, when GMCP vitals confirm
    /// the server is past the prompt sequence.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Process one line. Returns true when the line is consumed as map
    /// data (tag lines, block interiors, the post-block room-name line).
    pub fn feed_line(&mut self, plain: &str, raw: &str) -> bool {
        if !self.enabled {
            return false;
        }

        if self.start_tag.is_match(plain) {
            self.in_map_block = true;
            self.expect_room_name = false;
            self.block_lines.clear();
            return true;
        }

        if self.end_tag.is_match(plain) {
            if self.in_map_block {
                self.finalize_block();
            }
            self.in_map_block = false;
            // The room name line follows the block
            self.expect_room_name = true;
            return true;
        }

        if self.in_map_block {
            self.block_lines.push((plain.to_string(), raw.to_string()));
            return true;
        }

        if self.rdesc_start.is_match(plain) {
            self.in_rdesc_block = true;
            self.expect_room_name = false;
            self.rdesc_lines.clear();
            return true;
        }

        if self.rdesc_end.is_match(plain) {
            if self.in_rdesc_block {
                self.finalize_rdesc();
            }
            self.in_rdesc_block = false;
            return true;
        }

        if self.in_rdesc_block {
            self.rdesc_lines.push(raw.to_string());
            return true;
        }

        if let Some(caps) = self.coords_tag.captures(plain) {
            if let Some(m) = caps.get(1) {
                self.coords = m.as_str().to_string();
            }
            self.expect_room_name = false;
            return true;
        }

        if self.expect_room_name {
            let stripped = plain.trim();
            if stripped.is_empty() {
                // Blank lines between <MAPEND> and the room name are eaten
                return true;
            }
            if self.room_name_line.is_match(stripped) {
                if let Some(caps) = self.room_name_extract.captures(stripped) {
                    if let Some(name) = caps.get(1) {
                        self.room_name = name.as_str().trim().to_string();
                        self.room_name_raw = raw.to_string();
                    }
                }
                self.expect_room_name = false;
                return true;
            }
            // Not a room name - stop expecting and classify normally
            self.expect_room_name = false;
        }

        false
    }

    /// Split the accumulated block into room name, map body, and exits.
    fn finalize_block(&mut self) {
        if self.block_lines.is_empty() {
            return;
        }

        // First non-empty line is the room name
        let mut room_idx = None;
        for (i, (plain, raw)) in self.block_lines.iter().enumerate() {
            if !plain.trim().is_empty() {
                self.room_name = plain.trim().to_string();
                self.room_name_raw = raw.clone();
                room_idx = Some(i);
                break;
            }
        }
        let Some(room_idx) = room_idx else {
            return;
        };

        // Exits line, scanned from the end back down to the room name
        let mut exits_idx = None;
        for i in (room_idx + 1..self.block_lines.len()).rev() {
            let (plain, raw) = &self.block_lines[i];
            if self.exits_line.is_match(plain) {
                self.exits = plain.trim().to_string();
                self.exits_raw = raw.clone();
                exits_idx = Some(i);
                break;
            }
        }

        // Everything in between is the map body
        let end_idx = exits_idx.unwrap_or(self.block_lines.len());
        let mut map_lines: Vec<String> = Vec::new();
        for (plain, raw) in &self.block_lines[room_idx + 1..end_idx] {
            if plain.trim().is_empty() {
                // Interior blanks are kept, leading ones are not
                if !map_lines.is_empty() {
                    map_lines.push(raw.clone());
                }
                continue;
            }
            map_lines.push(raw.clone());
        }

        while map_lines
            .last()
            .is_some_and(|l| strip_sgr(l).trim().is_empty())
        {
            map_lines.pop();
        }

        self.map_lines = map_lines;
    }

    /// Classify the accumulated description block as ASCII art or prose.
    ///
    /// Art blocks (a majority of non-blank lines contain no 2+ letter run)
    /// keep their lines separate to preserve spatial layout. Prose blocks
    /// join consecutive non-blank lines into paragraphs, blank lines acting
    /// as paragraph breaks. Color codes survive either way.
    fn finalize_rdesc(&mut self) {
        let non_blank: Vec<String> = self
            .rdesc_lines
            .iter()
            .map(|raw| strip_sgr(raw).trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if non_blank.is_empty() {
            self.room_desc = Vec::new();
            return;
        }

        let art_count = non_blank
            .iter()
            .filter(|p| !self.alpha_run.is_match(p))
            .count();
        if art_count > non_blank.len() / 2 {
            self.room_desc = self.rdesc_lines.clone();
            return;
        }

        let mut paragraphs: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        for raw in &self.rdesc_lines {
            if strip_sgr(raw).trim().is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(raw.clone());
            }
        }
        if !current.is_empty() {
            paragraphs.push(current.join(" "));
        }
        self.room_desc = paragraphs;
    }

    pub fn map_lines(&self) -> &[String] {
        &self.map_lines
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn room_name_raw(&self) -> &str {
        &self.room_name_raw
    }

    pub fn room_desc(&self) -> &[String] {
        &self.room_desc
    }

    pub fn coords(&self) -> &str {
        &self.coords
    }

    pub fn exits(&self) -> &str {
        &self.exits
    }

    pub fn exits_raw(&self) -> &str {
        &self.exits_raw
    }

    pub fn has_map(&self) -> bool {
        !self.map_lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.map_lines.clear();
        self.room_name.clear();
        self.room_name_raw.clear();
        self.room_desc.clear();
        self.coords.clear();
        self.exits.clear();
        self.exits_raw.clear();
        self.block_lines.clear();
        self.rdesc_lines.clear();
        self.in_map_block = false;
        self.in_rdesc_block = false;
        self.expect_room_name = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn tracker() -> MapTracker {
        let mut t = MapTracker::new(&ClientConfig::default().patterns.map).unwrap();
        t.set_enabled(true);
        t
    }

    fn feed(t: &mut MapTracker, lines: &[&str]) -> Vec<bool> {
        lines.iter().map(|l| t.feed_line(l, l)).collect()
    }

    #[test]
    fn test_disabled_tracker_consumes_nothing() {
        let mut t = MapTracker::new(&ClientConfig::default().patterns.map).unwrap();

        assert!(!t.feed_line("<MAPSTART>", "<MAPSTART>"));
        assert!(!t.feed_line("+--+", "+--+"));
        assert!(!t.feed_line("<MAPEND>", "<MAPEND>"));
        assert!(!t.has_map());
    }

    #[test]
    fn test_block_split_into_name_map_exits() {
        let mut t = tracker();
        let consumed = feed(
            &mut t,
            &[
                "<MAPSTART>",
                "Grand Hall",
                "",
                "+---+",
                "| @ |",
                "+---+",
                "",
                "[ Exits: N S ]",
                "<MAPEND>",
            ],
        );

        assert!(consumed.iter().all(|&c| c));
        assert_eq!(t.room_name(), "Grand Hall");
        assert_eq!(t.map_lines(), &["+---+", "| @ |", "+---+"]);
        assert!(t.exits().contains("N S"));
    }

    #[test]
    fn test_exits_scanned_from_end() {
        let mut t = tracker();
        feed(
            &mut t,
            &[
                "<MAPSTART>",
                "Twisty Passage",
                "###",
                "exits: fake interior line",
                "###",
                "Exits: E W",
                "<MAPEND>",
            ],
        );

        assert_eq!(t.exits(), "Exits: E W");
        // The interior line that also matches stays in the map body
        assert_eq!(
            t.map_lines(),
            &["###", "exits: fake interior line", "###"]
        );
    }

    #[test]
    fn test_room_name_line_after_block() {
        let mut t = tracker();
        feed(
            &mut t,
            &["<MAPSTART>", "Old Name", "<MAPEND>", "", "Temple Square (G) (123)"],
        );

        assert_eq!(t.room_name(), "Temple Square");
    }

    #[test]
    fn test_non_name_line_after_block_falls_through() {
        let mut t = tracker();
        feed(&mut t, &["<MAPSTART>", "Hall", "<MAPEND>"]);

        // Does not look like a room name: not consumed, classification resumes
        assert!(!t.feed_line("> prompt text", "> prompt text"));
        assert_eq!(t.room_name(), "Hall");
    }

    #[test]
    fn test_coords_outside_blocks() {
        let mut t = tracker();
        assert!(t.feed_line("{coords}0,30,20", "{coords}0,30,20"));
        assert_eq!(t.coords(), "0,30,20");

        // Persists until overwritten
        feed(&mut t, &["<MAPSTART>", "Hall", "<MAPEND>"]);
        assert_eq!(t.coords(), "0,30,20");
        assert!(t.feed_line("{coords}1,1,1", "{coords}1,1,1"));
        assert_eq!(t.coords(), "1,1,1");
    }

    #[test]
    fn test_rdesc_prose_joined_into_paragraphs() {
        let mut t = tracker();
        feed(
            &mut t,
            &[
                "{rdesc}",
                "A vast hall stretches",
                "before you.",
                "",
                "Dust motes dance in the light.",
                "{/rdesc}",
            ],
        );

        assert_eq!(
            t.room_desc(),
            &[
                "A vast hall stretches before you.",
                "Dust motes dance in the light."
            ]
        );
    }

    #[test]
    fn test_rdesc_art_kept_as_lines() {
        let mut t = tracker();
        feed(
            &mut t,
            &["{rdesc}", " /\\ ", "/  \\", "|==|", "{/rdesc}"],
        );

        assert_eq!(t.room_desc(), &[" /\\ ", "/  \\", "|==|"]);
    }

    #[test]
    fn test_rdesc_replaced_per_block() {
        let mut t = tracker();
        feed(&mut t, &["{rdesc}", "First room here.", "{/rdesc}"]);
        feed(&mut t, &["{rdesc}", "Second room now.", "{/rdesc}"]);

        assert_eq!(t.room_desc(), &["Second room now."]);
    }

    #[test]
    fn test_unterminated_block_publishes_nothing() {
        let mut t = tracker();
        feed(&mut t, &["<MAPSTART>", "Hall", "+--+"]);

        assert!(t.map_lines().is_empty());
        assert_eq!(t.room_name(), "");

        // A new start tag abandons the stale accumulation
        feed(&mut t, &["<MAPSTART>", "Armory", "##", "<MAPEND>"]);
        assert_eq!(t.room_name(), "Armory");
        assert_eq!(t.map_lines(), &["##"]);
    }

    #[test]
    fn test_empty_block_is_noop() {
        let mut t = tracker();
        feed(&mut t, &["<MAPSTART>", "<MAPEND>"]);

        assert!(t.map_lines().is_empty());
        assert_eq!(t.room_name(), "");
    }

    #[test]
    fn test_clear() {
        let mut t = tracker();
        feed(
            &mut t,
            &["<MAPSTART>", "Hall", "##", "Exits: N", "<MAPEND>"],
        );
        t.clear();

        assert!(!t.has_map());
        assert_eq!(t.room_name(), "");
        assert_eq!(t.exits(), "");
    }
}
