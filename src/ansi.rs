//! ANSI SGR parsing for server output.
//!
//! MUD servers color their output with SGR escape sequences
//! (`ESC [ <params> m`). This module splits a line into attribute-tagged
//! spans and keeps the attribute state as an explicit value that callers
//! carry from one line to the next - color started in one line bleeds into
//! the following lines until the server resets it.
//!
//! Only SGR sequences are recognized. Anything else (cursor movement,
//! erase sequences) is left in the text untouched, matching what the
//! display layer can actually render.

const ESC: u8 = 0x1b;

/// ANSI text attribute state.
///
/// `fg` is one of the 8 standard colors (0-7, default 7). `bg` is `None`
/// for the terminal default background. The state is a plain value: parsing
/// takes one in and hands the successor back, so tests can feed arbitrary
/// carried states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnsiState {
    pub fg: u8,
    pub bg: Option<u8>,
    pub bold: bool,
    pub underline: bool,
    pub reverse: bool,
}

impl Default for AnsiState {
    fn default() -> Self {
        Self {
            fg: 7,
            bg: None,
            bold: false,
            underline: false,
            reverse: false,
        }
    }
}

impl AnsiState {
    fn apply(&mut self, code: u16) {
        match code {
            0 => *self = AnsiState::default(),
            1 => self.bold = true,
            4 => self.underline = true,
            7 => self.reverse = true,
            22 => self.bold = false,
            24 => self.underline = false,
            27 => self.reverse = false,
            30..=37 => self.fg = (code - 30) as u8,
            39 => self.fg = 7,
            40..=47 => self.bg = Some((code - 40) as u8),
            49 => self.bg = None,
            // Bright foregrounds map onto the base colors with bold forced on
            90..=97 => {
                self.fg = (code - 90) as u8;
                self.bold = true;
            }
            // Unrecognized codes are ignored
            _ => {}
        }
    }
}

/// A run of text rendered with a single attribute state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsiSpan {
    pub text: String,
    pub style: AnsiState,
}

/// Locate an SGR sequence starting at byte `start` (which must be ESC).
/// Returns the byte index one past the final `m`, and the parameter range.
fn sgr_end(bytes: &[u8], start: usize) -> Option<(usize, usize, usize)> {
    if bytes.get(start + 1) != Some(&b'[') {
        return None;
    }
    let params_start = start + 2;
    let mut i = params_start;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b';') {
        i += 1;
    }
    if bytes.get(i) == Some(&b'm') {
        Some((i + 1, params_start, i))
    } else {
        None
    }
}

fn apply_params(state: &mut AnsiState, params: &str) {
    if params.is_empty() {
        state.apply(0);
        return;
    }
    for part in params.split(';') {
        if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(code) = part.parse::<u16>() {
                state.apply(code);
            }
        }
    }
}

/// Parse SGR sequences in `text`, returning attribute-tagged spans and the
/// attribute state left active at the end of the line.
pub fn parse_sgr(text: &str, carried: AnsiState) -> (Vec<AnsiSpan>, AnsiState) {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut state = carried;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == ESC {
            if let Some((end, p_start, p_end)) = sgr_end(bytes, i) {
                if i > last {
                    spans.push(AnsiSpan {
                        text: text[last..i].to_string(),
                        style: state,
                    });
                }
                apply_params(&mut state, &text[p_start..p_end]);
                i = end;
                last = i;
                continue;
            }
        }
        i += 1;
    }

    if last < bytes.len() {
        spans.push(AnsiSpan {
            text: text[last..].to_string(),
            style: state,
        });
    }

    (spans, state)
}

/// Remove all SGR escape sequences from `text`.
///
/// This is the "plain" projection every tag and speech pattern matches
/// against.
pub fn strip_sgr(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == ESC {
            if let Some((end, _, _)) = sgr_end(bytes, i) {
                out.push_str(&text[last..i]);
                i = end;
                last = i;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&text[last..]);
    out
}
