//! Terminal renderer.
//!
//! Full redraw each loop iteration: output panel on the left, a right
//! panel with the map and vitals once the server provides them, the info
//! ticker along the top, and the conversation / help overlays boxed over
//! the output area. All drawing is queued and flushed once.

use std::io::Write;

use crossterm::{
    QueueableCommand, cursor,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use telnet_gmcp::GmcpCodec;

use crate::ansi::{AnsiState, parse_sgr};
use crate::config::UiConfig;
use crate::input::InputBuffer;
use crate::trackers::{OutputClassifier, OutputLine};

/// Map an ANSI attribute state to crossterm colors. Bold promotes the
/// standard colors to their bright variants, the way most MUDs expect.
fn term_colors(style: &AnsiState) -> (Color, Option<Color>) {
    let fg = match (style.fg, style.bold) {
        (0, false) => Color::Black,
        (0, true) => Color::DarkGrey,
        (1, false) => Color::DarkRed,
        (1, true) => Color::Red,
        (2, false) => Color::DarkGreen,
        (2, true) => Color::Green,
        (3, false) => Color::DarkYellow,
        (3, true) => Color::Yellow,
        (4, false) => Color::DarkBlue,
        (4, true) => Color::Blue,
        (5, false) => Color::DarkMagenta,
        (5, true) => Color::Magenta,
        (6, false) => Color::DarkCyan,
        (6, true) => Color::Cyan,
        (7, true) => Color::White,
        _ => Color::Grey,
    };
    let bg = style.bg.map(|b| match b {
        0 => Color::Black,
        1 => Color::DarkRed,
        2 => Color::DarkGreen,
        3 => Color::DarkYellow,
        4 => Color::DarkBlue,
        5 => Color::DarkMagenta,
        6 => Color::DarkCyan,
        _ => Color::Grey,
    });
    (fg, bg)
}

/// Simple word wrap for overlay rendering
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
        // A single word longer than the width gets hard-split
        while current.chars().count() > width {
            let head: String = current.chars().take(width).collect();
            let tail: String = current.chars().skip(width).collect();
            lines.push(head);
            current = tail;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn clip(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

pub struct Ui {
    right_panel_max_width: usize,
    right_panel_ratio: f32,
    color_enabled: bool,
    /// Lines scrolled up from the bottom of the filtered view
    pub output_scroll: usize,
}

impl Ui {
    pub fn new(config: &UiConfig, color_enabled: bool) -> Self {
        Self {
            right_panel_max_width: config.right_panel_max_width,
            right_panel_ratio: config.right_panel_ratio,
            color_enabled,
            output_scroll: 0,
        }
    }

    pub fn scroll_up(&mut self, amount: usize, visible: usize, total: usize) {
        let max_scroll = total.saturating_sub(visible);
        self.output_scroll = (self.output_scroll + amount).min(max_scroll);
    }

    pub fn scroll_down(&mut self, amount: usize) {
        self.output_scroll = self.output_scroll.saturating_sub(amount);
    }

    /// Queue one colored line at (x, y), clipped to `width` columns
    fn queue_line<W: Write>(
        &self,
        writer: &mut W,
        x: u16,
        y: u16,
        line: &OutputLine,
        width: usize,
    ) -> std::io::Result<()> {
        writer.queue(cursor::MoveTo(x, y))?;
        if !self.color_enabled {
            writer.queue(Print(clip(&line.raw, width)))?;
            return Ok(());
        }

        let (spans, _) = parse_sgr(&line.raw, line.entry_style);
        let mut used = 0;
        for span in &spans {
            if used >= width {
                break;
            }
            let text = clip(&span.text, width - used);
            used += text.chars().count();

            let (fg, bg) = term_colors(&span.style);
            writer.queue(SetForegroundColor(fg))?;
            if let Some(bg) = bg {
                writer.queue(SetBackgroundColor(bg))?;
            }
            if span.style.underline {
                writer.queue(SetAttribute(Attribute::Underlined))?;
            }
            if span.style.reverse {
                writer.queue(SetAttribute(Attribute::Reverse))?;
            }
            writer.queue(Print(text))?;
            writer.queue(ResetColor)?;
            writer.queue(SetAttribute(Attribute::Reset))?;
        }
        Ok(())
    }

    fn queue_plain<W: Write>(
        &self,
        writer: &mut W,
        x: u16,
        y: u16,
        text: &str,
        width: usize,
    ) -> std::io::Result<()> {
        writer.queue(cursor::MoveTo(x, y))?;
        writer.queue(Print(clip(text, width)))?;
        Ok(())
    }

    /// ASCII box frame: '+' corners, '-'/'|' edges
    fn queue_box<W: Write>(
        &self,
        writer: &mut W,
        x: u16,
        y: u16,
        w: usize,
        h: usize,
        title: &str,
    ) -> std::io::Result<()> {
        if w < 4 || h < 2 {
            return Ok(());
        }
        let inner = w - 2;
        let title = clip(title, inner.saturating_sub(2));
        let title_len = title.chars().count();
        let pad = inner.saturating_sub(title_len + 2);
        let left_pad = pad / 2;

        let mut top = String::from("+");
        top.push_str(&"-".repeat(left_pad));
        if title_len > 0 {
            top.push(' ');
            top.push_str(&title);
            top.push(' ');
            top.push_str(&"-".repeat(inner - left_pad - title_len - 2));
        } else {
            top.push_str(&"-".repeat(inner - left_pad));
        }
        top.push('+');
        writer.queue(cursor::MoveTo(x, y))?;
        writer.queue(Print(top))?;

        for row in 1..h.saturating_sub(1) {
            writer.queue(cursor::MoveTo(x, y + row as u16))?;
            writer.queue(Print(format!("|{}|", " ".repeat(inner))))?;
        }

        writer.queue(cursor::MoveTo(x, y + (h - 1) as u16))?;
        writer.queue(Print(format!("+{}+", "-".repeat(inner))))?;
        Ok(())
    }

    /// Render everything. The caller flushes.
    #[allow(clippy::too_many_arguments)]
    pub fn draw<W: Write>(
        &mut self,
        writer: &mut W,
        size: (u16, u16),
        classifier: &OutputClassifier,
        gmcp: &GmcpCodec,
        input: &InputBuffer,
        echo_suppressed: bool,
        status: &str,
    ) -> std::io::Result<()> {
        let (w, h) = size;
        let (w, h) = (w as usize, h as usize);
        if w < 10 || h < 6 {
            return Ok(());
        }

        writer.queue(Clear(ClearType::All))?;

        // Top line: info ticker when visible, idle status otherwise
        if let Some(entry) = classifier.info.current() {
            writer.queue(cursor::MoveTo(0, 0))?;
            writer.queue(SetAttribute(Attribute::Reverse))?;
            writer.queue(Print(clip(&format!(" {} ", entry.text), w)))?;
            writer.queue(SetAttribute(Attribute::Reset))?;
        } else {
            self.queue_plain(writer, 0, 0, status, w)?;
        }

        // Split the middle between the output panel and the right panel
        let show_right = classifier.map.has_map() || gmcp.vitals().is_some();
        let right_width = if show_right {
            ((w as f32 * self.right_panel_ratio) as usize).min(self.right_panel_max_width)
        } else {
            0
        };
        let output_width = w - right_width;
        let output_top = 1usize;
        let output_height = h - 3;

        // Output panel: bottom-aligned slice of the filtered stream
        let display = classifier.display();
        let total = display.len();
        let visible = output_height.min(total);
        let end = total.saturating_sub(self.output_scroll.min(total.saturating_sub(visible)));
        let start = end.saturating_sub(output_height);
        for (i, line) in display[start..end].iter().enumerate() {
            self.queue_line(
                writer,
                0,
                (output_top + i) as u16,
                line,
                output_width.saturating_sub(1),
            )?;
        }

        if right_width > 0 {
            self.draw_right_panel(
                writer,
                output_width as u16,
                output_top as u16,
                right_width,
                output_height,
                classifier,
                gmcp,
            )?;
        }

        if classifier.conversation.visible() {
            self.draw_conversation(writer, w, h, classifier)?;
        }

        if classifier.help.visible() {
            self.draw_help(writer, w, h, classifier)?;
        }

        // Status line
        writer.queue(cursor::MoveTo(0, (h - 2) as u16))?;
        writer.queue(SetAttribute(Attribute::Reverse))?;
        let mut status_line = status.to_string();
        if !classifier.map.coords().is_empty() {
            status_line.push_str(&format!("  [{}]", classifier.map.coords()));
        }
        writer.queue(Print(clip(
            &format!("{status_line:<width$}", width = w),
            w,
        )))?;
        writer.queue(SetAttribute(Attribute::Reset))?;

        // Input line, masked in password mode
        let prompt = "> ";
        let shown: String = if echo_suppressed {
            "*".repeat(input.text().chars().count())
        } else {
            input.text()
        };
        self.queue_plain(writer, 0, (h - 1) as u16, &format!("{prompt}{shown}"), w)?;
        let cursor_x = (prompt.chars().count() + input.cursor()).min(w - 1);
        writer.queue(cursor::MoveTo(cursor_x as u16, (h - 1) as u16))?;

        Ok(())
    }

    fn draw_right_panel<W: Write>(
        &self,
        writer: &mut W,
        x: u16,
        y: u16,
        width: usize,
        height: usize,
        classifier: &OutputClassifier,
        gmcp: &GmcpCodec,
    ) -> std::io::Result<()> {
        let inner = width.saturating_sub(2);
        let mut row = 0usize;
        let map = &classifier.map;

        let mut push = |writer: &mut W, row: &mut usize, text: &str| -> std::io::Result<()> {
            if *row < height {
                writer.queue(cursor::MoveTo(x + 1, y + *row as u16))?;
                writer.queue(Print(clip(text, inner)))?;
                *row += 1;
            }
            Ok(())
        };

        if !map.room_name().is_empty() {
            push(writer, &mut row, map.room_name())?;
        }
        if !map.exits().is_empty() {
            push(writer, &mut row, map.exits())?;
        }
        if !map.coords().is_empty() {
            push(writer, &mut row, &format!("({})", map.coords()))?;
        }
        if map.has_map() {
            push(writer, &mut row, "")?;
            for line in map.map_lines() {
                push(writer, &mut row, &crate::ansi::strip_sgr(line))?;
            }
        }
        if !map.room_desc().is_empty() {
            push(writer, &mut row, "")?;
            for paragraph in map.room_desc() {
                for wrapped in wrap_text(&crate::ansi::strip_sgr(paragraph), inner) {
                    push(writer, &mut row, &wrapped)?;
                }
            }
        }

        // Vitals at the bottom of the panel
        if let Some(vitals) = gmcp.vitals() {
            let maxstats = gmcp.max_stats();
            let fetch = |source: Option<&serde_json::Map<String, serde_json::Value>>,
                         key: &str|
             -> String {
                source.and_then(|m| m.get(key))
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "?".to_string())
            };
            let line = format!(
                "HP {}/{}  MN {}/{}  MV {}/{}",
                fetch(Some(vitals), "hp"),
                fetch(maxstats, "maxhp"),
                fetch(Some(vitals), "mana"),
                fetch(maxstats, "maxmana"),
                fetch(Some(vitals), "moves"),
                fetch(maxstats, "maxmoves"),
            );
            if height > 0 {
                writer.queue(cursor::MoveTo(x + 1, y + (height - 1) as u16))?;
                writer.queue(Print(clip(&line, inner)))?;
            }
        }

        Ok(())
    }

    fn draw_conversation<W: Write>(
        &self,
        writer: &mut W,
        w: usize,
        h: usize,
        classifier: &OutputClassifier,
    ) -> std::io::Result<()> {
        let conv = &classifier.conversation;
        let Some(entry) = conv.current_entry() else {
            return Ok(());
        };

        let box_w = (w * 2 / 5).clamp(24, 60).min(w);
        let inner = box_w - 4;
        let message = wrap_text(&entry.message, inner);
        // Border, speaker, message, blank, nav hint, border
        let box_h = (message.len() + 4).min(h.saturating_sub(4));
        let x = (w - box_w) as u16;
        let y = (h - 2 - box_h) as u16;

        self.queue_box(writer, x, y, box_w, box_h, &entry.speaker)?;
        for (i, line) in message.iter().enumerate() {
            if i + 1 >= box_h - 1 {
                break;
            }
            self.queue_plain(writer, x + 2, y + 1 + i as u16, line, inner)?;
        }
        let nav = format!("{}  Tab next  Esc close", conv.queue_status());
        self.queue_plain(writer, x + 2, y + (box_h - 2) as u16, &nav, inner)?;
        Ok(())
    }

    fn draw_help<W: Write>(
        &self,
        writer: &mut W,
        w: usize,
        h: usize,
        classifier: &OutputClassifier,
    ) -> std::io::Result<()> {
        let help = &classifier.help;
        let Some(content) = help.content() else {
            return Ok(());
        };

        let box_w = (w * 4 / 5).max(20).min(w);
        let box_h = (h * 4 / 5).max(6).min(h.saturating_sub(2));
        let inner_w = box_w - 4;
        let inner_h = box_h - 3;
        let x = ((w - box_w) / 2) as u16;
        let y = ((h - box_h) / 2) as u16;

        self.queue_box(writer, x, y, box_w, box_h, &content.title)?;

        let all_lines: Vec<&String> = content
            .header_lines
            .iter()
            .chain(content.body_lines.iter())
            .collect();
        let offset = help.scroll_offset().min(all_lines.len());
        for (i, line) in all_lines.iter().skip(offset).take(inner_h).enumerate() {
            let shown = OutputLine {
                raw: (*line).clone(),
                entry_style: AnsiState::default(),
            };
            self.queue_line(writer, x + 2, y + 1 + i as u16, &shown, inner_w)?;
        }
        let hint = "PgUp/PgDn scroll  Home/End  Esc close";
        self.queue_plain(writer, x + 2, y + (box_h - 2) as u16, hint, inner_w)?;
        Ok(())
    }
}
