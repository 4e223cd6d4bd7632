//! The client session: one cooperative loop tying the connection, the
//! classification pipeline, the timers, and the terminal together.
//!
//! Each iteration polls the socket without blocking, merges GMCP payloads
//! into state *before* classifying the text from the same read (the map
//! tagger's enable gate depends on vitals arriving first), advances the
//! ticker and overlay timers from a single clock reading, processes at
//! most one input event, and redraws.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::{
    QueueableCommand, cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};

use telnet_gmcp::GmcpCodec;

use crate::config::ClientConfig;
use crate::connection::{MudConnection, ProtoDirection};
use crate::errors::ClientResult;
use crate::history::CommandHistory;
use crate::input::InputBuffer;
use crate::trackers::OutputClassifier;
use crate::ui::Ui;

/// Restores the terminal even when the session errors out
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.queue(EnterAlternateScreen)?;
        stdout.queue(cursor::Show)?;
        stdout.flush()?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = stdout.queue(LeaveAlternateScreen);
        let _ = stdout.flush();
        let _ = terminal::disable_raw_mode();
    }
}

pub struct ClientSession {
    config: ClientConfig,
    connection: MudConnection,
    gmcp: GmcpCodec,
    classifier: OutputClassifier,
    input: InputBuffer,
    history: CommandHistory,
    ui: Ui,
    host: String,
    port: u16,
    /// Post-login hook commands fired once, when vitals first arrive
    hooks_sent: bool,
    quit: bool,
}

impl ClientSession {
    pub fn new(config: ClientConfig, host: &str, port: u16, color: bool) -> ClientResult<Self> {
        let classifier = OutputClassifier::new(&config, color)?;
        let connection = MudConnection::new(host, port, config.gmcp.subscriptions.clone());
        let ui = Ui::new(&config.ui, color);

        Ok(Self {
            config,
            connection,
            gmcp: GmcpCodec::new(),
            classifier,
            input: InputBuffer::new(),
            history: CommandHistory::default(),
            ui,
            host: host.to_string(),
            port,
            hooks_sent: false,
            quit: false,
        })
    }

    pub fn run(&mut self) -> ClientResult<()> {
        self.connection.connect(Duration::from_secs(10))?;

        let _guard = TerminalGuard::enter()?;
        self.classifier.add_system_message("Type /quit to exit.");

        while !self.quit {
            self.step()?;
        }

        self.connection.close();
        Ok(())
    }

    /// One loop iteration. Split out of `run` so tests can drive it.
    fn step(&mut self) -> ClientResult<()> {
        // Drain the socket. GMCP is merged before the text from the same
        // read goes through classification - this ordering is load-bearing.
        let burst = self.connection.poll();
        for payload in &burst.gmcp_payloads {
            let msg = self.gmcp.handle(payload);
            log::debug!(target: "gmcp", "{} {}", msg.package, msg.value);
        }
        let now = Instant::now();
        if !burst.text.is_empty() {
            self.classifier.push_text(&burst.text, now);
        }

        // Connection lifecycle events go on screen; raw telnet notes only
        // go to the debug log (MudConnection already logged them)
        for ev in self.connection.take_events() {
            if ev.direction == ProtoDirection::Sys && !ev.preview.starts_with("TELNET") {
                self.classifier.add_system_message(&ev.preview);
            }
        }

        // Vitals showing up means login completed: turn on map detection
        // and ask the server for the first map before the player moves
        if !self.hooks_sent
            && !self.classifier.map.has_map()
            && self.gmcp.vitals().is_some_and(|v| !v.is_empty())
        {
            self.classifier.map.set_enabled(true);
            let hooks = self.config.hooks.post_login.clone();
            for cmd in &hooks {
                self.connection.send_line(cmd);
            }
            self.hooks_sent = true;
        }

        // Timers, one clock reading for the whole tick
        let now = Instant::now();
        if self.classifier.conversation.visible() && self.classifier.conversation.check_auto_close(now) {
            self.classifier.conversation.dismiss();
        }
        self.classifier.info.tick(now);

        // At most one input event per iteration; the 25ms poll is the only
        // place the loop sleeps
        if event::poll(Duration::from_millis(25))? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    self.handle_key(key, now);
                }
                _ => {}
            }
        }

        self.draw()?;
        Ok(())
    }

    fn status_line(&self) -> String {
        let state = if self.connection.connected() {
            "online"
        } else {
            "offline"
        };
        format!(
            " {}:{} ({})  F1 help  Tab conversation  /quit",
            self.host, self.port, state
        )
    }

    fn draw(&mut self) -> ClientResult<()> {
        let mut stdout = io::stdout();
        let size = terminal::size()?;
        let status = self.status_line();
        self.ui.draw(
            &mut stdout,
            size,
            &self.classifier,
            &self.gmcp,
            &self.input,
            self.connection.echo_suppressed(),
            &status,
        )?;
        stdout.flush()?;
        Ok(())
    }

    fn output_page(&self) -> usize {
        terminal::size()
            .map(|(_, h)| (h as usize).saturating_sub(3).max(1))
            .unwrap_or(20)
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Enter => self.submit_line(),
            KeyCode::Up => {
                let text = self.history.navigate_up(&self.input.text());
                self.input.set_text(&text);
            }
            KeyCode::Down => {
                let text = self.history.navigate_down(&self.input.text());
                self.input.set_text(&text);
            }
            KeyCode::Left if ctrl => self.input.move_word_left(),
            KeyCode::Right if ctrl => self.input.move_word_right(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Esc => {
                if self.classifier.help.visible() {
                    self.classifier.help.dismiss();
                } else if self.classifier.conversation.visible() {
                    self.classifier.conversation.dismiss();
                }
            }
            KeyCode::Tab => self.classifier.conversation.navigate_next(now),
            KeyCode::BackTab => self.classifier.conversation.navigate_prev(now),
            KeyCode::F(1) => self.classifier.help.reopen(),
            KeyCode::PageUp => {
                let page = self.output_page();
                if self.classifier.help.visible() {
                    self.classifier.help.scroll_up(page);
                } else {
                    let total = self.classifier.display().len();
                    self.ui.scroll_up(page, page, total);
                }
            }
            KeyCode::PageDown => {
                let page = self.output_page();
                if self.classifier.help.visible() {
                    self.classifier.help.scroll_down(page, page);
                } else {
                    self.ui.scroll_down(page);
                }
            }
            KeyCode::Char('u') if ctrl => self.input.kill_to_start(),
            KeyCode::Char('k') if ctrl => self.input.kill_to_end(),
            KeyCode::Char('w') if ctrl => self.input.kill_word_back(),
            KeyCode::Char('a') if ctrl => self.input.move_home(),
            KeyCode::Char('e') if ctrl => self.input.move_end(),
            KeyCode::Char('c') if ctrl => {
                self.quit = true;
            }
            KeyCode::Char(c) if !ctrl => self.input.insert(c),
            _ => {}
        }
    }

    fn submit_line(&mut self) {
        let line = self.input.take();
        let trimmed = line.trim().to_lowercase();

        match trimmed.as_str() {
            "/quit" => {
                self.quit = true;
            }
            "/clear" => {
                self.classifier.clear();
                self.ui.output_scroll = 0;
            }
            "/info" => self.show_info_history(),
            _ => {
                self.connection.send_line(&line);
                if !self.connection.echo_suppressed() {
                    self.history.add(&line);
                }
            }
        }
    }

    /// Replay recent ticker history into the output pane
    fn show_info_history(&mut self) {
        let entries: Vec<String> = self
            .classifier
            .info
            .history()
            .iter()
            .rev()
            .take(10)
            .map(|e| e.text.clone())
            .collect();
        if entries.is_empty() {
            self.classifier.add_system_message("No info messages yet");
            return;
        }
        for text in entries.iter().rev() {
            self.classifier.add_system_message(text);
        }
    }
}
