//! Info channel ticker.
//!
//! Lines matching the configured prefix (default `INFO: `) are pulled out
//! of the filtered display stream and shown one at a time in a ticker.
//! New entries queue behind the current one; the session loop drives the
//! queue forward with `tick`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use jiff::Timestamp;
use regex::Regex;

use crate::config::{InfoPatterns, InfoTimers};
use crate::errors::ClientResult;

/// One captured info-channel message
#[derive(Debug, Clone)]
pub struct InfoEntry {
    /// Color-stripped message text
    pub text: String,
    /// Original line with color codes preserved
    pub raw_line: String,
    pub timestamp: Timestamp,
}

/// Tracks info-channel messages and manages the news-ticker display.
#[derive(Debug)]
pub struct InfoTracker {
    prefix: Regex,
    min_display: Duration,
    auto_hide: Duration,
    max_history: usize,

    history: Vec<InfoEntry>,
    current: Option<InfoEntry>,
    queue: VecDeque<InfoEntry>,
    /// When the current entry went up
    display_since: Option<Instant>,
}

impl InfoTracker {
    /// Build a tracker from configured pattern and timer settings.
    ///
    /// The prefix pattern should anchor itself (the default starts with `^`).
    pub fn new(patterns: &InfoPatterns, timers: &InfoTimers) -> ClientResult<Self> {
        Ok(Self {
            prefix: Regex::new(&patterns.prefix)?,
            min_display: timers.min_display,
            auto_hide: timers.auto_hide,
            max_history: timers.max_history,
            history: Vec::new(),
            current: None,
            queue: VecDeque::new(),
            display_since: None,
        })
    }

    /// True if `plain` is an info-channel line
    pub fn matches(&self, plain: &str) -> bool {
        self.prefix.is_match(plain)
    }

    /// Record a matched line. Shown immediately when the ticker is idle,
    /// queued otherwise.
    pub fn add(&mut self, plain: &str, raw: &str, now: Instant) {
        let entry = InfoEntry {
            text: plain.to_string(),
            raw_line: raw.to_string(),
            timestamp: Timestamp::now(),
        };
        self.history.push(entry.clone());
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            self.history.drain(..excess);
        }
        if self.current.is_none() {
            self.show(entry, now);
        } else {
            self.queue.push_back(entry);
        }
    }

    /// Called once per loop iteration. Advances the queue after the minimum
    /// display time, hides the ticker once it has idled with nothing queued.
    pub fn tick(&mut self, now: Instant) {
        let Some(since) = self.display_since else {
            return;
        };
        if self.current.is_none() {
            return;
        }
        let elapsed = now.duration_since(since);
        if !self.queue.is_empty() {
            if elapsed >= self.min_display {
                if let Some(next) = self.queue.pop_front() {
                    self.show(next, now);
                }
            }
        } else if elapsed >= self.auto_hide {
            self.current = None;
        }
    }

    fn show(&mut self, entry: InfoEntry, now: Instant) {
        self.current = Some(entry);
        self.display_since = Some(now);
    }

    /// The entry currently on the ticker, if any
    pub fn current(&self) -> Option<&InfoEntry> {
        self.current.as_ref()
    }

    pub fn visible(&self) -> bool {
        self.current.is_some()
    }

    /// All retained entries, oldest first
    pub fn history(&self) -> &[InfoEntry] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.current = None;
        self.queue.clear();
        self.display_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn tracker() -> InfoTracker {
        let config = ClientConfig::default();
        InfoTracker::new(&config.patterns.info, &config.timers.info).unwrap()
    }

    #[test]
    fn test_prefix_match() {
        let t = tracker();
        assert!(t.matches("INFO: Kira has arrived."));
        assert!(!t.matches("Kira says, 'INFO: not really'"));
        assert!(!t.matches("a normal line"));
    }

    #[test]
    fn test_first_entry_shown_immediately() {
        let mut t = tracker();
        let now = Instant::now();

        t.add("INFO: one", "INFO: one", now);
        assert!(t.visible());
        assert_eq!(t.current().unwrap().text, "INFO: one");
    }

    #[test]
    fn test_second_entry_queues_until_min_display() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.add("INFO: one", "INFO: one", t0);
        t.add("INFO: two", "INFO: two", t0);
        assert_eq!(t.current().unwrap().text, "INFO: one");

        // Too early to advance
        t.tick(t0 + Duration::from_secs(5));
        assert_eq!(t.current().unwrap().text, "INFO: one");

        // Past min_display the queue advances
        t.tick(t0 + Duration::from_secs(11));
        assert_eq!(t.current().unwrap().text, "INFO: two");
    }

    #[test]
    fn test_auto_hide_when_queue_empty() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.add("INFO: one", "INFO: one", t0);
        t.tick(t0 + Duration::from_secs(39));
        assert!(t.visible());
        t.tick(t0 + Duration::from_secs(41));
        assert!(!t.visible());
    }

    #[test]
    fn test_history_is_bounded() {
        let config = ClientConfig::default();
        let mut timers = config.timers.info.clone();
        timers.max_history = 3;
        let mut t = InfoTracker::new(&config.patterns.info, &timers).unwrap();
        let now = Instant::now();

        for i in 0..5 {
            let line = format!("INFO: msg {i}");
            t.add(&line, &line, now);
        }
        assert_eq!(t.history().len(), 3);
        assert_eq!(t.history()[0].text, "INFO: msg 2");
    }

    #[test]
    fn test_clear() {
        let mut t = tracker();
        t.add("INFO: one", "INFO: one", Instant::now());
        t.clear();
        assert!(!t.visible());
        assert!(t.history().is_empty());
    }
}
