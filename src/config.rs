use std::fmt;
use std::fs;
use std::time::Duration;

/// Errors raised while loading or parsing the configuration file
#[derive(Debug)]
pub enum ConfigError {
    UnknownSection(String),
    UnknownKey(String),
    InvalidValue(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownSection(s) => write!(f, "unknown section [{}]", s),
            ConfigError::UnknownKey(k) => write!(f, "unknown key '{}'", k),
            ConfigError::InvalidValue(k, v) => write!(f, "invalid value '{}' for key '{}'", v, k),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct GmcpConfig {
    /// Subscription strings sent in Core.Supports.Set after negotiation
    pub subscriptions: Vec<String>,
}

/// Map detection patterns. All values are regular expressions matched
/// against the color-stripped line.
#[derive(Debug, Clone)]
pub struct MapPatterns {
    pub start_tag: String,
    pub end_tag: String,
    pub rdesc_start: String,
    pub rdesc_end: String,
    pub coords: String,
    pub exits: String,
}

#[derive(Debug, Clone)]
pub struct InfoPatterns {
    /// Prefix marking an info-channel line
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct HelpPatterns {
    pub start_tag: String,
    pub end_tag: String,
    pub body_start: String,
    pub body_end: String,
    pub tags: String,
    pub keywords: String,
}

/// One speech pattern. The regex must define named groups `speaker`,
/// `quote`, and `message`.
#[derive(Debug, Clone)]
pub struct SpeechPattern {
    pub label: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct ConversationPatterns {
    /// Ordered list - the first matching pattern wins
    pub patterns: Vec<SpeechPattern>,
}

#[derive(Debug, Clone)]
pub struct PatternsConfig {
    pub map: MapPatterns,
    pub info: InfoPatterns,
    pub help: HelpPatterns,
    pub conversation: ConversationPatterns,
}

#[derive(Debug, Clone)]
pub struct InfoTimers {
    /// Minimum time the current ticker entry stays up before the queue advances
    pub min_display: Duration,
    /// Idle time after which an unqueued ticker entry is hidden
    pub auto_hide: Duration,
    pub max_history: usize,
}

#[derive(Debug, Clone)]
pub struct ConversationTimers {
    /// Idle time after which the overlay closes (if caught up)
    pub auto_close: Duration,
}

#[derive(Debug, Clone)]
pub struct TimersConfig {
    pub info: InfoTimers,
    pub conversation: ConversationTimers,
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub max_output_lines: usize,
    pub right_panel_max_width: usize,
    pub right_panel_ratio: f32,
}

#[derive(Debug, Clone)]
pub struct HooksConfig {
    /// Commands sent once GMCP vitals first arrive (the post-login signal)
    pub post_login: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,
    pub gmcp: GmcpConfig,
    pub patterns: PatternsConfig,
    pub timers: TimersConfig,
    pub ui: UiConfig,
    pub hooks: HooksConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: None,
                port: None,
            },
            gmcp: GmcpConfig {
                subscriptions: vec![
                    "char 1".to_string(),
                    "char.vitals 1".to_string(),
                    "char.stats 1".to_string(),
                    "char.status 1".to_string(),
                    "char.maxstats 1".to_string(),
                ],
            },
            patterns: PatternsConfig {
                map: MapPatterns {
                    start_tag: r"<MAPSTART>".to_string(),
                    end_tag: r"<MAPEND>".to_string(),
                    rdesc_start: r"\{rdesc\}".to_string(),
                    rdesc_end: r"\{/rdesc\}".to_string(),
                    coords: r"\{coords\}(\S+)".to_string(),
                    exits: r"(?i)^\s*\[?\s*Exits:\s*.*\]?\s*$".to_string(),
                },
                info: InfoPatterns {
                    prefix: r"^INFO:\s+".to_string(),
                },
                help: HelpPatterns {
                    start_tag: r"\{help\}".to_string(),
                    end_tag: r"\{/help\}".to_string(),
                    body_start: r"\{helpbody\}".to_string(),
                    body_end: r"\{/helpbody\}".to_string(),
                    tags: r"\{helptags\}(.*)$".to_string(),
                    keywords: r"\{helpkeywords\}".to_string(),
                },
                conversation: ConversationPatterns {
                    patterns: default_speech_patterns(),
                },
            },
            timers: TimersConfig {
                info: InfoTimers {
                    min_display: Duration::from_secs(10),
                    auto_hide: Duration::from_secs(40),
                    max_history: 200,
                },
                conversation: ConversationTimers {
                    auto_close: Duration::from_secs(8),
                },
            },
            ui: UiConfig {
                max_output_lines: 5000,
                right_panel_max_width: 70,
                right_panel_ratio: 0.40,
            },
            hooks: HooksConfig {
                post_login: vec!["map".to_string(), "look".to_string()],
            },
        }
    }
}

/// Default speech patterns: a multi-word speaker, an optional verb suffix
/// and comma, then a quote character and the message start.
fn default_speech_patterns() -> Vec<SpeechPattern> {
    const SPEAKER: &str = r"^(?P<speaker>[\w'-]+(?:\s+[\w'-]+)*?)";
    const TAIL: &str = r#",?\s+(?P<quote>['"])(?P<message>.+)"#;

    vec![
        SpeechPattern {
            label: "says".to_string(),
            pattern: format!(r"{SPEAKER}\s+says?{TAIL}"),
        },
        SpeechPattern {
            label: "tells".to_string(),
            pattern: format!(r"{SPEAKER}\s+tells?\s+you{TAIL}"),
        },
        SpeechPattern {
            label: "whispers".to_string(),
            pattern: format!(r"{SPEAKER}\s+whispers?{TAIL}"),
        },
        SpeechPattern {
            label: "yells".to_string(),
            pattern: format!(r"{SPEAKER}\s+(?:yells?|shouts?){TAIL}"),
        },
        SpeechPattern {
            label: "asks".to_string(),
            pattern: format!(r"{SPEAKER}\s+(?:asks?|exclaims?|questions?){TAIL}"),
        },
    ]
}

impl ClientConfig {
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse_config(&content),
            Err(_) => {
                // Create default config file if it doesn't exist
                let default_config = Self::default();
                let config_content = default_config.to_config_file_format();
                if let Err(e) = fs::write(path, config_content) {
                    eprintln!("Warning: Could not create default config file: {}", e);
                }
                Ok(default_config)
            }
        }
    }

    pub fn parse_config(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut current_section = String::new();
        // The first speech pattern in the file replaces the default set
        let mut conversation_cleared = false;

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Handle sections
            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].to_string();
                continue;
            }

            // Handle key-value pairs
            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim().trim_matches('"');

                match current_section.as_str() {
                    "connection" => config.parse_connection_config(key, value)?,
                    "gmcp" => config.parse_gmcp_config(key, value)?,
                    "patterns.map" => config.parse_map_patterns(key, value)?,
                    "patterns.info" => config.parse_info_patterns(key, value)?,
                    "patterns.help" => config.parse_help_patterns(key, value)?,
                    "patterns.conversation" => {
                        if !conversation_cleared {
                            config.patterns.conversation.patterns.clear();
                            conversation_cleared = true;
                        }
                        config.patterns.conversation.patterns.push(SpeechPattern {
                            label: key.to_string(),
                            pattern: value.to_string(),
                        });
                    }
                    "timers.info" => config.parse_info_timers(key, value)?,
                    "timers.conversation" => config.parse_conversation_timers(key, value)?,
                    "ui" => config.parse_ui_config(key, value)?,
                    "hooks" => config.parse_hooks_config(key, value)?,
                    _ => return Err(ConfigError::UnknownSection(current_section.clone())),
                }
            }
        }

        Ok(config)
    }

    fn parse_connection_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "host" => {
                if value.is_empty() || value == "none" {
                    self.connection.host = None;
                } else {
                    self.connection.host = Some(value.to_string());
                }
            }
            "port" => {
                if value.is_empty() || value == "none" {
                    self.connection.port = None;
                } else {
                    self.connection.port = Some(value.parse().map_err(|_| {
                        ConfigError::InvalidValue(key.to_string(), value.to_string())
                    })?);
                }
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_gmcp_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "subscriptions" => {
                self.gmcp.subscriptions = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_map_patterns(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "start_tag" => self.patterns.map.start_tag = value.to_string(),
            "end_tag" => self.patterns.map.end_tag = value.to_string(),
            "rdesc_start" => self.patterns.map.rdesc_start = value.to_string(),
            "rdesc_end" => self.patterns.map.rdesc_end = value.to_string(),
            "coords" => self.patterns.map.coords = value.to_string(),
            "exits" => self.patterns.map.exits = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_info_patterns(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "prefix" => self.patterns.info.prefix = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_help_patterns(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "start_tag" => self.patterns.help.start_tag = value.to_string(),
            "end_tag" => self.patterns.help.end_tag = value.to_string(),
            "body_start" => self.patterns.help.body_start = value.to_string(),
            "body_end" => self.patterns.help.body_end = value.to_string(),
            "tags" => self.patterns.help.tags = value.to_string(),
            "keywords" => self.patterns.help.keywords = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_info_timers(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "min_display" => {
                self.timers.info.min_display = parse_seconds(key, value)?;
            }
            "auto_hide" => {
                self.timers.info.auto_hide = parse_seconds(key, value)?;
            }
            "max_history" => {
                self.timers.info.max_history = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_conversation_timers(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "auto_close" => {
                self.timers.conversation.auto_close = parse_seconds(key, value)?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_ui_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "max_output_lines" => {
                self.ui.max_output_lines = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            "right_panel_max_width" => {
                self.ui.right_panel_max_width = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            "right_panel_ratio" => {
                self.ui.right_panel_ratio = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_hooks_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "post_login" => {
                self.hooks.post_login = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn to_config_file_format(&self) -> String {
        let mut out = format!(
            r#"# Wayfarer MUD Client Configuration File
# Lines starting with # are comments

[connection]
# Default server (overridden by command-line host/port)
host = {}
port = {}

[gmcp]
# Comma-separated GMCP subscription strings for Core.Supports.Set
subscriptions = {}

[patterns.map]
# Regular expressions, matched against color-stripped lines
start_tag = {}
end_tag = {}
rdesc_start = {}
rdesc_end = {}
coords = {}
exits = {}

[patterns.info]
prefix = {}

[patterns.help]
start_tag = {}
end_tag = {}
body_start = {}
body_end = {}
tags = {}
keywords = {}

[patterns.conversation]
# key = label, value = regex with named groups: speaker, quote, message
# Listed in precedence order - the first match wins
"#,
            self.connection
                .host
                .clone()
                .unwrap_or_else(|| "none".to_string()),
            self.connection
                .port
                .map_or("none".to_string(), |p| p.to_string()),
            self.gmcp.subscriptions.join(", "),
            self.patterns.map.start_tag,
            self.patterns.map.end_tag,
            self.patterns.map.rdesc_start,
            self.patterns.map.rdesc_end,
            self.patterns.map.coords,
            self.patterns.map.exits,
            self.patterns.info.prefix,
            self.patterns.help.start_tag,
            self.patterns.help.end_tag,
            self.patterns.help.body_start,
            self.patterns.help.body_end,
            self.patterns.help.tags,
            self.patterns.help.keywords,
        );

        for sp in &self.patterns.conversation.patterns {
            out.push_str(&format!("{} = {}\n", sp.label, sp.pattern));
        }

        out.push_str(&format!(
            r#"
[timers.info]
# Seconds
min_display = {}
auto_hide = {}
max_history = {}

[timers.conversation]
auto_close = {}

[ui]
max_output_lines = {}
right_panel_max_width = {}
right_panel_ratio = {}

[hooks]
# Commands sent when GMCP vitals first arrive (post-login)
post_login = {}
"#,
            self.timers.info.min_display.as_secs_f64(),
            self.timers.info.auto_hide.as_secs_f64(),
            self.timers.info.max_history,
            self.timers.conversation.auto_close.as_secs_f64(),
            self.ui.max_output_lines,
            self.ui.right_panel_max_width,
            self.ui.right_panel_ratio,
            self.hooks.post_login.join(", "),
        ));

        out
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
    if seconds < 0.0 || !seconds.is_finite() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            value.to_string(),
        ));
    }
    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();

        assert!(config.connection.host.is_none());
        assert_eq!(config.gmcp.subscriptions.len(), 5);
        assert_eq!(config.patterns.map.start_tag, "<MAPSTART>");
        assert_eq!(config.patterns.conversation.patterns.len(), 5);
        assert_eq!(config.timers.info.min_display, Duration::from_secs(10));
        assert_eq!(config.hooks.post_login, vec!["map", "look"]);
    }

    #[test]
    fn test_parse_sections() {
        let content = r#"
[connection]
host = mud.example.com
port = 4000

[timers.info]
min_display = 2.5
auto_hide = 15
max_history = 50

[ui]
max_output_lines = 1000
"#;
        let config = ClientConfig::parse_config(content).unwrap();

        assert_eq!(config.connection.host.as_deref(), Some("mud.example.com"));
        assert_eq!(config.connection.port, Some(4000));
        assert_eq!(config.timers.info.min_display, Duration::from_secs_f64(2.5));
        assert_eq!(config.timers.info.auto_hide, Duration::from_secs(15));
        assert_eq!(config.timers.info.max_history, 50);
        assert_eq!(config.ui.max_output_lines, 1000);
    }

    #[test]
    fn test_conversation_patterns_replace_defaults() {
        let content = r#"
[patterns.conversation]
chants = ^(?P<speaker>\w+) chants,? (?P<quote>['"])(?P<message>.+)
"#;
        let config = ClientConfig::parse_config(content).unwrap();

        assert_eq!(config.patterns.conversation.patterns.len(), 1);
        assert_eq!(config.patterns.conversation.patterns[0].label, "chants");
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = ClientConfig::parse_config("[nonsense]\nfoo = bar\n");
        assert!(matches!(result, Err(ConfigError::UnknownSection(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = ClientConfig::parse_config("[connection]\nfoo = bar\n");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let result = ClientConfig::parse_config("[connection]\nport = lots\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_, _))));
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = ClientConfig::default();
        config.connection.host = Some("mud.example.com".to_string());
        config.connection.port = Some(4000);

        let text = config.to_config_file_format();
        let reparsed = ClientConfig::parse_config(&text).unwrap();

        assert_eq!(reparsed.connection.host, config.connection.host);
        assert_eq!(reparsed.connection.port, config.connection.port);
        assert_eq!(reparsed.gmcp.subscriptions, config.gmcp.subscriptions);
        assert_eq!(
            reparsed.patterns.map.exits,
            config.patterns.map.exits
        );
        assert_eq!(
            reparsed
                .patterns
                .conversation
                .patterns
                .iter()
                .map(|p| p.label.clone())
                .collect::<Vec<_>>(),
            config
                .patterns
                .conversation
                .patterns
                .iter()
                .map(|p| p.label.clone())
                .collect::<Vec<_>>()
        );
        assert_eq!(
            reparsed.timers.conversation.auto_close,
            config.timers.conversation.auto_close
        );
        assert_eq!(reparsed.hooks.post_login, config.hooks.post_login);
    }

    #[test]
    fn test_load_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wayfarer.conf");
        let path_str = path.to_str().unwrap();

        let config = ClientConfig::load_from_file(path_str).unwrap();
        assert!(config.connection.host.is_none());
        // The default file was created and parses back
        assert!(path.is_file());
        let reloaded = ClientConfig::load_from_file(path_str).unwrap();
        assert_eq!(reloaded.ui.max_output_lines, config.ui.max_output_lines);
    }
}
