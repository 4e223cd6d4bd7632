//! # Telnet Stream Filter
//!
//! This module separates a raw server byte stream into displayable text,
//! negotiation replies, and GMCP subnegotiation payloads.
//!
//! ## Key Concepts:
//!
//! ### IAC State Machine (RFC 854, Section 4)
//! The filter uses a state machine to handle the IAC (Interpret As Command)
//! protocol:
//! - **Data**: Normal data bytes pass through to the display stream
//! - **Iac**: Found 255, next byte determines the action
//! - **Negotiate**: Processing WILL/WONT/DO/DONT that needs an option byte
//! - **SubnegotiationOption**: Found IAC SB, waiting for the option byte
//! - **Subnegotiation**: Accumulating payload until IAC SE
//!
//! ### Negotiation policy
//! The client accepts exactly one option - GMCP - and refuses every other
//! offer:
//! - `WILL GMCP` => `DO GMCP`, `DO GMCP` => `WILL GMCP`
//! - `WILL <other>` => `DONT <other>`, `DO <other>` => `WONT <other>`
//! - `WONT`/`DONT` are acknowledged with a protocol note only
//!
//! `WILL ECHO` / `WONT ECHO` additionally toggle the echo-suppressed flag
//! (the server-side password-mode signal) even though ECHO itself is refused.
//!
//! ### Chunk boundaries
//! A command or subnegotiation block may be split across TCP reads at any
//! byte. The filter carries its state between `feed` calls, so the
//! concatenated output of chunked feeds always equals the single-call result.

use crate::protocol::{ECHO, GMCP, IAC, TelnetCommand, option_name};

/// Filter state for IAC sequence detection
#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterState {
    /// Expecting normal data or an IAC byte
    Data,
    /// Found IAC (255), expecting a command byte
    Iac,
    /// Found WILL/WONT/DO/DONT, expecting the option byte
    Negotiate(TelnetCommand),
    /// Found IAC SB, expecting the option byte
    SubnegotiationOption,
    /// Accumulating subnegotiation payload until IAC SE
    Subnegotiation {
        /// True when an IAC was seen and the next byte decides between
        /// SE (end of block) and an escaped data byte
        expecting_se: bool,
    },
}

/// Result of feeding a chunk of bytes through the filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedResult {
    /// Bytes that belong on screen (Telnet sequences removed)
    pub display: Vec<u8>,
    /// Negotiation replies that must be written back to the server
    pub responses: Vec<u8>,
    /// Human-readable notes about the protocol traffic, for the debug log
    pub notes: Vec<String>,
    /// Complete GMCP subnegotiation payloads, in arrival order
    pub gmcp_payloads: Vec<Vec<u8>>,
}

/// Stateful Telnet filter for the client side of a MUD connection.
///
/// Strips IAC sequences from the display stream, answers option offers
/// with the accept-GMCP/refuse-everything-else policy, and captures GMCP
/// subnegotiation payloads.
#[derive(Debug, Clone)]
pub struct TelnetFilter {
    state: FilterState,
    /// Option byte of the subnegotiation block currently open (if any)
    sb_option: u8,
    /// Payload accumulator for the open subnegotiation block
    sb_buffer: Vec<u8>,
    /// True after WILL ECHO, false after WONT ECHO
    echo_suppressed: bool,
}

impl Default for TelnetFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetFilter {
    /// Create a new filter in the initial data state
    pub fn new() -> Self {
        Self {
            state: FilterState::Data,
            sb_option: 0,
            sb_buffer: Vec::new(),
            echo_suppressed: false,
        }
    }

    /// True when the server has signaled password mode (WILL ECHO).
    ///
    /// Reflects only the most recent WILL/WONT ECHO negotiation; never
    /// inferred from stream content.
    pub fn echo_suppressed(&self) -> bool {
        self.echo_suppressed
    }

    /// Process a chunk of bytes from the server.
    ///
    /// Bytes are consumed strictly left to right. Sequences truncated by the
    /// end of the chunk are carried in filter state and resume on the next
    /// call - no bytes are lost or misinterpreted at chunk boundaries.
    pub fn feed(&mut self, input: &[u8]) -> FeedResult {
        let mut result = FeedResult::default();

        for &byte in input {
            match self.state {
                FilterState::Data => {
                    if byte == IAC {
                        self.state = FilterState::Iac;
                    } else {
                        result.display.push(byte);
                    }
                }

                FilterState::Iac => match byte {
                    IAC => {
                        // IAC IAC = escaped data byte 255
                        result.display.push(IAC);
                        self.state = FilterState::Data;
                    }
                    b if b == TelnetCommand::SB.to_byte() => {
                        self.state = FilterState::SubnegotiationOption;
                    }
                    b => match TelnetCommand::from_byte(b) {
                        Some(cmd) if cmd.is_negotiation_command() => {
                            self.state = FilterState::Negotiate(cmd);
                        }
                        Some(cmd) => {
                            result.notes.push(format!("IAC {}", cmd.name()));
                            self.state = FilterState::Data;
                        }
                        None => {
                            result.notes.push(format!("IAC {}", b));
                            self.state = FilterState::Data;
                        }
                    },
                },

                FilterState::Negotiate(cmd) => {
                    self.handle_negotiation(cmd, byte, &mut result);
                    self.state = FilterState::Data;
                }

                FilterState::SubnegotiationOption => {
                    self.sb_option = byte;
                    self.sb_buffer.clear();
                    result.notes.push(format!(
                        "IAC SB {} (begin subnegotiation)",
                        option_name(byte)
                    ));
                    self.state = FilterState::Subnegotiation {
                        expecting_se: false,
                    };
                }

                FilterState::Subnegotiation { expecting_se } => {
                    if expecting_se {
                        if byte == TelnetCommand::SE.to_byte() {
                            self.end_subnegotiation(&mut result);
                            self.state = FilterState::Data;
                        } else if byte == IAC {
                            // Escaped 0xFF inside the payload
                            self.sb_buffer.push(IAC);
                            self.state = FilterState::Subnegotiation {
                                expecting_se: false,
                            };
                        } else {
                            // Lone IAC inside the block: keep both bytes
                            self.sb_buffer.push(IAC);
                            self.sb_buffer.push(byte);
                            self.state = FilterState::Subnegotiation {
                                expecting_se: false,
                            };
                        }
                    } else if byte == IAC {
                        self.state = FilterState::Subnegotiation { expecting_se: true };
                    } else {
                        self.sb_buffer.push(byte);
                    }
                }
            }
        }

        result
    }

    /// Apply the accept-GMCP/refuse-everything-else policy to one
    /// `IAC <cmd> <option>` sequence.
    fn handle_negotiation(&mut self, cmd: TelnetCommand, option: u8, result: &mut FeedResult) {
        let opt_name = option_name(option);
        match cmd {
            TelnetCommand::WILL => {
                if option == GMCP {
                    result
                        .responses
                        .extend_from_slice(&[IAC, TelnetCommand::DO.to_byte(), option]);
                    result
                        .notes
                        .push(format!("IAC WILL {opt_name} -> IAC DO {opt_name}"));
                } else {
                    if option == ECHO {
                        self.echo_suppressed = true;
                    }
                    result
                        .responses
                        .extend_from_slice(&[IAC, TelnetCommand::DONT.to_byte(), option]);
                    result
                        .notes
                        .push(format!("IAC WILL {opt_name} -> IAC DONT {opt_name}"));
                }
            }
            TelnetCommand::DO => {
                if option == GMCP {
                    result
                        .responses
                        .extend_from_slice(&[IAC, TelnetCommand::WILL.to_byte(), option]);
                    result
                        .notes
                        .push(format!("IAC DO {opt_name} -> IAC WILL {opt_name}"));
                } else {
                    result
                        .responses
                        .extend_from_slice(&[IAC, TelnetCommand::WONT.to_byte(), option]);
                    result
                        .notes
                        .push(format!("IAC DO {opt_name} -> IAC WONT {opt_name}"));
                }
            }
            TelnetCommand::WONT => {
                if option == ECHO {
                    self.echo_suppressed = false;
                }
                result.notes.push(format!("IAC WONT {opt_name}"));
            }
            TelnetCommand::DONT => {
                result.notes.push(format!("IAC DONT {opt_name}"));
            }
            // Unreachable: only negotiation commands enter this state
            _ => {}
        }
    }

    /// Close the open subnegotiation block at IAC SE.
    fn end_subnegotiation(&mut self, result: &mut FeedResult) {
        if self.sb_option == GMCP {
            result.notes.push(format!(
                "IAC SE (end {} subnegotiation, {} bytes)",
                option_name(self.sb_option),
                self.sb_buffer.len()
            ));
            result.gmcp_payloads.push(std::mem::take(&mut self.sb_buffer));
        } else {
            result.notes.push("IAC SE (end subnegotiation)".to_string());
            self.sb_buffer.clear();
        }
    }
}

/// Escape every literal 0xFF as IAC IAC, for outbound payloads.
///
/// Must be applied to application data (notably GMCP payload text) before
/// framing it for transmission.
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        if byte == IAC {
            out.push(IAC);
        }
        out.push(byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WILL: u8 = 251;
    const WONT: u8 = 252;
    const DO: u8 = 253;
    const DONT: u8 = 254;
    const SB: u8 = 250;
    const SE: u8 = 240;

    /// Feed `input` split into `(head, tail)` at every position and verify
    /// the concatenated outputs match the single-call result.
    fn assert_chunk_invariant(input: &[u8]) {
        let mut whole = TelnetFilter::new();
        let expected = whole.feed(input);

        for split in 0..=input.len() {
            let mut filter = TelnetFilter::new();
            let first = filter.feed(&input[..split]);
            let second = filter.feed(&input[split..]);

            let mut display = first.display.clone();
            display.extend_from_slice(&second.display);
            assert_eq!(display, expected.display, "display at split {split}");

            let mut payloads = first.gmcp_payloads.clone();
            payloads.extend(second.gmcp_payloads.iter().cloned());
            assert_eq!(payloads, expected.gmcp_payloads, "gmcp at split {split}");

            let mut responses = first.responses.clone();
            responses.extend_from_slice(&second.responses);
            assert_eq!(responses, expected.responses, "responses at split {split}");
        }
    }

    #[test]
    fn test_plain_text_passes_through() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(b"Hello, World!");

        assert_eq!(result.display, b"Hello, World!");
        assert!(result.responses.is_empty());
        assert!(result.gmcp_payloads.is_empty());
    }

    #[test]
    fn test_will_gmcp_accepted() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[IAC, WILL, GMCP]);

        assert_eq!(result.responses, vec![IAC, DO, GMCP]);
        assert!(result.display.is_empty());
    }

    #[test]
    fn test_do_gmcp_accepted() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[IAC, DO, GMCP]);

        assert_eq!(result.responses, vec![IAC, WILL, GMCP]);
    }

    #[test]
    fn test_other_options_refused() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[IAC, WILL, 99, IAC, DO, 99]);

        assert_eq!(result.responses, vec![IAC, DONT, 99, IAC, WONT, 99]);
    }

    #[test]
    fn test_wont_dont_acknowledged_without_reply() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[IAC, WONT, 86, IAC, DONT, 86]);

        assert!(result.responses.is_empty());
        assert_eq!(result.notes, vec!["IAC WONT 86", "IAC DONT 86"]);
    }

    #[test]
    fn test_echo_tracks_password_mode() {
        let mut filter = TelnetFilter::new();
        assert!(!filter.echo_suppressed());

        let result = filter.feed(&[IAC, WILL, ECHO]);
        assert!(filter.echo_suppressed());
        // Refused, like every non-GMCP option
        assert_eq!(result.responses, vec![IAC, DONT, ECHO]);

        filter.feed(&[IAC, WONT, ECHO]);
        assert!(!filter.echo_suppressed());
    }

    #[test]
    fn test_other_options_do_not_touch_echo_flag() {
        let mut filter = TelnetFilter::new();
        filter.feed(&[IAC, WILL, ECHO]);
        filter.feed(&[IAC, WILL, 86, IAC, WONT, 86]);
        assert!(filter.echo_suppressed());
    }

    #[test]
    fn test_escaped_iac_in_data() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[b'a', IAC, IAC, b'b']);

        assert_eq!(result.display, vec![b'a', 255, b'b']);
    }

    #[test]
    fn test_gmcp_subnegotiation_payload() {
        let mut filter = TelnetFilter::new();
        let mut input = vec![IAC, SB, GMCP];
        input.extend_from_slice(b"char.vitals {\"hp\":10}");
        input.extend_from_slice(&[IAC, SE]);

        let result = filter.feed(&input);

        assert_eq!(result.gmcp_payloads.len(), 1);
        assert_eq!(result.gmcp_payloads[0], b"char.vitals {\"hp\":10}");
        assert!(result.display.is_empty());
    }

    #[test]
    fn test_non_gmcp_subnegotiation_discarded() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[IAC, SB, 24, 1, 2, 3, IAC, SE]);

        assert!(result.gmcp_payloads.is_empty());
        assert!(result.display.is_empty());
    }

    #[test]
    fn test_escaped_iac_inside_subnegotiation() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[IAC, SB, GMCP, 1, IAC, IAC, 2, IAC, SE]);

        assert_eq!(result.gmcp_payloads, vec![vec![1, 255, 2]]);
    }

    #[test]
    fn test_simple_command_noted() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[IAC, 249]); // IAC GA

        assert!(result.display.is_empty());
        assert_eq!(result.notes, vec!["IAC GA"]);
    }

    #[test]
    fn test_subnegotiation_spans_feed_calls() {
        let mut filter = TelnetFilter::new();

        let first = filter.feed(&[IAC, SB, GMCP, b'a', b'b']);
        assert!(first.gmcp_payloads.is_empty());

        let second = filter.feed(&[b'c', IAC, SE]);
        assert_eq!(second.gmcp_payloads, vec![b"abc".to_vec()]);
    }

    #[test]
    fn test_chunk_invariance_negotiation() {
        assert_chunk_invariant(&[b'x', IAC, WILL, GMCP, b'y', IAC, DO, 99, b'z']);
    }

    #[test]
    fn test_chunk_invariance_escaped_iac() {
        assert_chunk_invariant(&[b'a', IAC, IAC, b'b', IAC, 241, b'c']);
    }

    #[test]
    fn test_chunk_invariance_subnegotiation() {
        let mut input = vec![b'h', b'i', IAC, SB, GMCP];
        input.extend_from_slice(b"char.vitals {\"hp\":1}");
        input.extend_from_slice(&[IAC, IAC, IAC, SE, b'o', b'k']);
        assert_chunk_invariant(&input);
    }

    #[test]
    fn test_unterminated_subnegotiation_is_abandoned_safely() {
        let mut filter = TelnetFilter::new();
        let result = filter.feed(&[IAC, SB, GMCP, b'a', b'b', b'c']);

        // No payload published, nothing leaks into the display stream
        assert!(result.gmcp_payloads.is_empty());
        assert!(result.display.is_empty());
    }

    #[test]
    fn test_escape_iac() {
        assert_eq!(escape_iac(b"abc"), b"abc".to_vec());
        assert_eq!(escape_iac(&[1, 255, 2]), vec![1, 255, 255, 2]);
        assert_eq!(escape_iac(&[255, 255]), vec![255, 255, 255, 255]);
    }
}
