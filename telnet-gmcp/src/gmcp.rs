//! # GMCP Payload Handling
//!
//! The Generic MUD Communication Protocol carries structured game state as
//! `"Package.Name <json-body>"` text inside Telnet subnegotiation blocks
//! (option 201). This module decodes payloads, maintains merged per-package
//! state, and builds outbound frames.
//!
//! ## Merge policy
//!
//! - A JSON object body is merged field-by-field into the package's state:
//!   new keys are added, existing keys overwritten, nothing is deleted.
//! - Any other body (array, scalar, or unparseable text kept as a raw
//!   string) replaces the package's value wholesale.
//! - The value's shape follows the *most recent* payload: a scalar arriving
//!   after an object replaces the object, and vice versa.
//!
//! Malformed JSON never fails: the body degrades to an opaque string.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::filter::escape_iac;
use crate::protocol::{GMCP, IAC, TelnetCommand};

/// One decoded GMCP message
#[derive(Debug, Clone, PartialEq)]
pub struct GmcpMessage {
    /// Package name, lower-cased for merge-key purposes
    pub package: String,
    /// Decoded body: JSON value, or a string when the body did not parse,
    /// or an empty object when the payload had no body at all
    pub value: Value,
}

/// Decoder and merged-state store for GMCP traffic.
#[derive(Debug, Clone, Default)]
pub struct GmcpCodec {
    state: BTreeMap<String, Value>,
}

impl GmcpCodec {
    /// Create an empty codec
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one subnegotiation payload and merge it into the state.
    ///
    /// Never fails: undecodable UTF-8 is replaced lossily, and a body that
    /// is not valid JSON is kept as a raw string value.
    pub fn handle(&mut self, payload: &[u8]) -> GmcpMessage {
        let text = String::from_utf8_lossy(payload);

        let (package, value) = match text.find(' ') {
            None => (
                text.trim().to_lowercase(),
                Value::Object(Map::new()),
            ),
            Some(space) => {
                let package = text[..space].trim().to_lowercase();
                let body = text[space + 1..].trim();
                let value = serde_json::from_str(body)
                    .unwrap_or_else(|_| Value::String(body.to_string()));
                (package, value)
            }
        };

        self.merge(&package, value.clone());
        GmcpMessage { package, value }
    }

    fn merge(&mut self, package: &str, value: Value) {
        if let Value::Object(update) = value {
            match self.state.get_mut(package) {
                Some(Value::Object(existing)) => {
                    for (key, val) in update {
                        existing.insert(key, val);
                    }
                }
                // First sighting, or the package currently holds a
                // non-object: the object takes over and merging starts fresh
                _ => {
                    self.state.insert(package.to_string(), Value::Object(update));
                }
            }
        } else {
            self.state.insert(package.to_string(), value);
        }
    }

    /// Current value for a package, if any has been observed
    pub fn package(&self, name: &str) -> Option<&Value> {
        self.state.get(name)
    }

    /// All merged package state, keyed by lower-case package name
    pub fn state(&self) -> &BTreeMap<String, Value> {
        &self.state
    }

    fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        match self.state.get(name) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Character vitals (`char.vitals`), when present as an object.
    ///
    /// Absence is not an error - callers treat a `None` as "unknown".
    pub fn vitals(&self) -> Option<&Map<String, Value>> {
        self.object("char.vitals")
    }

    /// Character status (`char.status`), when present as an object
    pub fn status(&self) -> Option<&Map<String, Value>> {
        self.object("char.status")
    }

    /// Character stats (`char.stats`), when present as an object
    pub fn stats(&self) -> Option<&Map<String, Value>> {
        self.object("char.stats")
    }

    /// Character stat maxima (`char.maxstats`), when present as an object
    pub fn max_stats(&self) -> Option<&Map<String, Value>> {
        self.object("char.maxstats")
    }
}

/// Client identification sent in the `Core.Hello` handshake message
#[derive(Debug, Serialize)]
struct ClientHello {
    client: &'static str,
    version: &'static str,
}

/// Build one outbound GMCP frame: `IAC SB 201 <payload> IAC SE`.
///
/// The payload text is `"<package>"` or `"<package> <body>"`, with every
/// literal 0xFF escaped before framing.
pub fn frame(package: &str, body: &str) -> Vec<u8> {
    let payload = if body.is_empty() {
        package.as_bytes().to_vec()
    } else {
        format!("{package} {body}").into_bytes()
    };

    let mut out = vec![IAC, TelnetCommand::SB.to_byte(), GMCP];
    out.extend_from_slice(&escape_iac(&payload));
    out.push(IAC);
    out.push(TelnetCommand::SE.to_byte());
    out
}

/// Build the handshake frames to send right after GMCP is negotiated:
/// `Core.Hello` with client identification, then `Core.Supports.Set` with
/// the subscription list.
pub fn handshake_frames(subscriptions: &[String]) -> Vec<Vec<u8>> {
    let hello = ClientHello {
        client: "Wayfarer",
        version: env!("CARGO_PKG_VERSION"),
    };
    let hello_body = serde_json::to_string(&hello).unwrap_or_default();
    let supports_body = serde_json::to_string(subscriptions).unwrap_or_default();

    vec![
        frame("Core.Hello", &hello_body),
        frame("Core.Supports.Set", &supports_body),
    ]
}
