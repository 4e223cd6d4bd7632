//! # Telnet/GMCP Client Protocol Library
//!
//! A Rust library for the client side of a MUD connection, as defined in:
//! - RFC 854: Telnet Protocol Specification (https://tools.ietf.org/html/rfc854)
//! - RFC 855: Telnet Option Specifications
//! - The GMCP convention (JSON bodies over Telnet option 201 subnegotiation)
//!
//! This library is designed to be:
//! - **Minimal**: Accept exactly one option (GMCP), refuse everything else
//! - **Non-blocking**: Pure byte-in/byte-out, integrates with any I/O pattern
//! - **Chunk-safe**: Sequences split across TCP reads are carried in state
//!
//! ## Architecture Overview
//!
//! The library is organized into three modules:
//! - `protocol`: Telnet protocol constants and types (RFC 854)
//! - `filter`: The stream filter that strips IAC sequences, answers option
//!   offers, and captures GMCP subnegotiation payloads
//! - `gmcp`: GMCP payload decoding, merged per-package state, and outbound
//!   frame construction

pub mod filter;
pub mod gmcp;
pub mod protocol;

// Re-export main types for convenience
pub use filter::{FeedResult, TelnetFilter, escape_iac};
pub use gmcp::{GmcpCodec, GmcpMessage, frame, handshake_frames};
pub use protocol::{ECHO, GMCP, IAC, TelnetCommand, option_name};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
