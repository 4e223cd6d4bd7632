//! Non-blocking TCP connection to the MUD server.
//!
//! One outbound socket, polled with zero timeout from the session loop.
//! Incoming bytes run through the Telnet filter; negotiation replies are
//! written straight back, GMCP payloads are handed up still encoded, and
//! display bytes come out as newline-normalized text. There is no
//! reconnection logic here - a transport failure tears the connection
//! down and the session decides what to tell the user.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use jiff::Timestamp;
use telnet_gmcp::{GMCP, IAC, TelnetCommand, TelnetFilter, gmcp};

use crate::errors::{ClientError, ClientResult};

/// Direction tag for protocol events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoDirection {
    In,
    Out,
    Sys,
}

impl fmt::Display for ProtoDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoDirection::In => write!(f, "IN"),
            ProtoDirection::Out => write!(f, "OUT"),
            ProtoDirection::Sys => write!(f, "SYS"),
        }
    }
}

/// One protocol-level event, kept for the debug log and the status line
#[derive(Debug, Clone)]
pub struct ProtoEvent {
    pub direction: ProtoDirection,
    pub timestamp: Timestamp,
    pub preview: String,
}

/// Everything one poll produced, in arrival order.
///
/// The session must merge `gmcp_payloads` into the GMCP state *before*
/// classifying `text` - enabling the map tagger is gated on vitals from
/// the same burst that carries the first room display.
#[derive(Debug, Default)]
pub struct TrafficBurst {
    pub text: String,
    pub gmcp_payloads: Vec<Vec<u8>>,
}

impl TrafficBurst {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.gmcp_payloads.is_empty()
    }
}

/// Replace unprintables so a payload can go on one log line
fn safe_text_preview(bytes: &[u8], max_len: usize) -> String {
    let mut s = String::from_utf8_lossy(bytes)
        .replace('\r', "\\r")
        .replace('\n', "\\n");
    if s.chars().count() > max_len {
        s = s.chars().take(max_len).collect::<String>() + "…";
    }
    s
}

fn hex_preview(bytes: &[u8], max_len: usize) -> String {
    let mut out = bytes
        .iter()
        .take(max_len)
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > max_len {
        out.push_str(" …");
    }
    out
}

pub struct MudConnection {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    telnet: TelnetFilter,
    gmcp_negotiated: bool,
    subscriptions: Vec<String>,
    events: Vec<ProtoEvent>,
}

impl MudConnection {
    pub fn new(host: &str, port: u16, subscriptions: Vec<String>) -> Self {
        Self {
            host: host.to_string(),
            port,
            stream: None,
            telnet: TelnetFilter::new(),
            gmcp_negotiated: false,
            subscriptions,
            events: Vec::new(),
        }
    }

    /// True when the server has signaled password mode (WILL ECHO)
    pub fn echo_suppressed(&self) -> bool {
        self.telnet.echo_suppressed()
    }

    pub fn connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Protocol events recorded since the last call
    pub fn take_events(&mut self) -> Vec<ProtoEvent> {
        std::mem::take(&mut self.events)
    }

    fn proto(&mut self, direction: ProtoDirection, preview: String) {
        log::debug!(target: "proto", "{direction} {preview}");
        self.events.push(ProtoEvent {
            direction,
            timestamp: Timestamp::now(),
            preview,
        });
    }

    pub fn connect(&mut self, timeout: Duration) -> ClientResult<()> {
        let addr = format!("{}:{}", self.host, self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                ClientError::Configuration(format!("could not resolve {}", self.host))
            })?;

        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nonblocking(true)?;
        self.stream = Some(stream);

        self.proto(
            ProtoDirection::Sys,
            format!("Connected to {}:{}", self.host, self.port),
        );
        Ok(())
    }

    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            self.proto(ProtoDirection::Sys, "Disconnected".to_string());
        }
    }

    /// Non-blocking poll: drain everything the socket has right now.
    ///
    /// Transport failures and the peer closing the stream tear the
    /// connection down and surface as a `Sys` event; they never panic and
    /// never propagate as errors out of the poll path.
    pub fn poll(&mut self) -> TrafficBurst {
        let mut burst = TrafficBurst::default();
        if self.stream.is_none() {
            return burst;
        }

        let mut display_bytes: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let read = match self.stream.as_mut() {
                Some(stream) => stream.read(&mut chunk),
                None => break,
            };
            match read {
                Ok(0) => {
                    self.proto(ProtoDirection::Sys, "Server closed connection".to_string());
                    self.close();
                    break;
                }
                Ok(n) => {
                    let data = &chunk[..n];
                    self.proto(
                        ProtoDirection::In,
                        format!(
                            "{}  |  {}",
                            safe_text_preview(data, 120),
                            hex_preview(data, 48)
                        ),
                    );
                    let result = self.telnet.feed(data);

                    for note in &result.notes {
                        self.proto(ProtoDirection::Sys, format!("TELNET {note}"));
                    }

                    if !result.responses.is_empty() {
                        let accept = [IAC, TelnetCommand::DO.to_byte(), GMCP];
                        let accepted_gmcp =
                            result.responses.windows(3).any(|w| w == accept.as_slice());
                        let reply_preview =
                            format!("(telnet) {}", hex_preview(&result.responses, 48));
                        if self.write_raw(&result.responses, &reply_preview).is_ok()
                            && !self.gmcp_negotiated
                            && accepted_gmcp
                        {
                            // Just agreed to GMCP - introduce ourselves
                            self.gmcp_negotiated = true;
                            self.send_handshake();
                        }
                    }

                    burst.gmcp_payloads.extend(result.gmcp_payloads);
                    display_bytes.extend_from_slice(&result.display);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.proto(ProtoDirection::Sys, format!("Recv failed: {e}"));
                    self.close();
                    break;
                }
            }
        }

        if !display_bytes.is_empty() {
            let text = String::from_utf8_lossy(&display_bytes)
                .replace("\r\n", "\n")
                .replace('\r', "");
            burst.text = text;
        }
        burst
    }

    /// Send one line of user input, CR LF terminated as MUDs expect
    pub fn send_line(&mut self, line: &str) {
        let data = format!("{line}\r\n").into_bytes();
        let preview = format!(
            "{}  |  {}",
            safe_text_preview(&data, 120),
            hex_preview(&data, 48)
        );
        let _ = self.write_raw(&data, &preview);
    }

    /// Send a GMCP message: `IAC SB 201 <payload> IAC SE`
    pub fn send_gmcp(&mut self, package: &str, body: &str) {
        let frame = gmcp::frame(package, body);
        let preview = format!("GMCP send: {package} {body}");
        let _ = self.write_raw(&frame, &preview);
    }

    fn send_handshake(&mut self) {
        for frame in gmcp::handshake_frames(&self.subscriptions) {
            let preview = format!("GMCP send: {}", safe_text_preview(&frame, 80));
            let _ = self.write_raw(&frame, &preview);
        }
    }

    fn write_raw(&mut self, data: &[u8], preview: &str) -> std::io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        match stream.write_all(data) {
            Ok(()) => {
                self.proto(ProtoDirection::Out, preview.to_string());
                Ok(())
            }
            Err(e) => {
                self.proto(ProtoDirection::Sys, format!("Send failed: {e}"));
                self.close();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previews() {
        assert_eq!(safe_text_preview(b"hi\r\nthere", 120), "hi\\r\\nthere");
        assert_eq!(hex_preview(&[0xff, 0x01], 48), "ff 01");

        let long = vec![b'a'; 200];
        assert!(safe_text_preview(&long, 120).ends_with('…'));
        let trimmed = hex_preview(&long, 48);
        assert!(trimmed.ends_with(" …"));
    }

    #[test]
    fn test_unconnected_poll_is_empty() {
        let mut conn = MudConnection::new("localhost", 4000, Vec::new());
        let burst = conn.poll();
        assert!(burst.is_empty());
        assert!(!conn.connected());
    }

    #[test]
    fn test_send_on_closed_connection_is_noop() {
        let mut conn = MudConnection::new("localhost", 4000, Vec::new());
        conn.send_line("look");
        conn.send_gmcp("Core.Ping", "");
        assert!(conn.take_events().is_empty());
    }

    #[test]
    fn test_close_without_connect_records_nothing() {
        let mut conn = MudConnection::new("localhost", 4000, Vec::new());
        conn.close();
        assert!(conn.take_events().is_empty());
    }
}
