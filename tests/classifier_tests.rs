//! End-to-end tests: raw server bytes through the Telnet filter, GMCP
//! state, and the classification pipeline, the way the session loop
//! drives them.

use std::time::Instant;

use telnet_gmcp::{GMCP, GmcpCodec, IAC, TelnetFilter};
use wayfarer::config::ClientConfig;
use wayfarer::trackers::{ConsumedBy, OutputClassifier};

const WILL: u8 = 251;
const DO: u8 = 253;
const SB: u8 = 250;
const SE: u8 = 240;

fn classifier() -> OutputClassifier {
    OutputClassifier::new(&ClientConfig::default(), true).unwrap()
}

fn display_texts(c: &OutputClassifier) -> Vec<String> {
    c.display().iter().map(|l| l.raw.clone()).collect()
}

/// Build one server burst: a GMCP offer, vitals, then a room display
fn synthetic_burst() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[IAC, WILL, GMCP]);
    bytes.extend_from_slice(&[IAC, SB, GMCP]);
    bytes.extend_from_slice(b"char.vitals {\"hp\":42,\"mana\":10,\"moves\":80}");
    bytes.extend_from_slice(&[IAC, SE]);
    bytes.extend_from_slice(
        b"<MAPSTART>\r\nGrand Hall\r\n+---+\r\n| @ |\r\n+---+\r\n[ Exits: N S ]\r\n<MAPEND>\r\n",
    );
    bytes
}

#[test]
fn test_gmcp_gates_map_detection_within_one_burst() {
    let mut filter = TelnetFilter::new();
    let mut gmcp = GmcpCodec::new();
    let mut classifier = classifier();
    let now = Instant::now();

    let result = filter.feed(&synthetic_burst());

    // The offer is answered with DO GMCP
    assert_eq!(result.responses, vec![IAC, DO, GMCP]);

    // Session ordering: GMCP payloads merge before the text classifies
    for payload in &result.gmcp_payloads {
        gmcp.handle(payload);
    }
    if gmcp.vitals().is_some_and(|v| !v.is_empty()) {
        classifier.map.set_enabled(true);
    }

    let text = String::from_utf8_lossy(&result.display).replace("\r\n", "\n");
    classifier.push_text(&text, now);

    // The map block from the same burst was captured, not displayed
    assert_eq!(classifier.map.room_name(), "Grand Hall");
    assert_eq!(classifier.map.map_lines(), &["+---+", "| @ |", "+---+"]);
    assert!(classifier.map.exits().contains("N S"));
    assert!(display_texts(&classifier).is_empty());
}

#[test]
fn test_burst_split_at_every_byte_boundary() {
    let bytes = synthetic_burst();

    let mut whole_filter = TelnetFilter::new();
    let whole = whole_filter.feed(&bytes);

    for split in 0..=bytes.len() {
        let mut filter = TelnetFilter::new();
        let first = filter.feed(&bytes[..split]);
        let second = filter.feed(&bytes[split..]);

        let mut display = first.display.clone();
        display.extend_from_slice(&second.display);
        assert_eq!(display, whole.display, "display differs at split {split}");

        let mut payloads = first.gmcp_payloads.clone();
        payloads.extend(second.gmcp_payloads.iter().cloned());
        assert_eq!(payloads, whole.gmcp_payloads, "gmcp differs at split {split}");
    }
}

#[test]
fn test_chunked_text_still_classifies_lines() {
    let mut classifier = classifier();
    let now = Instant::now();

    // The info line arrives split across two TCP reads
    classifier.push_text("INFO: the west ", now);
    classifier.push_text("gate has opened\nplain text\n", now);

    assert!(classifier.info.visible());
    assert_eq!(
        classifier.info.current().unwrap().text,
        "INFO: the west gate has opened"
    );
    assert_eq!(display_texts(&classifier), vec!["plain text"]);
}

#[test]
fn test_full_session_mix() {
    let mut classifier = classifier();
    let now = Instant::now();
    classifier.map.set_enabled(true);

    let text = "\
You stand in the market.\n\
\n\
INFO: Auction opens soon.\n\
\n\
{help}\n\
MARKET\n\
{helpbody}\n\
Buy low, sell high.\n\
{/helpbody}\n\
{/help}\n\
<MAPSTART>\n\
Market Square\n\
# # #\n\
Exits: N E\n\
<MAPEND>\n\
Market Square (M)\n\
\n\
Bob says, 'fresh bread\n\
for sale!'\n\
\n\
The crowd mills around.\n";
    classifier.push_text(text, now);

    // Every overlay captured its piece
    assert!(classifier.info.visible());
    assert_eq!(classifier.help.content().unwrap().title, "MARKET");
    assert_eq!(classifier.map.room_name(), "Market Square");
    let entry = classifier.conversation.current_entry().unwrap();
    assert_eq!(entry.speaker, "Bob");
    assert_eq!(entry.message, "fresh bread for sale!");

    // The filtered view shows only ordinary text
    assert_eq!(
        display_texts(&classifier),
        vec!["You stand in the market.", "The crowd mills around."]
    );

    // The transcript kept every single line
    assert_eq!(classifier.transcript().len(), text.lines().count());
}

#[test]
fn test_classification_precedence_order() {
    let mut classifier = classifier();
    let now = Instant::now();
    classifier.map.set_enabled(true);

    // Inside a help block, a line matching map tags is still help data
    classifier.classify_line("{help}", now);
    assert_eq!(classifier.classify_line("<MAPSTART>", now), ConsumedBy::Help);
    classifier.classify_line("{/help}", now);

    assert_eq!(
        classifier.help.content().unwrap().header_lines,
        vec!["<MAPSTART>"]
    );
    // The map tagger never saw the tag
    assert!(classifier.map.map_lines().is_empty());
}

#[test]
fn test_echo_suppression_tracks_negotiation_only() {
    let mut filter = TelnetFilter::new();

    filter.feed(&[IAC, WILL, 1]);
    assert!(filter.echo_suppressed());

    // Content mentioning passwords changes nothing
    filter.feed(b"Password: secret\r\n");
    assert!(filter.echo_suppressed());

    filter.feed(&[IAC, 252, 1]); // WONT ECHO
    assert!(!filter.echo_suppressed());
}

#[test]
fn test_gmcp_merge_semantics_end_to_end() {
    let mut gmcp = GmcpCodec::new();

    gmcp.handle(b"char.vitals {\"hp\":10}");
    gmcp.handle(b"char.vitals {\"mana\":5}");
    let vitals = gmcp.vitals().unwrap();
    assert_eq!(vitals.get("hp"), Some(&serde_json::json!(10)));
    assert_eq!(vitals.get("mana"), Some(&serde_json::json!(5)));

    // A non-object body replaces the whole value
    gmcp.handle(b"char.vitals \"resting\"");
    assert!(gmcp.vitals().is_none());
    assert_eq!(
        gmcp.package("char.vitals"),
        Some(&serde_json::json!("resting"))
    );
}
