use meshrelay::frame::{parse_frame, FrameParser, ParseError};
use meshrelay::message::{GpsFix, Urgency};

#[test]
fn test_compact_frame() {
    let msg = parse_frame("SRC=5,CUR=5,ID=0042:Alice-Need water").expect("parse");
    assert_eq!(msg.source_node().as_str(), "5");
    assert_eq!(msg.current_node().as_str(), "5");
    assert_eq!(msg.message_id(), "0042");
    assert_eq!(msg.sender_name(), "Alice");
    assert_eq!(msg.text(), "Need water");
    assert_eq!(msg.gps(), None);
    assert_eq!(msg.urgency(), None);
    assert_eq!(msg.received_at(), None);
}

#[test]
fn test_compact_frame_trims_name_and_text() {
    let msg = parse_frame("  SRC=12,CUR=3,ID=7: Bob  -  Bridge is out \r\n").expect("parse");
    assert_eq!(msg.sender_name(), "Bob");
    assert_eq!(msg.text(), "Bridge is out");
}

#[test]
fn test_compact_frame_without_hyphen_has_no_name() {
    let msg = parse_frame("SRC=1,CUR=2,ID=3:all clear").expect("parse");
    assert_eq!(msg.sender_name(), "");
    assert_eq!(msg.text(), "all clear");
}

#[test]
fn test_text_may_contain_colons() {
    let msg = parse_frame("SRC=1,CUR=2,ID=3:Eve-meet at 10:30").expect("parse");
    assert_eq!(msg.text(), "meet at 10:30");
}

#[test]
fn test_json_frame_full() {
    let raw = r#"{"source_node": 5, "current_node": 9, "message_id": "0042",
        "sender_name": "Alice", "message": "Need water",
        "gps": {"latitude": 28.6139, "longitude": 77.209}}"#
        .replace('\n', " ");
    let msg = parse_frame(&raw).expect("parse");
    assert_eq!(msg.source_node().as_str(), "5");
    assert_eq!(msg.current_node().as_str(), "9");
    assert_eq!(msg.message_id(), "0042");
    assert_eq!(msg.sender_name(), "Alice");
    assert_eq!(msg.text(), "Need water");
    assert_eq!(msg.gps(), GpsFix::new(28.6139, 77.209));
}

#[test]
fn test_json_frame_short_keys() {
    let msg = parse_frame(r#"{"src":"!a1b2","cur":"!c3d4","msg_id":"9","name":"Raj","message":"ok"}"#)
        .expect("parse");
    assert_eq!(msg.source_node().as_str(), "!a1b2");
    assert_eq!(msg.current_node().as_str(), "!c3d4");
    assert_eq!(msg.message_id(), "9");
    assert_eq!(msg.sender_name(), "Raj");
}

#[test]
fn test_json_frame_defaults() {
    let msg = parse_frame(r#"{"message":"hello"}"#).expect("parse");
    assert_eq!(msg.source_node().as_str(), "0");
    assert_eq!(msg.current_node().as_str(), "0");
    assert_eq!(msg.message_id(), "0000");
    assert_eq!(msg.sender_name(), "");
    assert_eq!(msg.text(), "hello");
    assert_eq!(msg.gps(), None);

    let msg = parse_frame("{}").expect("empty object is a valid frame");
    assert_eq!(msg.text(), "");
}

#[test]
fn test_configured_default_node() {
    let parser = FrameParser::with_default_node("base");
    let msg = parser.parse(r#"{"message":"x"}"#).expect("parse");
    assert_eq!(msg.source_node().as_str(), "base");
    assert_eq!(msg.current_node().as_str(), "base");
}

#[test]
fn test_json_null_and_empty_gps_are_absent() {
    assert_eq!(parse_frame(r#"{"gps":null}"#).unwrap().gps(), None);
    assert_eq!(parse_frame(r#"{"gps":{}}"#).unwrap().gps(), None);
}

#[test]
fn test_json_invalid_gps_is_rejected() {
    for raw in [
        r#"{"gps":"28.6,77.2"}"#,
        r#"{"gps":{"latitude":28.6}}"#,
        r#"{"gps":{"latitude":"north","longitude":1}}"#,
        r#"{"gps":{"latitude":128.0,"longitude":1}}"#,
    ] {
        match parse_frame(raw) {
            Err(ParseError::InvalidField { field: "gps", .. }) => {}
            other => panic!("Expected gps error for {}, got {:?}", raw, other),
        }
    }
}

#[test]
fn test_json_embedded_urgency() {
    let msg = parse_frame(r#"{"message":"fire","urgency":"MEDIUM"}"#).unwrap();
    assert_eq!(msg.embedded_urgency(), Some(Urgency::Medium));
    assert_eq!(msg.urgency(), None);
}

#[test]
fn test_empty_and_whitespace() {
    assert_eq!(parse_frame("").unwrap_err(), ParseError::Empty);
    assert_eq!(parse_frame(" \t\r\n").unwrap_err(), ParseError::Empty);
}

#[test]
fn test_malformed_inputs_are_errors_not_panics() {
    let cases = [
        "{not json",
        "[1,2,3]",
        "{\"message\": 5}",
        "hello world",
        "SRC=1,CUR=2:missing id",
        "SRC=1,CUR=2,ID=3,EXTRA=4:x",
        "FOO=1,CUR=2,ID=3:x",
        "SRC=1,CUR=2,ID3:x",
        "SRC=1;CUR=2;ID=3:x",
        ":",
        "\u{0}\u{1}\u{2}",
        "SRC=ü,CUR=ö,ID=ß",
    ];
    for raw in cases {
        assert!(parse_frame(raw).is_err(), "expected error for {:?}", raw);
    }
}

#[test]
fn test_error_kinds() {
    assert!(matches!(parse_frame("{oops"), Err(ParseError::MalformedJson(_))));
    assert!(matches!(parse_frame("{}}"), Err(ParseError::MalformedJson(_))));
    assert_eq!(parse_frame("no separator here").unwrap_err(), ParseError::MissingSeparator);
    assert!(matches!(parse_frame("SRC=1:x"), Err(ParseError::BadHeader(_))));
}

#[test]
fn test_long_line() {
    let text = "w".repeat(10_000);
    let msg = parse_frame(&format!("SRC=1,CUR=1,ID=1:Long-{}", text)).expect("parse");
    assert_eq!(msg.text().len(), 10_000);
}
