//! RFC 959 §4.2 - Reply framing
//!
//! Replies are 3-digit codes; multi-line replies open with `ddd-` and close
//! with a `ddd ` line carrying the same code. The parser must emit exactly
//! one `(code, text)` pair per complete reply, in order, with no partial
//! emissions.

use ftp_rs::ReplyParser;

#[test]
fn test_single_line_reply() {
    let mut parser = ReplyParser::new();
    let replies = parser.feed(b"200 Command okay\r\n");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].code, 200);
    assert_eq!(replies[0].text, "Command okay");
}

#[test]
fn test_multiline_then_single_in_one_buffer() {
    // Greeting banner followed by the USER challenge, one TCP segment.
    let mut parser = ReplyParser::new();
    let replies = parser.feed(b"220-Hello\r\n220 ready\r\n331 user\r\n");

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].code, 220);
    assert_eq!(replies[0].text, "Hello\nready");
    assert_eq!(replies[1].code, 331);
    assert_eq!(replies[1].text, "user");
}

#[test]
fn test_no_partial_emissions() {
    let mut parser = ReplyParser::new();

    // Drip-feed a reply byte by byte; nothing may surface early.
    let wire = b"226 Transfer complete\r\n";
    for &byte in &wire[..wire.len() - 1] {
        assert!(parser.feed(&[byte]).is_empty());
    }
    let replies = parser.feed(&wire[wire.len() - 1..]);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].code, 226);
}

#[test]
fn test_n_complete_replies_yield_n_pairs() {
    let mut parser = ReplyParser::new();
    let wire = b"150 Opening\r\n226 Done\r\n257 \"/tmp\" created\r\n221 Goodbye\r\n";
    let replies = parser.feed(wire);

    let codes: Vec<u16> = replies.iter().map(|r| r.code).collect();
    assert_eq!(codes, vec![150, 226, 257, 221]);
}

#[test]
fn test_multiline_body_lines_without_prefix() {
    let mut parser = ReplyParser::new();
    let replies = parser.feed(b"214-The following commands are recognized:\r\nUSER PASS QUIT\r\n214 Help okay\r\n");

    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0].text,
        "The following commands are recognized:\nUSER PASS QUIT\nHelp okay"
    );
}

#[test]
fn test_iso_8859_1_bytes_survive() {
    // High bytes are not valid standalone UTF-8; the parser must treat the
    // stream as ISO-8859-1 and preserve them.
    let mut parser = ReplyParser::new();
    let replies = parser.feed(b"257 \"/caf\xe9\" created\r\n");
    assert_eq!(replies.len(), 1);
    assert!(replies[0].text.contains('\u{e9}'));
}

#[test]
fn test_malformed_bytes_accumulate_silently() {
    let mut parser = ReplyParser::new();
    assert!(parser.feed(b"garbage without a terminator\r\n").is_empty());
    assert!(parser.pending() > 0);

    // A proper terminating line eventually flushes the buffer as one reply.
    let replies = parser.feed(b"220 finally\r\n");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].code, 220);
}

#[test]
fn test_reply_code_grouping() {
    let mut parser = ReplyParser::new();
    let replies = parser.feed(b"150 mark\r\n226 ok\r\n350 pending\r\n450 transient\r\n550 permanent\r\n");

    assert!(replies[0].is_preliminary());
    assert!(replies[1].is_success());
    assert!(replies[2].is_intermediate());
    assert!(replies[3].is_error());
    assert!(replies[4].is_error());
    assert_eq!(replies[4].group(), 5);
}
