//! RFC 959 - File Transfer Protocol
//!
//! These tests verify compliance with the core FTP specification:
//! reply framing (§4.2), command forms (§4.1) and LIST output handling.
//! https://datatracker.ietf.org/doc/html/rfc959

mod rfc959 {
    mod commands;
    mod listing_msdos;
    mod listing_unix;
    mod replies;
}
