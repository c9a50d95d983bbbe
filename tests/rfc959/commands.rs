//! RFC 959 §4.1 - Command wire forms
//!
//! Commands are uppercase ASCII terminated by CRLF; PORT splits the port
//! into high and low bytes.

use ftp_rs::commands;
use std::net::Ipv4Addr;

#[test]
fn test_access_control_commands() {
    assert_eq!(commands::user("anonymous"), "USER anonymous\r\n");
    assert_eq!(commands::pass("anonymous@"), "PASS anonymous@\r\n");
    assert_eq!(commands::cwd("/pub/linux"), "CWD /pub/linux\r\n");
    assert_eq!(commands::cdup(), "CDUP\r\n");
    assert_eq!(commands::quit(), "QUIT\r\n");
}

#[test]
fn test_transfer_parameter_commands() {
    assert_eq!(commands::type_image(), "TYPE I\r\n");
    assert_eq!(commands::type_ascii(), "TYPE A\r\n");
    assert_eq!(commands::pasv(), "PASV\r\n");
    assert_eq!(commands::mode_deflate(), "MODE Z\r\n");
    assert_eq!(commands::mode_stream(), "MODE S\r\n");
}

#[test]
fn test_service_commands() {
    assert_eq!(commands::retr("a.bin"), "RETR a.bin\r\n");
    assert_eq!(commands::stor("a.bin"), "STOR a.bin\r\n");
    assert_eq!(commands::appe("log"), "APPE log\r\n");
    assert_eq!(commands::dele("old"), "DELE old\r\n");
    assert_eq!(commands::mkd("dir"), "MKD dir\r\n");
    assert_eq!(commands::rmd("dir"), "RMD dir\r\n");
    assert_eq!(commands::rnfr("a"), "RNFR a\r\n");
    assert_eq!(commands::rnto("b"), "RNTO b\r\n");
    assert_eq!(commands::pwd(), "PWD\r\n");
    assert_eq!(commands::abor(), "ABOR\r\n");
    assert_eq!(commands::noop(), "NOOP\r\n");
    assert_eq!(commands::syst(), "SYST\r\n");
    assert_eq!(commands::site("CHMOD 644 f"), "SITE CHMOD 644 f\r\n");
}

#[test]
fn test_port_high_low_bytes() {
    let lo = Ipv4Addr::new(10, 0, 0, 7);
    assert_eq!(commands::port(lo, 6001), "PORT 10,0,0,7,23,113\r\n");
    // 6001 = 23*256 + 113
}
