//! FTP command builders
//!
//! Every builder yields the uppercase, CRLF-terminated wire form.

use std::net::{Ipv4Addr, Ipv6Addr};

// Access control (RFC 959 §4.1.1)

/// Build USER command
pub fn user(name: &str) -> String {
    format!("USER {}\r\n", name)
}

/// Build PASS command
pub fn pass(password: &str) -> String {
    format!("PASS {}\r\n", password)
}

/// Build CWD command
pub fn cwd(path: &str) -> String {
    format!("CWD {}\r\n", path)
}

/// Build CDUP command
pub fn cdup() -> &'static str {
    "CDUP\r\n"
}

/// Build QUIT command
pub fn quit() -> &'static str {
    "QUIT\r\n"
}

// Transfer parameters (RFC 959 §4.1.2)

/// Build TYPE I (binary/image) command
pub fn type_image() -> &'static str {
    "TYPE I\r\n"
}

/// Build TYPE A (ASCII) command
pub fn type_ascii() -> &'static str {
    "TYPE A\r\n"
}

/// Build PASV command
pub fn pasv() -> &'static str {
    "PASV\r\n"
}

/// Build EPSV command (RFC 2428 §3)
pub fn epsv() -> &'static str {
    "EPSV\r\n"
}

/// Build PORT command from an IPv4 address and port
///
/// RFC 959 §4.1.2: `PORT h1,h2,h3,h4,p1,p2` where the port is split into
/// high and low bytes.
pub fn port(addr: Ipv4Addr, port: u16) -> String {
    let [a, b, c, d] = addr.octets();
    format!(
        "PORT {},{},{},{},{},{}\r\n",
        a,
        b,
        c,
        d,
        port >> 8,
        port & 0xff
    )
}

/// Build EPRT command from an IPv6 address and port (RFC 2428 §2)
pub fn eprt(addr: Ipv6Addr, port: u16) -> String {
    format!("EPRT |2|{}|{}|\r\n", addr, port)
}

/// Build MODE Z (deflate transfer mode) command
pub fn mode_deflate() -> &'static str {
    "MODE Z\r\n"
}

/// Build MODE S (stream transfer mode) command
pub fn mode_stream() -> &'static str {
    "MODE S\r\n"
}

// Service commands (RFC 959 §4.1.3)

/// Build RETR command
pub fn retr(path: &str) -> String {
    format!("RETR {}\r\n", path)
}

/// Build STOR command
pub fn stor(path: &str) -> String {
    format!("STOR {}\r\n", path)
}

/// Build APPE command
pub fn appe(path: &str) -> String {
    format!("APPE {}\r\n", path)
}

/// Build LIST command, optionally scoped to a path
pub fn list(path: Option<&str>) -> String {
    match path {
        Some(p) => format!("LIST {}\r\n", p),
        None => "LIST\r\n".to_string(),
    }
}

/// Build RNFR command (first half of a rename)
pub fn rnfr(path: &str) -> String {
    format!("RNFR {}\r\n", path)
}

/// Build RNTO command (second half of a rename)
pub fn rnto(path: &str) -> String {
    format!("RNTO {}\r\n", path)
}

/// Build DELE command
pub fn dele(path: &str) -> String {
    format!("DELE {}\r\n", path)
}

/// Build MKD command
pub fn mkd(path: &str) -> String {
    format!("MKD {}\r\n", path)
}

/// Build RMD command
pub fn rmd(path: &str) -> String {
    format!("RMD {}\r\n", path)
}

/// Build PWD command
pub fn pwd() -> &'static str {
    "PWD\r\n"
}

/// Build ABOR command
pub fn abor() -> &'static str {
    "ABOR\r\n"
}

/// Build SITE command with its raw argument string
pub fn site(command: &str) -> String {
    format!("SITE {}\r\n", command)
}

/// Build STAT command, optionally scoped to a path
pub fn stat(path: Option<&str>) -> String {
    match path {
        Some(p) => format!("STAT {}\r\n", p),
        None => "STAT\r\n".to_string(),
    }
}

/// Build SYST command
pub fn syst() -> &'static str {
    "SYST\r\n"
}

/// Build NOOP command
pub fn noop() -> &'static str {
    "NOOP\r\n"
}

// Extensions

/// Build FEAT command (RFC 2389 §3)
pub fn feat() -> &'static str {
    "FEAT\r\n"
}

/// Build SIZE command (RFC 3659 §4)
pub fn size(path: &str) -> String {
    format!("SIZE {}\r\n", path)
}

/// Build MDTM command (RFC 3659 §3)
pub fn mdtm(path: &str) -> String {
    format!("MDTM {}\r\n", path)
}

/// Build REST command (RFC 3659 §5)
pub fn rest(offset: u64) -> String {
    format!("REST {}\r\n", offset)
}

/// Build MLSD command, optionally scoped to a path (RFC 3659 §7)
pub fn mlsd(path: Option<&str>) -> String {
    match path {
        Some(p) => format!("MLSD {}\r\n", p),
        None => "MLSD\r\n".to_string(),
    }
}

/// Build MLST command (RFC 3659 §7)
pub fn mlst(path: &str) -> String {
    format!("MLST {}\r\n", path)
}

// Security (RFC 2228 / RFC 4217)

/// Build AUTH TLS command
pub fn auth_tls() -> &'static str {
    "AUTH TLS\r\n"
}

/// Build AUTH SSL command (fallback for pre-RFC 4217 servers)
pub fn auth_ssl() -> &'static str {
    "AUTH SSL\r\n"
}

/// Build PBSZ 0 command (protection buffer size; always zero for TLS)
pub fn pbsz() -> &'static str {
    "PBSZ 0\r\n"
}

/// Build PROT P command (private data channel)
pub fn prot_private() -> &'static str {
    "PROT P\r\n"
}
