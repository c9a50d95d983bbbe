//! FTP reply types and the control-channel reply parser (RFC 959 §4.2)

/// FTP reply with a 3-digit code and its (possibly multi-line) text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// 3-digit FTP reply code
    pub code: u16,
    /// Reply text with the `ddd[- ]` prefixes stripped; lines joined with '\n'
    pub text: String,
}

impl Reply {
    /// Check if the reply is preliminary (1xx, more replies follow)
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Check if the reply indicates completion (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Check if the reply is intermediate (3xx, awaiting further input)
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Check if the reply indicates an error (4xx or 5xx)
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }

    /// Hundreds group of the code (1 through 5)
    pub fn group(&self) -> u16 {
        self.code / 100
    }
}

/// FTP reply codes (RFC 959, RFC 2228, RFC 2428)
#[allow(dead_code)]
pub mod codes {
    /// Restart marker reply
    pub const RESTART_MARKER: u16 = 110;
    /// Data connection already open; transfer starting
    pub const CONNECTION_ALREADY_OPEN: u16 = 125;
    /// File status okay; about to open data connection
    pub const FILE_STATUS_OKAY: u16 = 150;

    /// Command okay
    pub const COMMAND_OKAY: u16 = 200;
    /// Command not implemented, superfluous at this site
    pub const COMMAND_OKAY_NOT_IMPLEMENTED: u16 = 202;
    /// System status reply (STAT)
    pub const SYSTEM_STATUS: u16 = 211;
    /// File status reply (SIZE, MDTM)
    pub const FILE_STATUS: u16 = 213;
    /// System type reply (SYST)
    pub const SYSTEM_TYPE: u16 = 215;
    /// Service ready for new user (the greeting)
    pub const SERVICE_READY: u16 = 220;
    /// Service closing control connection (QUIT)
    pub const CLOSING_CONTROL: u16 = 221;
    /// Closing data connection; transfer successful
    pub const CLOSING_DATA: u16 = 226;
    /// Entering passive mode (RFC 959 §4.1.2)
    pub const ENTERING_PASSIVE: u16 = 227;
    /// Entering extended passive mode (RFC 2428 §3)
    pub const ENTERING_EXTENDED_PASSIVE: u16 = 229;
    /// User logged in, proceed
    pub const LOGGED_IN: u16 = 230;
    /// Security mechanism accepted (AUTH TLS/SSL, RFC 2228)
    pub const AUTH_ACCEPTED: u16 = 234;
    /// Requested file action okay, completed
    pub const FILE_ACTION_OKAY: u16 = 250;
    /// Pathname created (MKD, also PWD's quoted-path reply)
    pub const PATHNAME_CREATED: u16 = 257;

    /// User name okay, need password
    pub const NEED_PASSWORD: u16 = 331;
    /// Need account for login
    pub const NEED_ACCOUNT: u16 = 332;
    /// Requested file action pending further information (RNFR, REST)
    pub const FILE_ACTION_PENDING: u16 = 350;

    /// Service not available, closing control connection
    pub const SERVICE_NOT_AVAILABLE: u16 = 421;
    /// Can't open data connection
    pub const CANT_OPEN_DATA: u16 = 425;
    /// Connection closed; transfer aborted
    pub const TRANSFER_ABORTED: u16 = 426;
    /// Requested file action not taken (transient)
    pub const TRANSIENT_FILE_ERROR: u16 = 450;

    /// Syntax error, command unrecognized
    pub const COMMAND_NOT_RECOGNIZED: u16 = 500;
    /// Syntax error in parameters or arguments
    pub const COMMAND_SYNTAX_ERROR: u16 = 501;
    /// Command not implemented
    pub const NOT_IMPLEMENTED: u16 = 502;
    /// Bad sequence of commands
    pub const BAD_SEQUENCE: u16 = 503;
    /// Not logged in
    pub const NOT_LOGGED_IN: u16 = 530;
    /// Requested action not taken; file unavailable
    pub const FILE_UNAVAILABLE: u16 = 550;
}

/// Stream-oriented reply parser
///
/// Bytes are buffered and interpreted as ISO-8859-1 to preserve byte
/// identity; a reply is complete once a `ddd ` line (terminated by a
/// newline) appears at the start of the buffer or right after a newline.
/// Multi-line replies (`ddd-...`) are consumed up to and including that
/// terminating line. Malformed bytes never raise an error; they accumulate
/// until a terminator arrives.
#[derive(Debug, Default)]
pub struct ReplyParser {
    buf: Vec<u8>,
}

impl ReplyParser {
    /// Create an empty parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete reply, in order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Reply> {
        self.buf.extend_from_slice(chunk);

        let mut replies = Vec::new();
        while let Some(reply) = self.pop_reply() {
            replies.push(reply);
        }
        replies
    }

    /// Number of buffered bytes not yet forming a complete reply
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn pop_reply(&mut self) -> Option<Reply> {
        let mut line_start = 0;
        for i in 0..self.buf.len() {
            if self.buf[i] != b'\n' {
                continue;
            }
            let line = &self.buf[line_start..i];
            if let Some(code) = terminating_code(line) {
                let raw: Vec<u8> = self.buf.drain(..=i).collect();
                return Some(assemble(code, &raw));
            }
            line_start = i + 1;
        }
        None
    }
}

/// Code of a `ddd ` terminating line, if this line is one
fn terminating_code(line: &[u8]) -> Option<u16> {
    // The line may carry a trailing '\r'; it does not affect the prefix.
    if line.len() < 4 {
        return None;
    }
    if !line[..3].iter().all(u8::is_ascii_digit) || line[3] != b' ' {
        return None;
    }
    let code = (line[0] - b'0') as u16 * 100 + (line[1] - b'0') as u16 * 10 + (line[2] - b'0') as u16;
    Some(code)
}

/// Build a Reply from the raw bytes of one framed reply
fn assemble(code: u16, raw: &[u8]) -> Reply {
    let text: String = raw.iter().map(|&b| b as char).collect();
    let prefix = format!("{:03}", code);

    let mut lines = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() && lines.is_empty() {
            continue;
        }
        // Strip the reply-code prefix only when followed by '-' or ' '.
        let stripped = match line.strip_prefix(&prefix) {
            Some(rest) if rest.starts_with('-') || rest.starts_with(' ') => &rest[1..],
            _ => line,
        };
        lines.push(stripped);
    }
    // Drop the empty trailing segment produced by the final newline.
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    Reply {
        code,
        text: lines.join("\n").trim().to_string(),
    }
}
