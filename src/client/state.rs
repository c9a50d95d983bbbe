//! Session-scoped state for the FTP client

use crate::error::FtpError;
use std::collections::HashSet;

/// Events emitted over the session's event channel
#[derive(Debug)]
pub enum SessionEvent {
    /// The server's greeting banner text
    Greeting(String),
    /// Login, feature discovery and TYPE negotiation completed
    Ready,
    /// A QUIT initiated by `end`/`logout` was acknowledged
    End,
    /// The control connection is gone
    Close {
        /// True when the connection died on an error rather than EOF/teardown
        had_error: bool,
    },
    /// A session-level error not tied to any one command
    Error(FtpError),
}

/// How far the control channel's TLS upgrade got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsStage {
    /// No upgrade performed
    None,
    /// Upgraded via AUTH TLS
    UpgradedTls,
    /// Upgraded via the AUTH SSL fallback
    UpgradedSsl,
}

/// Commands the server turned out not to support
///
/// Populated from 500/502 replies. Entries are monotonic: once a command is
/// recorded here it is never retried within the session.
#[derive(Debug, Default)]
pub(crate) struct DetectedSupport {
    unsupported: HashSet<&'static str>,
}

impl DetectedSupport {
    pub(crate) fn mark_unsupported(&mut self, command: &'static str) {
        self.unsupported.insert(command);
    }

    pub(crate) fn is_unsupported(&self, command: &str) -> bool {
        self.unsupported.contains(command)
    }
}

/// Mutable per-session record guarded by the client's state lock
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) detected: DetectedSupport,
    /// Offset staged by `restart()`, consumed by the next transfer
    pub(crate) restart_offset: Option<u64>,
}
