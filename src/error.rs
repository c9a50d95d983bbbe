//! FTP error types

use thiserror::Error;

/// FTP protocol and connection errors
#[derive(Error, Debug)]
pub enum FtpError {
    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error during secure connection
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection or reply timeout
    #[error("{0}")]
    Timeout(&'static str),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// FTP protocol error with reply code
    #[error("FTP error {code}: {message}")]
    Protocol {
        /// FTP reply code (e.g., 530, 550, 502)
        code: u16,
        /// Error message from server
        message: String,
    },

    /// Data channel failure (negotiation, connect, or port allocation)
    #[error("{0}")]
    DataChannel(String),

    /// A data operation observed ABOR in the command queue
    #[error("aborted")]
    Aborted,

    /// Malformed value from the server (dates, sizes)
    #[error("{0}")]
    Parse(String),

    /// Connection closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,
}

impl FtpError {
    /// Reply code for protocol errors, None otherwise
    pub fn code(&self) -> Option<u16> {
        match self {
            FtpError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for 500/502 replies, which mean the verb itself is unsupported
    pub(crate) fn is_unsupported(&self) -> bool {
        matches!(
            self,
            FtpError::Protocol {
                code: 500 | 502,
                ..
            }
        )
    }
}

/// Result type alias using FtpError
pub type Result<T> = std::result::Result<T, FtpError>;
