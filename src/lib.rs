#![doc = include_str!("../README.md")]

mod client;
/// FTP command builders
pub mod commands;
mod config;
mod dispatcher;
mod error;
mod features;
/// Directory listing parsers (Unix `ls -l`, MS-DOS, MLSx)
pub mod listing;
/// FTP reply types and the control-channel reply parser
pub mod response;
/// Optionally-TLS sockets and MODE Z stream transforms
pub mod transport;

pub use client::{DataReader, FtpClient, SessionEvent, TlsStage};
pub use config::{FeatOverride, PortRange, SecureMode, SessionConfig};
pub use error::{FtpError, Result};
pub use features::Features;
pub use listing::{Entry, EntryKind, ListingEntry, ListingMode, Permissions, Rights};
pub use response::{Reply, ReplyParser, codes};
