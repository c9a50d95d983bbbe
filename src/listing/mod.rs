//! Directory listing parsers
//!
//! Three line grammars are supported: Unix `ls -l`, MS-DOS, and the
//! machine-readable MLSx format (RFC 3659 §7). LIST output is tried against
//! Unix then MS-DOS; MLSD output only against MLSx. Lines no grammar accepts
//! are passed through verbatim so callers never lose information.

mod msdos;
mod mlsx;
mod unix;

pub(crate) use mlsx::parse_timestamp;

use chrono::{DateTime, Utc};

/// Kind of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
}

/// One permission triple (read/write/execute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    /// Read bit
    pub read: bool,
    /// Write bit
    pub write: bool,
    /// Execute bit
    pub execute: bool,
}

/// Unix-style rights for user, group and other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rights {
    /// Owner triple
    pub user: Permissions,
    /// Group triple
    pub group: Permissions,
    /// Other triple
    pub other: Permissions,
}

/// A parsed listing entry
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// File, directory, or symlink
    pub kind: EntryKind,
    /// Entry name (symlink target split off into `target`)
    pub name: String,
    /// Size in bytes; -1 when the listing did not carry one
    pub size: i64,
    /// Last modification time, when the listing carried one
    pub modified: Option<DateTime<Utc>>,
    /// Owner name or uid
    pub owner: Option<String>,
    /// Group name or gid
    pub group: Option<String>,
    /// Symlink target
    pub target: Option<String>,
    /// Permission triples, when derivable
    pub rights: Option<Rights>,
    /// Sticky bit
    pub sticky: bool,
    /// Entry carries an ACL beyond the mode bits
    pub acl: bool,
}

impl Entry {
    pub(crate) fn new(kind: EntryKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            size: -1,
            modified: None,
            owner: None,
            group: None,
            target: None,
            rights: None,
            sticky: false,
            acl: false,
        }
    }

    /// True for directories
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// A listing line: parsed, or passed through verbatim
#[derive(Debug, Clone, PartialEq)]
pub enum ListingEntry {
    /// A line one of the grammars accepted
    Parsed(Entry),
    /// An unrecognized line, returned byte-for-byte
    Raw(String),
}

impl ListingEntry {
    /// The parsed entry, if this line was recognized
    pub fn entry(&self) -> Option<&Entry> {
        match self {
            ListingEntry::Parsed(e) => Some(e),
            ListingEntry::Raw(_) => None,
        }
    }
}

/// Which command produced the listing text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingMode {
    /// LIST output: Unix grammar first, then MS-DOS
    List,
    /// MLSD/MLST output: MLSx grammar only
    Mlsd,
}

/// Parse one listing line according to the mode
pub fn parse_line(line: &str, mode: ListingMode) -> ListingEntry {
    let parsed = match mode {
        ListingMode::Mlsd => mlsx::parse(line),
        ListingMode::List => unix::parse(line).or_else(|| msdos::parse(line)),
    };
    match parsed {
        Some(entry) => ListingEntry::Parsed(entry),
        None => ListingEntry::Raw(line.to_string()),
    }
}

/// Parse a whole listing body
///
/// `total` summary lines and blank lines are dropped.
pub fn parse_listing(text: &str, mode: ListingMode) -> Vec<ListingEntry> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with("total "))
        .map(|line| parse_line(line, mode))
        .collect()
}
