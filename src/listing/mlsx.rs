//! MLSx machine-readable listing grammar (RFC 3659 §7)
//!
//! `fact1=val1;fact2=val2; name` — fact names are case-insensitive and the
//! pathname follows the single space after the fact list.

use super::{Entry, EntryKind, Permissions, Rights};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;

pub(super) fn parse(line: &str) -> Option<Entry> {
    let (facts_part, name) = line.split_once(' ')?;
    if name.is_empty() || !facts_part.ends_with(';') {
        return None;
    }

    let mut facts: HashMap<String, &str> = HashMap::new();
    for fact in facts_part.split(';').filter(|f| !f.is_empty()) {
        let (key, value) = fact.split_once('=')?;
        facts.insert(key.to_ascii_lowercase(), value);
    }

    let kind = match facts.get("type").copied() {
        Some("dir" | "cdir" | "pdir") => EntryKind::Directory,
        _ => EntryKind::File,
    };

    let mut entry = Entry::new(kind, name);

    if let Some(modify) = facts.get("modify") {
        entry.modified = Some(parse_timestamp(modify)?);
    }

    if let Some(size) = facts.get("size").or_else(|| facts.get("sizd")) {
        entry.size = size.parse().ok()?;
    }

    if let Some(mode) = facts.get("unix.mode") {
        let (rights, sticky) = decode_mode(mode)?;
        entry.rights = Some(rights);
        entry.sticky = sticky;
    } else if let Some(perm) = facts.get("perm") {
        entry.rights = Some(rights_from_perm(perm));
    }

    entry.owner = facts
        .get("unix.owner")
        .or_else(|| facts.get("unix.uid"))
        .map(|v| v.to_string());
    entry.group = facts
        .get("unix.group")
        .or_else(|| facts.get("unix.gid"))
        .map(|v| v.to_string());

    Some(entry)
}

/// Parse an RFC 3659 time-val: `YYYYMMDDHHMMSS[.fraction]`, always UTC
///
/// Shared with MDTM reply handling.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (s, None),
    };
    if whole.len() != 14 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = whole[0..4].parse().ok()?;
    let month: u32 = whole[4..6].parse().ok()?;
    let day: u32 = whole[6..8].parse().ok()?;
    let hour: u32 = whole[8..10].parse().ok()?;
    let minute: u32 = whole[10..12].parse().ok()?;
    let second: u32 = whole[12..14].parse().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let mut date = Utc.from_utc_datetime(&naive);

    if let Some(frac) = frac {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // Scale the fraction to nanoseconds; anything finer is discarded.
        let digits: String = frac.chars().take(9).collect();
        let nanos: i64 = digits.parse::<i64>().ok()? * 10i64.pow(9 - digits.len() as u32);
        date = date + Duration::nanoseconds(nanos);
    }
    Some(date)
}

/// Decompose a `UNIX.mode` octal value into permission triples
fn decode_mode(mode: &str) -> Option<(Rights, bool)> {
    if mode.is_empty() || mode.len() > 4 {
        return None;
    }
    let bits = u32::from_str_radix(mode, 8).ok()?;

    let triple = |shift: u32| Permissions {
        read: bits >> shift & 0o4 != 0,
        write: bits >> shift & 0o2 != 0,
        execute: bits >> shift & 0o1 != 0,
    };

    Some((
        Rights {
            user: triple(6),
            group: triple(3),
            other: triple(0),
        },
        bits & 0o1000 != 0,
    ))
}

/// Synthesize rights from `perm` letters, applied to the user triple only
///
/// RFC 3659 §7.5.5: a/c/m/p/w imply write access, r read, e/l traversal.
fn rights_from_perm(perm: &str) -> Rights {
    let mut user = Permissions::default();
    for letter in perm.chars() {
        match letter.to_ascii_lowercase() {
            'a' | 'c' | 'm' | 'p' | 'w' => user.write = true,
            'r' => user.read = true,
            'e' | 'l' => user.execute = true,
            _ => {}
        }
    }
    Rights {
        user,
        ..Rights::default()
    }
}
