//! Unix `ls -l` listing grammar

use super::{Entry, EntryKind, Permissions, Rights};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

static UNIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<kind>[dl-])
        (?P<perms>[rwxsStT-]{9})
        (?P<acl>\+)?
        \s+\d+                      # link count
        \s+(?P<owner>\S+)
        \s+(?P<group>\S+)
        \s+(?P<size>\d+)
        \s+(?P<month>[A-Za-z]{3})
        \s+(?P<day>\d{1,2})
        \s+(?P<when>\d{4}|\d{1,2}:\d{2})
        \s+(?P<name>.+)$",
    )
    .expect("unix listing regex")
});

pub(super) fn parse(line: &str) -> Option<Entry> {
    parse_with_now(line, Utc::now())
}

/// Parse with an explicit "now" so year inference is testable
pub(crate) fn parse_with_now(line: &str, now: DateTime<Utc>) -> Option<Entry> {
    let caps = UNIX_RE.captures(line)?;

    let kind = match &caps["kind"] {
        "d" => EntryKind::Directory,
        "l" => EntryKind::Symlink,
        _ => EntryKind::File,
    };

    let perms = &caps["perms"];
    let (rights, sticky) = decode_permissions(perms)?;

    let size: i64 = caps["size"].parse().ok()?;
    let month = month_number(&caps["month"])?;
    let day: u32 = caps["day"].parse().ok()?;
    let modified = resolve_date(month, day, &caps["when"], now)?;

    let mut name = caps["name"].to_string();
    let mut target = None;
    if kind == EntryKind::Symlink {
        if let Some((n, t)) = name.split_once(" -> ") {
            target = Some(t.to_string());
            name = n.to_string();
        }
    }

    let mut entry = Entry::new(kind, name);
    entry.size = size;
    entry.modified = Some(modified);
    entry.owner = Some(caps["owner"].to_string());
    entry.group = Some(caps["group"].to_string());
    entry.target = target;
    entry.rights = Some(rights);
    entry.sticky = sticky;
    entry.acl = caps.name("acl").is_some();
    Some(entry)
}

/// Decode the nine permission characters into triples plus the sticky bit
///
/// A trailing `t` on the other-triple sets sticky and counts as execute; a
/// trailing `T` sets sticky without execute.
fn decode_permissions(perms: &str) -> Option<(Rights, bool)> {
    let chars: Vec<char> = perms.chars().collect();
    if chars.len() != 9 {
        return None;
    }

    let triple = |offset: usize| Permissions {
        read: chars[offset] == 'r',
        write: chars[offset + 1] == 'w',
        execute: matches!(chars[offset + 2], 'x' | 's' | 't'),
    };

    let sticky = matches!(chars[8], 't' | 'T');
    Some((
        Rights {
            user: triple(0),
            group: triple(3),
            other: triple(6),
        },
        sticky,
    ))
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

/// Resolve `Mon DD HH:MM` / `Mon DD YYYY` into a concrete UTC timestamp
///
/// When the year is absent the current year is assumed; a result more than
/// 28 hours in the future rolls back a year, and one more than 186 days in
/// the past rolls forward a year (server/client year-boundary skew).
fn resolve_date(month: u32, day: u32, when: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some((hour, minute)) = when.split_once(':') {
        let hour: u32 = hour.parse().ok()?;
        let minute: u32 = minute.parse().ok()?;

        let candidate = date_at(now.year(), month, day, hour, minute)?;
        if candidate - now > Duration::hours(28) {
            date_at(now.year() - 1, month, day, hour, minute)
        } else if now - candidate > Duration::days(186) {
            date_at(now.year() + 1, month, day, hour, minute)
        } else {
            Some(candidate)
        }
    } else {
        let year: i32 = when.parse().ok()?;
        date_at(year, month, day, 0, 0)
    }
}

fn date_at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let naive = date.and_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}
