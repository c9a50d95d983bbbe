//! MS-DOS (IIS-style) listing grammar
//!
//! `MM-DD-YY HH:MM(AM|PM)  (<size>|<DIR>)  name`

use super::{Entry, EntryKind};
use chrono::{NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

static MSDOS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<month>\d{2})-(?P<day>\d{2})-(?P<year>\d{2,4})
        \s+(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<meridiem>[AaPp])[Mm]?
        \s+(?:(?P<size>\d+)|(?P<dir><DIR>))
        \s+(?P<name>.+)$",
    )
    .expect("msdos listing regex")
});

pub(super) fn parse(line: &str) -> Option<Entry> {
    let caps = MSDOS_RE.captures(line)?;

    let month: u32 = caps["month"].parse().ok()?;
    let day: u32 = caps["day"].parse().ok()?;
    let year_raw = &caps["year"];
    let year: i32 = {
        let n: i32 = year_raw.parse().ok()?;
        if year_raw.len() == 4 {
            n
        } else if n < 70 {
            n + 2000
        } else {
            n + 1900
        }
    };

    let mut hour: u32 = caps["hour"].parse().ok()?;
    let minute: u32 = caps["minute"].parse().ok()?;
    let meridiem = caps["meridiem"].chars().next()?.to_ascii_lowercase();
    if meridiem == 'p' && hour < 12 {
        hour += 12;
    } else if meridiem == 'a' && hour == 12 {
        hour = 0;
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    let modified = Utc.from_utc_datetime(&date);

    let (kind, size) = if caps.name("dir").is_some() {
        (EntryKind::Directory, -1)
    } else {
        (EntryKind::File, caps["size"].parse().ok()?)
    };

    let mut entry = Entry::new(kind, caps["name"].to_string());
    entry.size = size;
    entry.modified = Some(modified);
    Some(entry)
}
