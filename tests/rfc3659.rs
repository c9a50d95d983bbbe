//! RFC 3659 - Extensions to FTP (MLSx listings, time-vals)

use chrono::{TimeZone, Utc};
use ftp_rs::listing::{EntryKind, ListingEntry, ListingMode, parse_listing};

fn parse_one(line: &str) -> ListingEntry {
    let mut entries = parse_listing(line, ListingMode::Mlsd);
    assert_eq!(entries.len(), 1);
    entries.remove(0)
}

#[test]
fn test_mlsd_file_entry() {
    let listed = parse_one("type=file;size=3;modify=20220101120000; foo.txt");
    let entry = listed.entry().expect("parsed");
    assert_eq!(entry.kind, EntryKind::File);
    assert_eq!(entry.size, 3);
    assert_eq!(entry.name, "foo.txt");
    assert_eq!(
        entry.modified,
        Some(Utc.with_ymd_and_hms(2022, 1, 1, 12, 0, 0).unwrap())
    );
}

#[test]
fn test_mlsd_directory_entries() {
    let text = "type=cdir;modify=20210901000000; .\r\n\
                type=pdir;modify=20210901000000; ..\r\n\
                type=dir;modify=20211001083000; releases\r\n";
    let entries = parse_listing(text, ListingMode::Mlsd);
    assert_eq!(entries.len(), 3);
    for listed in &entries {
        assert_eq!(listed.entry().expect("parsed").kind, EntryKind::Directory);
    }
}

#[test]
fn test_modify_fraction_accepted() {
    let listed = parse_one("type=file;modify=20220101120000.25; frac");
    let entry = listed.entry().expect("parsed");
    let expected = Utc.with_ymd_and_hms(2022, 1, 1, 12, 0, 0).unwrap()
        + chrono::Duration::milliseconds(250);
    assert_eq!(entry.modified, Some(expected));
}

#[test]
fn test_unix_mode_fact_decomposed() {
    let listed = parse_one("type=file;unix.mode=0750; tool.sh");
    let rights = listed.entry().expect("parsed").rights.expect("rights");
    assert!(rights.user.read && rights.user.write && rights.user.execute);
    assert!(rights.group.read && !rights.group.write && rights.group.execute);
    assert!(!rights.other.read);
}

#[test]
fn test_perm_letters_synthesize_user_rights() {
    let listed = parse_one("type=file;perm=adfrw; doc.txt");
    let rights = listed.entry().expect("parsed").rights.expect("rights");
    assert!(rights.user.read);
    assert!(rights.user.write);
    assert!(!rights.user.execute);
}

#[test]
fn test_name_after_fact_list_keeps_spaces() {
    let listed = parse_one("type=file;size=12; annual report.pdf");
    assert_eq!(listed.entry().expect("parsed").name, "annual report.pdf");
}

#[test]
fn test_unparseable_line_returned_raw() {
    let listed = parse_one("this is not an mlsx line at all");
    assert_eq!(
        listed,
        ListingEntry::Raw("this is not an mlsx line at all".to_string())
    );
}

#[test]
fn test_malformed_modify_returns_raw() {
    // A fact list with an invalid time-val falls back to pass-through
    // rather than silently mangling the date.
    let listed = parse_one("type=file;modify=20229999; broken");
    assert!(matches!(listed, ListingEntry::Raw(_)));
}
