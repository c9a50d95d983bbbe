//! Unix `ls -l` listing lines via the public parser

use ftp_rs::listing::{EntryKind, ListingEntry, ListingMode, parse_listing};

fn parse_one(line: &str) -> ListingEntry {
    let mut entries = parse_listing(line, ListingMode::List);
    assert_eq!(entries.len(), 1, "expected one entry for {:?}", line);
    entries.remove(0)
}

#[test]
fn test_regular_file() {
    let listed = parse_one("-rw-r--r--   1 ftp      ftp        104857 Feb 11  2019 README");
    let entry = listed.entry().expect("parsed");
    assert_eq!(entry.kind, EntryKind::File);
    assert_eq!(entry.name, "README");
    assert_eq!(entry.size, 104_857);
    assert_eq!(entry.owner.as_deref(), Some("ftp"));
}

#[test]
fn test_directory_with_permissions() {
    let listed = parse_one("drwxrwxr-x   9 ftp      ftp          4096 Dec  5  2020 pub");
    let entry = listed.entry().expect("parsed");
    assert_eq!(entry.kind, EntryKind::Directory);

    let rights = entry.rights.expect("rights");
    assert!(rights.user.read && rights.user.write && rights.user.execute);
    assert!(rights.group.write);
    assert!(!rights.other.write);
}

#[test]
fn test_symlink_name_and_target() {
    let listed = parse_one("lrwxrwxrwx   1 root  root  15 Jul  3  2018 latest -> releases/v2.1.0");
    let entry = listed.entry().expect("parsed");
    assert_eq!(entry.kind, EntryKind::Symlink);
    assert_eq!(entry.name, "latest");
    assert_eq!(entry.target.as_deref(), Some("releases/v2.1.0"));
}

#[test]
fn test_sticky_world_writable_dir() {
    let listed = parse_one("drwxrwxrwt   7 root  root  4096 Aug  1  2023 incoming");
    let entry = listed.entry().expect("parsed");
    assert!(entry.sticky);
    assert!(entry.rights.expect("rights").other.execute);
}

#[test]
fn test_acl_plus_marker() {
    let listed = parse_one("-rw-rw----+  1 svc  svc  2048 Sep 30  2022 shared.db");
    assert!(listed.entry().expect("parsed").acl);
}

#[test]
fn test_total_header_dropped_and_garbage_passed_through() {
    let text = "total 128\r\n\
                -rw-r--r-- 1 ftp ftp 10 Jan 15  2021 a\r\n\
                ?????????? broken line\r\n";
    let entries = parse_listing(text, ListingMode::List);
    assert_eq!(entries.len(), 2);
    assert!(entries[0].entry().is_some());
    assert_eq!(
        entries[1],
        ListingEntry::Raw("?????????? broken line".to_string())
    );
}
