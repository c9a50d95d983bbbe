//! MS-DOS (IIS) listing lines via the public parser

use chrono::{Datelike, Timelike};
use ftp_rs::listing::{EntryKind, ListingMode, parse_listing};

#[test]
fn test_file_and_directory_lines() {
    let text = "03-25-18  10:35AM                 4755 readme.htm\r\n\
                03-25-18  02:21PM       <DIR>          wwwroot\r\n";
    let entries = parse_listing(text, ListingMode::List);
    assert_eq!(entries.len(), 2);

    let file = entries[0].entry().expect("file parsed");
    assert_eq!(file.kind, EntryKind::File);
    assert_eq!(file.name, "readme.htm");
    assert_eq!(file.size, 4755);
    let date = file.modified.expect("date");
    assert_eq!((date.year(), date.month(), date.day()), (2018, 3, 25));
    assert_eq!(date.hour(), 10);

    let dir = entries[1].entry().expect("dir parsed");
    assert_eq!(dir.kind, EntryKind::Directory);
    assert_eq!(dir.name, "wwwroot");
    assert_eq!(dir.modified.expect("date").hour(), 14);
}

#[test]
fn test_two_digit_year_pivot() {
    let entries = parse_listing(
        "12-01-69  01:00PM  1 future\r\n12-01-70  01:00PM  1 past\r\n",
        ListingMode::List,
    );
    assert_eq!(
        entries[0].entry().expect("parsed").modified.unwrap().year(),
        2069
    );
    assert_eq!(
        entries[1].entry().expect("parsed").modified.unwrap().year(),
        1970
    );
}

#[test]
fn test_twelve_hour_clock_edges() {
    let entries = parse_listing(
        "01-01-20  12:01AM  1 after-midnight\r\n01-01-20  12:01PM  1 after-noon\r\n",
        ListingMode::List,
    );
    assert_eq!(entries[0].entry().unwrap().modified.unwrap().hour(), 0);
    assert_eq!(entries[1].entry().unwrap().modified.unwrap().hour(), 12);
}
