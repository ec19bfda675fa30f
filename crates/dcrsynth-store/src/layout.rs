//! On-disk naming for artifact versions.
//!
//! Layout inside the store root (flat):
//! - `<tableId>-<timestamp>.json`  audit copy, one per generation run
//! - `<tableId>-latest.json`       canonical copy, overwritten every run
//!
//! Timestamps are UTC `YYYYMMDDTHHMMSSmmmZ`, so lexical order is creation order.

use time::macros::format_description;
use time::OffsetDateTime;

use crate::errors::{StoreError, StoreResult};

pub const LATEST_MARKER: &str = "latest";
pub const EXTENSION: &str = ".json";

const TIMESTAMP_LEN: usize = 19;

pub fn format_timestamp(at: OffsetDateTime) -> StoreResult<String> {
    let fmt = format_description!(
        "[year][month][day]T[hour][minute][second][subsecond digits:3]Z"
    );
    at.to_offset(time::UtcOffset::UTC)
        .format(&fmt)
        .map_err(|e| StoreError::Timestamp(e.to_string()))
}

/// True for strings produced by [`format_timestamp`].
pub fn is_timestamp(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == TIMESTAMP_LEN
        && b[..8].iter().all(u8::is_ascii_digit)
        && b[8] == b'T'
        && b[9..18].iter().all(u8::is_ascii_digit)
        && b[18] == b'Z'
}

/// Reject ids that would escape the store root or produce ambiguous names.
pub fn validate_table_id(table_id: &str) -> StoreResult<()> {
    let bad = table_id.is_empty()
        || table_id == "."
        || table_id == ".."
        || table_id.contains(['/', '\\'])
        || table_id.chars().any(char::is_control);
    if bad {
        return Err(StoreError::InvalidTableId(table_id.to_string()));
    }
    Ok(())
}

pub fn versioned_file_name(table_id: &str, timestamp: &str) -> String {
    format!("{table_id}-{timestamp}{EXTENSION}")
}

pub fn latest_file_name(table_id: &str) -> String {
    versioned_file_name(table_id, LATEST_MARKER)
}

/// Timestamp of a versioned file belonging to `table_id`, if it is one.
pub fn parse_versioned<'a>(table_id: &str, file_name: &'a str) -> Option<&'a str> {
    let rest = file_name
        .strip_prefix(table_id)?
        .strip_prefix('-')?
        .strip_suffix(EXTENSION)?;
    is_timestamp(rest).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamps_are_sortable_and_recognized() {
        let a = format_timestamp(datetime!(2026-01-02 03:04:05.678 UTC)).unwrap();
        let b = format_timestamp(datetime!(2026-01-02 03:04:06 UTC)).unwrap();
        assert_eq!(a, "20260102T030405678Z");
        assert!(a < b);
        assert!(is_timestamp(&a));
        assert!(!is_timestamp(LATEST_MARKER));
    }

    #[test]
    fn parses_only_own_versions() {
        let ts = "20260102T030405678Z";
        assert_eq!(parse_versioned("Syslog", &versioned_file_name("Syslog", ts)), Some(ts));
        assert_eq!(parse_versioned("Syslog", &latest_file_name("Syslog")), None);
        // Another table sharing the prefix is not ours.
        assert_eq!(
            parse_versioned("Device", &versioned_file_name("Device-Events", ts)),
            None
        );
        assert_eq!(parse_versioned("Syslog", "Syslog-20260102T030405678Z.json.tmp"), None);
    }

    #[test]
    fn rejects_path_like_ids() {
        assert!(validate_table_id("SecurityEvent").is_ok());
        assert!(validate_table_id("MyApp_CL").is_ok());
        assert!(validate_table_id("").is_err());
        assert!(validate_table_id("../etc").is_err());
        assert!(validate_table_id("a\\b").is_err());
    }
}
