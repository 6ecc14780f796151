use chrono::{NaiveDate, NaiveDateTime};

use crate::normalize::clean;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y%m%d%H%M%S",
    "%Y年%m月%d日 %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%Y年%m月%d日"];

/// Outcome of reading a record's timestamp field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTimestamp {
    Absent,
    Valid(NaiveDateTime),
    Malformed(String),
}

/// Parse the timestamp layouts the sources are known to export. A date
/// without a time is taken as midnight.
pub fn parse_timestamp(raw: Option<&str>) -> ParsedTimestamp {
    let Some(value) = clean(raw) else {
        return ParsedTimestamp::Absent;
    };

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return ParsedTimestamp::Valid(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return ParsedTimestamp::Valid(dt);
            }
        }
    }
    ParsedTimestamp::Malformed(value.to_string())
}
