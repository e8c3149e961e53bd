// src/clean/date_parser.rs

use chrono::{NaiveDate, NaiveDateTime};

const EPOCH: Option<NaiveDate> = NaiveDate::from_ymd_opt(1970, 1, 1);

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Lenient parse of a calendar value → Date32 day offset.
///
/// The rating feed mixes date and datetime renderings; time-of-day is
/// discarded. Returns `None` on anything unparseable.
pub fn parse_date32(s: &str) -> Option<i32> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return to_days(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return to_days(d);
        }
    }
    None
}

fn to_days(d: NaiveDate) -> Option<i32> {
    let epoch = EPOCH?;
    i32::try_from((d - epoch).num_days()).ok()
}
