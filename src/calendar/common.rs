use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use icalendar::parser::Property;
use std::str::FromStr;
use url::Url;

/// Validates an ICS URL for security and format correctness
pub fn validate_ics_url_format(ics_url: &str) -> AppResult<()> {
    if ics_url.trim().is_empty() {
        return Err(AppError::invalid_input(
            "ICS URL cannot be empty. Please provide a valid calendar ICS URL.",
        ));
    }

    let parsed_url = Url::parse(ics_url).map_err(|e| {
        AppError::invalid_input(format!(
            "Invalid ICS URL format: {}. Please ensure the URL is properly formatted (e.g., https://calendar.example.com/path/calendar.ics)",
            e
        ))
    })?;

    // Enforce HTTPS for security
    if parsed_url.scheme() != "https" {
        return Err(AppError::invalid_input(format!(
            "ICS URL must use HTTPS protocol for security. HTTP is not allowed. \
             Your URL starts with '{}://'. Please use an HTTPS URL instead.",
            parsed_url.scheme()
        )));
    }

    let domain = parsed_url.host_str().ok_or_else(|| {
        AppError::invalid_input(format!(
            "ICS URL must have a valid domain name. The provided URL '{}' does not contain a valid host.",
            ics_url
        ))
    })?;

    // Reject localhost and local network addresses
    if domain == "localhost"
        || domain.starts_with("127.")
        || domain.starts_with("192.168.")
        || domain.starts_with("10.")
        || domain.starts_with("172.16.")
    {
        return Err(AppError::invalid_input(
            "ICS URL cannot point to localhost or local network addresses. \
             Please use a publicly accessible calendar URL.",
        ));
    }

    let path = parsed_url.path();
    if path.is_empty() || path == "/" {
        log::warn!(
            "ICS URL has no path component. This may not be a valid calendar feed URL: {}",
            ics_url
        );
    } else if !path.to_lowercase().ends_with(".ics") && !path.contains("/calendar") {
        log::warn!(
            "ICS URL path does not appear to be a calendar feed (expected .ics extension or /calendar path): {}",
            ics_url
        );
    }

    Ok(())
}

/// Midnight UTC for a calendar date. All-day boundaries are kept on this
/// grid so they do not shift with the viewer's zone.
pub fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Resolve a wall-clock time in a named zone. Unrecognized zones fall back to
/// the system zone. Times skipped by a DST jump resolve to the earliest
/// valid interpretation after the gap.
pub fn resolve_local(date_time: &NaiveDateTime, tzid: Option<&str>) -> Option<DateTime<Utc>> {
    match tzid.map(chrono_tz::Tz::from_str) {
        Some(Ok(tz)) => tz
            .from_local_datetime(date_time)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(*date_time + chrono::Duration::hours(1))).earliest())
            .map(|zoned| zoned.with_timezone(&Utc)),
        Some(Err(_)) | None => {
            if let Some(tzid) = tzid {
                log::warn!("Unrecognized timezone '{}', treating as local time", tzid);
            }
            chrono::Local
                .from_local_datetime(date_time)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
        }
    }
}

/// Parse ICS datetime with proper timezone conversion
pub fn parse_ical_datetime(dt: &icalendar::DatePerhapsTime) -> Option<DateTime<Utc>> {
    match dt {
        icalendar::DatePerhapsTime::DateTime(dt) => match dt {
            icalendar::CalendarDateTime::Utc(dt) => Some(dt.naive_utc().and_utc()),
            // Floating time is wall-clock time wherever the viewer is
            icalendar::CalendarDateTime::Floating(naive_dt) => resolve_local(naive_dt, None),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                resolve_local(date_time, Some(tzid))
            }
        },
        icalendar::DatePerhapsTime::Date(date) => Some(date_to_utc(*date)),
    }
}

pub fn param<'a>(prop: &'a Property, key: &str) -> Option<&'a str> {
    prop.params
        .iter()
        .find(|p| p.key == key)
        .and_then(|p| p.val.as_ref().map(|v| v.as_ref()))
}

/// Every instant listed in an EXDATE property, which may hold a comma list.
pub fn parse_exdate_property(prop: &Property) -> Vec<DateTime<Utc>> {
    let tzid = param(prop, "TZID");
    let is_date = param(prop, "VALUE") == Some("DATE");

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if is_date || s.len() == 8 {
                return NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(date_to_utc);
            }
            let naive = NaiveDateTime::parse_from_str(s.trim_end_matches('Z'), "%Y%m%dT%H%M%S").ok()?;
            if s.ends_with('Z') {
                Some(naive.and_utc())
            } else {
                resolve_local(&naive, tzid)
            }
        })
        .collect()
}

pub fn parse_utc_stamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim().trim_end_matches('Z'), "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

pub fn format_utc_stamp(value: &DateTime<Utc>) -> String {
    value.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Undo RFC 5545 TEXT escaping.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use icalendar::{CalendarDateTime, DatePerhapsTime};

    #[test]
    fn test_validate_ics_url_format_valid() {
        let url = "https://calendar.google.com/calendar/ical/user/private/basic.ics";
        assert!(validate_ics_url_format(url).is_ok());
    }

    #[test]
    fn test_validate_ics_url_format_invalid_scheme() {
        let result = validate_ics_url_format("http://calendar.example.com/basic.ics");
        assert!(result.unwrap_err().to_string().contains("HTTPS"));
    }

    #[test]
    fn test_validate_ics_url_format_empty() {
        let result = validate_ics_url_format("   ");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_ics_url_format_local_network() {
        let result = validate_ics_url_format("https://localhost/calendar.ics");
        assert!(result.unwrap_err().to_string().contains("localhost"));

        let result = validate_ics_url_format("https://192.168.1.1/calendar.ics");
        assert!(result.unwrap_err().to_string().contains("local network"));
    }

    #[test]
    fn test_parse_ical_datetime_with_timezone() {
        let naive = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let dt = DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone {
            date_time: naive,
            tzid: "America/New_York".to_string(),
        });
        // 12:00 NY is 17:00 UTC
        let expected = Utc.with_ymd_and_hms(2023, 1, 1, 17, 0, 0).unwrap();
        assert_eq!(parse_ical_datetime(&dt), Some(expected));
    }

    #[test]
    fn test_parse_ical_datetime_date_only_is_midnight_utc() {
        let dt = DatePerhapsTime::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(
            parse_ical_datetime(&dt),
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_dst_gap_resolves_forward() {
        // 02:30 does not exist in Berlin on 2024-03-31
        let naive = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap().and_hms_opt(2, 30, 0).unwrap();
        let resolved = resolve_local(&naive, Some("Europe/Berlin")).unwrap();
        assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 3, 31, 1, 30, 0).unwrap());
    }

    #[test]
    fn test_unescape_text() {
        assert_eq!(unescape_text(r"Lunch\, then review\; bring notes\nRoom 4"), "Lunch, then review; bring notes\nRoom 4");
        assert_eq!(unescape_text(r"C:\\temp"), r"C:\temp");
    }

    #[test]
    fn test_utc_stamp_round_trip() {
        let stamp = Utc.with_ymd_and_hms(2024, 2, 29, 8, 5, 9).unwrap();
        assert_eq!(format_utc_stamp(&stamp), "20240229T080509Z");
        assert_eq!(parse_utc_stamp("20240229T080509Z"), Some(stamp));
    }
}
