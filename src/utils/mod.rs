pub mod logging;
pub mod retry;

use chrono::{DateTime, Duration, Utc};

/// Centre of `[start, end)`, used to anchor windowed prefetches.
pub fn window_center(start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    start + (end - start) / 2
}

/// `[center - margin, center + margin]` widened so it always covers
/// `[start, end]` even when the request is wider than the margin.
pub fn prefetch_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    margin: Duration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let center = window_center(start, end);
    let from = (center - margin).min(start);
    let to = (center + margin).max(end);
    (from, to)
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_prefetch_window_is_centered() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap();
        let (from, to) = prefetch_window(start, end, Duration::days(60));

        let center = Utc.with_ymd_and_hms(2024, 6, 4, 12, 0, 0).unwrap();
        assert_eq!(from, center - Duration::days(60));
        assert_eq!(to, center + Duration::days(60));
    }

    #[test]
    fn test_prefetch_window_covers_wide_requests() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let (from, to) = prefetch_window(start, end, Duration::days(1));
        assert_eq!(from, start);
        assert_eq!(to, end);
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Standup \n"), "Standup");
    }
}
