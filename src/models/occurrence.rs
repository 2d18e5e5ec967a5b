// file: src/models/occurrence.rs
use crate::models::event::Event;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use std::sync::Arc;

/// Shortest span a timed event is drawn with, in hours.
pub const MIN_DISPLAY_HOURS: f64 = 0.5;

/// One concrete appearance of a master event.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub event: Arc<Event>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Occurrence {
    pub fn new(event: Arc<Event>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { event, start, end }
    }

    pub fn uid(&self) -> &str {
        &self.event.uid
    }

    pub fn calendar_id(&self) -> &str {
        &self.event.calendar_id
    }

    pub fn title(&self) -> &str {
        &self.event.data.title
    }

    pub fn is_all_day(&self) -> bool {
        self.event.data.all_day
    }

    pub fn segments<Tz: TimeZone>(&self, tz: &Tz) -> Vec<DisplaySegment> {
        segments(self, tz)
    }
}

/// The part of an occurrence drawn on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySegment {
    pub date: NaiveDate,
    pub visible_start_hour: f64,
    pub visible_end_hour: f64,
}

impl DisplaySegment {
    fn full_day(date: NaiveDate) -> Self {
        Self {
            date,
            visible_start_hour: 0.0,
            visible_end_hour: 24.0,
        }
    }
}

fn fractional_hour(time: NaiveTime) -> f64 {
    time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0
}

/// Split an occurrence into per-day segments in the viewer's zone.
///
/// All-day occurrences are laid out by their stored dates, end exclusive.
/// A timed occurrence ending exactly at midnight does not produce an empty
/// segment on the following day.
pub fn segments<Tz: TimeZone>(occurrence: &Occurrence, tz: &Tz) -> Vec<DisplaySegment> {
    if occurrence.is_all_day() {
        let first = occurrence.start.date_naive();
        let end = occurrence.end.date_naive();
        if end <= first {
            return vec![DisplaySegment::full_day(first)];
        }
        return first
            .iter_days()
            .take_while(|day| *day < end)
            .map(DisplaySegment::full_day)
            .collect();
    }

    let local_start = occurrence.start.with_timezone(tz).naive_local();
    let local_end = occurrence.end.with_timezone(tz).naive_local();

    let first_day = local_start.date();
    let start_hour = fractional_hour(local_start.time());

    let (last_day, end_hour) = if local_end.time() == NaiveTime::MIN && local_end.date() > first_day {
        (local_end.date() - Duration::days(1), 24.0)
    } else {
        (local_end.date(), fractional_hour(local_end.time()))
    };

    if last_day <= first_day {
        let mut end_hour = end_hour;
        if end_hour - start_hour < MIN_DISPLAY_HOURS {
            end_hour = (start_hour + MIN_DISPLAY_HOURS).min(24.0);
        }
        return vec![DisplaySegment {
            date: first_day,
            visible_start_hour: start_hour,
            visible_end_hour: end_hour,
        }];
    }

    let mut result = vec![DisplaySegment {
        date: first_day,
        visible_start_hour: start_hour,
        visible_end_hour: 24.0,
    }];
    result.extend(
        first_day
            .iter_days()
            .skip(1)
            .take_while(|day| *day < last_day)
            .map(DisplaySegment::full_day),
    );
    result.push(DisplaySegment {
        date: last_day,
        visible_start_hour: 0.0,
        visible_end_hour: end_hour,
    });
    result
}
