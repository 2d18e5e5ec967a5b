//! Recurrence expansion.
//!
//! Occurrence starts come from the `rrule` crate; exclusion dates and the
//! window intersection test are applied here so the same rules hold for
//! recurring and one-off events.

use crate::error::{AppError, AppResult};
use crate::models::{Event, Occurrence};
use chrono::{DateTime, Duration, Utc};
use log::warn;
use rrule::RRuleSet;
use std::sync::Arc;

/// Hard ceiling on starts produced for one event in one window.
const EXPANSION_LIMIT: u16 = u16::MAX;

fn build_rrule_set(event: &Event) -> AppResult<Option<RRuleSet>> {
    let Some(rule) = &event.data.recurrence else {
        return Ok(None);
    };
    rule.validate()?;
    if rule.until.is_some_and(|until| until < event.data.start) {
        return Err(AppError::invalid_recurrence(format!(
            "event '{}': UNTIL is before the first occurrence",
            event.uid
        )));
    }

    let zone = if event.data.all_day {
        None
    } else {
        event
            .data
            .timezone
            .as_deref()
            .and_then(|tz| tz.parse::<chrono_tz::Tz>().ok().map(|parsed| (tz, parsed)))
    };

    // The rrule crate needs a datetime DTSTART; all-day events anchor at midnight UTC.
    let dtstart = match zone {
        Some((tzid, tz)) => format!(
            "DTSTART;TZID={}:{}",
            tzid,
            event.data.start.with_timezone(&tz).format("%Y%m%dT%H%M%S")
        ),
        None => format!("DTSTART:{}", event.data.start.format("%Y%m%dT%H%M%SZ")),
    };
    let text = format!("{}\nRRULE:{}", dtstart, rule.to_rrule_value());

    text.parse::<RRuleSet>().map(Some).map_err(|e| {
        AppError::invalid_recurrence(format!("event '{}': {}", event.uid, e))
    })
}

/// Check that an event's recurrence can actually be expanded.
pub fn validate_event(event: &Event) -> AppResult<()> {
    event.data.validate()?;
    build_rrule_set(event).map(|_| ())
}

fn intersects(start: DateTime<Utc>, end: DateTime<Utc>, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> bool {
    end > window_start && start < window_end
}

/// Occurrences of `event` intersecting `[window_start, window_end)`, ordered
/// by start. An occurrence that starts before the window but ends inside it
/// is included.
pub fn expand(
    event: &Arc<Event>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> AppResult<Vec<Occurrence>> {
    let duration = event.duration();

    let Some(set) = build_rrule_set(event)? else {
        let (start, end) = (event.data.start, event.data.end);
        if intersects(start, end, window_start, window_end) {
            return Ok(vec![Occurrence::new(Arc::clone(event), start, end)]);
        }
        return Ok(Vec::new());
    };

    let tz: rrule::Tz = Utc.into();
    let after = window_start
        .checked_sub_signed(duration + Duration::seconds(1))
        .unwrap_or(window_start);
    let before = window_end
        .checked_add_signed(Duration::seconds(1))
        .unwrap_or(window_end);

    let result = set
        .after(after.with_timezone(&tz))
        .before(before.with_timezone(&tz))
        .all(EXPANSION_LIMIT);
    if result.limited {
        warn!(
            "Expansion of '{}' hit the {} occurrence limit; window truncated",
            event.uid, EXPANSION_LIMIT
        );
    }

    let exdates = &event.data.exdates;
    let occurrences = result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|start| !exdates.contains(start))
        .filter_map(|start| {
            let end = start.checked_add_signed(duration)?;
            intersects(start, end, window_start, window_end)
                .then(|| Occurrence::new(Arc::clone(event), start, end))
        })
        .collect();

    Ok(occurrences)
}

/// Interval guaranteed to cover every occurrence of `event`. Unbounded
/// rules extend to the end of representable time.
pub fn span(event: &Event) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = event.data.start;
    let Some(rule) = &event.data.recurrence else {
        return Ok((start, event.data.end.max(start)));
    };
    let duration = event.duration();

    if let Some(until) = rule.until {
        let end = until.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
        return Ok((start, end.max(event.data.end)));
    }

    if let Some(count) = rule.count {
        // Too many to enumerate; treat as open-ended.
        let Ok(limit) = u16::try_from(count) else {
            return Ok((start, DateTime::<Utc>::MAX_UTC));
        };
        let Some(set) = build_rrule_set(event)? else {
            return Ok((start, event.data.end));
        };
        let result = set.all(limit);
        let end = result
            .dates
            .last()
            .and_then(|last| last.with_timezone(&Utc).checked_add_signed(duration))
            .unwrap_or(event.data.end);
        return Ok((start, end.max(event.data.end)));
    }

    Ok((start, DateTime::<Utc>::MAX_UTC))
}
