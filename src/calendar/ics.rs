//! VCALENDAR text to and from the event model.

use crate::calendar::common::{
    date_to_utc, format_utc_stamp, param, parse_exdate_property, parse_ical_datetime,
    parse_utc_stamp, unescape_text,
};
use crate::error::{AppError, AppResult};
use crate::models::{Event, EventData, RecurrenceRule};
use chrono::{DateTime, Duration, Utc};
use icalendar::parser::{read_calendar, unfold, Component as ParsedComponent};
use icalendar::{Calendar, Component, DatePerhapsTime, EventLike, Property, ValueType};
use log::{debug, warn};

/// Parse every VEVENT in `text`. Individual events that cannot be
/// understood are skipped with a warning; text that is not a calendar at all
/// is an error.
pub fn parse_calendar(text: &str, calendar_id: &str) -> AppResult<Vec<Event>> {
    if !text.contains("BEGIN:VCALENDAR") {
        return Err(AppError::parse("payload is not a VCALENDAR document"));
    }

    let unfolded = unfold(text);
    let calendar = read_calendar(&unfolded).map_err(|e| AppError::parse(e.to_string()))?;

    let mut events = Vec::new();
    for component in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        // Instance overrides are not modelled; the master still yields the slot.
        if component.find_prop("RECURRENCE-ID").is_some() {
            debug!("Skipping recurrence override in calendar '{}'", calendar_id);
            continue;
        }
        match parse_vevent(component, calendar_id) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping unreadable event in calendar '{}': {}", calendar_id, e),
        }
    }

    Ok(events)
}

fn parse_vevent(vevent: &ParsedComponent, calendar_id: &str) -> AppResult<Event> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .ok_or_else(|| AppError::parse("VEVENT without UID"))?;

    let dtstart_prop = vevent
        .find_prop("DTSTART")
        .ok_or_else(|| AppError::parse(format!("event '{}' has no DTSTART", uid)))?;
    let dtstart = DatePerhapsTime::try_from(dtstart_prop)
        .map_err(|_| AppError::parse(format!("event '{}' has an unreadable DTSTART", uid)))?;
    let all_day = matches!(dtstart, DatePerhapsTime::Date(_));
    let start = parse_ical_datetime(&dtstart)
        .ok_or_else(|| AppError::parse(format!("event '{}' has an unresolvable DTSTART", uid)))?;

    let end = match vevent.find_prop("DTEND").map(DatePerhapsTime::try_from) {
        Some(Ok(dt)) => parse_ical_datetime(&dt),
        _ => None,
    }
    .unwrap_or_else(|| {
        if all_day {
            start + Duration::days(1)
        } else {
            start + Duration::hours(1)
        }
    });

    let timezone = param(dtstart_prop, "TZID")
        .filter(|tz| tz.parse::<chrono_tz::Tz>().is_ok())
        .map(str::to_string);

    let recurrence = vevent
        .find_prop("RRULE")
        .map(|p| RecurrenceRule::parse(p.val.as_ref()))
        .transpose()?;

    let mut exdates: Vec<DateTime<Utc>> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();
    exdates.sort();
    exdates.dedup();

    let data = EventData {
        title: vevent
            .find_prop("SUMMARY")
            .map(|p| unescape_text(p.val.as_ref()))
            .unwrap_or_else(|| "(No title)".to_string()),
        description: vevent.find_prop("DESCRIPTION").map(|p| unescape_text(p.val.as_ref())),
        location: vevent.find_prop("LOCATION").map(|p| unescape_text(p.val.as_ref())),
        start,
        end,
        all_day,
        recurrence,
        exdates,
        timezone,
        last_modified: vevent
            .find_prop("LAST-MODIFIED")
            .and_then(|p| parse_utc_stamp(p.val.as_ref())),
    };
    data.validate()?;

    Ok(Event::new(uid, calendar_id, data))
}

/// Render one event as a standalone VCALENDAR, the payload pushed to
/// writable sources.
pub fn generate_event(event: &Event) -> String {
    let data = &event.data;
    let zone = if data.all_day {
        None
    } else {
        data.timezone
            .as_deref()
            .and_then(|tz| tz.parse::<chrono_tz::Tz>().ok().map(|parsed| (tz, parsed)))
    };

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);
    ics_event.summary(&data.title);
    ics_event.add_property("DTSTAMP", format_utc_stamp(&Utc::now()));
    if let Some(modified) = data.last_modified {
        ics_event.add_property("LAST-MODIFIED", format_utc_stamp(&modified));
    }

    ics_event.append_property(time_property("DTSTART", &data.start, data.all_day, zone));
    ics_event.append_property(time_property("DTEND", &data.end, data.all_day, zone));

    if let Some(description) = &data.description {
        ics_event.description(description);
    }
    if let Some(location) = &data.location {
        ics_event.location(location);
    }

    if let Some(rule) = &data.recurrence {
        ics_event.add_property("RRULE", rule.to_rrule_value());
        for exdate in &data.exdates {
            ics_event.append_multi_property(time_property("EXDATE", exdate, data.all_day, zone));
        }
    }

    let mut calendar = Calendar::new();
    calendar.push(ics_event.done());
    calendar.done().to_string()
}

fn time_property(
    name: &str,
    value: &DateTime<Utc>,
    all_day: bool,
    zone: Option<(&str, chrono_tz::Tz)>,
) -> Property {
    if all_day {
        let mut prop = Property::new(name, value.format("%Y%m%d").to_string());
        prop.append_parameter(ValueType::Date);
        return prop;
    }
    match zone {
        Some((tzid, tz)) => {
            let local = value.with_timezone(&tz).naive_local();
            let mut prop = Property::new(name, local.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            prop
        }
        None => Property::new(name, format_utc_stamp(value)),
    }
}

/// Start of the all-day slot containing `value`.
pub fn all_day_anchor(value: DateTime<Utc>) -> DateTime<Utc> {
    date_to_utc(value.date_naive())
}
