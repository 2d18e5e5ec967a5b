// file: src/models/recurrence.rs
use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_rrule(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

/// Structured recurrence rule. Every field is explicit; loosely-typed rule
/// text is converted through [`RecurrenceRule::parse`] and rejected there if
/// it uses anything this type cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub by_day: Vec<Weekday>,
    #[serde(default)]
    pub by_month_day: Vec<i8>,
    #[serde(default)]
    pub by_month: Vec<u8>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
        }
    }

    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    pub fn weekly() -> Self {
        Self::new(Frequency::Weekly)
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn on_days(mut self, days: &[Weekday]) -> Self {
        self.by_day = days.to_vec();
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.interval == 0 {
            return Err(AppError::invalid_recurrence("INTERVAL must be at least 1"));
        }
        if self.count == Some(0) {
            return Err(AppError::invalid_recurrence("COUNT must be at least 1"));
        }
        if self.count.is_some() && self.until.is_some() {
            return Err(AppError::invalid_recurrence("COUNT and UNTIL cannot both be set"));
        }
        if let Some(day) = self.by_month_day.iter().find(|d| **d == 0 || d.abs() > 31) {
            return Err(AppError::invalid_recurrence(format!("BYMONTHDAY out of range: {}", day)));
        }
        if let Some(month) = self.by_month.iter().find(|m| **m == 0 || **m > 12) {
            return Err(AppError::invalid_recurrence(format!("BYMONTH out of range: {}", month)));
        }
        Ok(())
    }

    /// Parse the value of an RRULE property, e.g. `FREQ=DAILY;COUNT=4;BYDAY=MO,TU`.
    pub fn parse(value: &str) -> AppResult<Self> {
        let mut frequency = None;
        let mut rule = Self::daily();

        for part in value.trim().trim_start_matches("RRULE:").split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, val) = part
                .split_once('=')
                .ok_or_else(|| AppError::invalid_recurrence(format!("malformed rule part '{}'", part)))?;

            match key.to_ascii_uppercase().as_str() {
                "FREQ" => {
                    frequency = Some(match val.to_ascii_uppercase().as_str() {
                        "DAILY" => Frequency::Daily,
                        "WEEKLY" => Frequency::Weekly,
                        "MONTHLY" => Frequency::Monthly,
                        "YEARLY" => Frequency::Yearly,
                        other => {
                            return Err(AppError::invalid_recurrence(format!(
                                "unsupported frequency '{}'",
                                other
                            )))
                        }
                    })
                }
                "INTERVAL" => rule.interval = parse_number(key, val)?,
                "COUNT" => rule.count = Some(parse_number(key, val)?),
                "UNTIL" => rule.until = Some(parse_until(val)?),
                "BYDAY" => {
                    rule.by_day = val
                        .split(',')
                        .map(parse_weekday)
                        .collect::<AppResult<Vec<_>>>()?
                }
                "BYMONTHDAY" => {
                    rule.by_month_day = val
                        .split(',')
                        .map(|v| parse_number(key, v))
                        .collect::<AppResult<Vec<_>>>()?
                }
                "BYMONTH" => {
                    rule.by_month = val
                        .split(',')
                        .map(|v| parse_number(key, v))
                        .collect::<AppResult<Vec<_>>>()?
                }
                // Week start only changes results for BYWEEKNO rules, which are rejected.
                "WKST" => {}
                other => {
                    return Err(AppError::invalid_recurrence(format!(
                        "unsupported rule part '{}'",
                        other
                    )))
                }
            }
        }

        rule.frequency = frequency.ok_or_else(|| AppError::invalid_recurrence("missing FREQ"))?;
        rule.validate()?;
        Ok(rule)
    }

    /// Render as the value of an RRULE property.
    pub fn to_rrule_value(&self) -> String {
        let mut parts = vec![format!("FREQ={}", self.frequency.as_rrule())];
        if self.interval != 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={}", count));
        }
        if let Some(until) = self.until {
            parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
        }
        if !self.by_day.is_empty() {
            let days: Vec<&str> = self.by_day.iter().map(weekday_code).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }
        if !self.by_month_day.is_empty() {
            let days: Vec<String> = self.by_month_day.iter().map(|d| d.to_string()).collect();
            parts.push(format!("BYMONTHDAY={}", days.join(",")));
        }
        if !self.by_month.is_empty() {
            let months: Vec<String> = self.by_month.iter().map(|m| m.to_string()).collect();
            parts.push(format!("BYMONTH={}", months.join(",")));
        }
        parts.join(";")
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, val: &str) -> AppResult<T> {
    val.trim()
        .parse::<T>()
        .map_err(|_| AppError::invalid_recurrence(format!("{} is not a valid number: '{}'", key, val)))
}

fn parse_until(val: &str) -> AppResult<DateTime<Utc>> {
    let val = val.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(val.trim_end_matches('Z'), "%Y%m%dT%H%M%S") {
        return Ok(dt.and_utc());
    }
    // A date-only UNTIL is inclusive of the whole day.
    if let Some(dt) = NaiveDate::parse_from_str(val, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
    {
        return Ok(dt.and_utc());
    }
    Err(AppError::invalid_recurrence(format!("invalid UNTIL '{}'", val)))
}

fn parse_weekday(code: &str) -> AppResult<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        other => Err(AppError::invalid_recurrence(format!("unsupported BYDAY value '{}'", other))),
    }
}

fn weekday_code(day: &Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}
