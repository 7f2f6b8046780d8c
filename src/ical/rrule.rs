//! Parsed recurrence rules (RFC 5545 §3.3.10).
//!
//! The core validates structure and regenerates text; it never expands
//! occurrences.

use chrono_tz::Tz;

use crate::error::{DavError, DavResult};
use crate::ical::datetime::{ICalDateTime, parse_datetime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Some(Self::Secondly),
            "MINUTELY" => Some(Self::Minutely),
            "HOURLY" => Some(Self::Hourly),
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleWeekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl RuleWeekday {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MO" => Some(Self::Monday),
            "TU" => Some(Self::Tuesday),
            "WE" => Some(Self::Wednesday),
            "TH" => Some(Self::Thursday),
            "FR" => Some(Self::Friday),
            "SA" => Some(Self::Saturday),
            "SU" => Some(Self::Sunday),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
            Self::Sunday => "SU",
        }
    }
}

/// A BYDAY element: optional ordinal (`-1SU` = last Sunday) plus weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: RuleWeekday,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<ICalDateTime>,
    pub by_second: Vec<u8>,
    pub by_minute: Vec<u8>,
    pub by_hour: Vec<u8>,
    pub by_day: Vec<WeekdayNum>,
    pub by_month_day: Vec<i8>,
    pub by_year_day: Vec<i16>,
    pub by_week_no: Vec<i8>,
    pub by_month: Vec<u8>,
    pub by_set_pos: Vec<i32>,
    pub wkst: Option<RuleWeekday>,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            count: None,
            until: None,
            by_second: Vec::new(),
            by_minute: Vec::new(),
            by_hour: Vec::new(),
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_month: Vec::new(),
            by_set_pos: Vec::new(),
            wkst: None,
        }
    }

    /// Structural sanity per RFC 5545 §3.3.10. Does not expand anything.
    pub fn validate(&self) -> DavResult<()> {
        if self.interval == 0 {
            return Err(DavError::parse("RRULE INTERVAL must be >= 1"));
        }
        if self.count.is_some() && self.until.is_some() {
            return Err(DavError::parse("RRULE cannot carry both COUNT and UNTIL"));
        }
        if !self.by_week_no.is_empty() && self.freq != Frequency::Yearly {
            return Err(DavError::parse("BYWEEKNO is only valid with FREQ=YEARLY"));
        }
        if !self.by_year_day.is_empty()
            && matches!(
                self.freq,
                Frequency::Daily | Frequency::Weekly | Frequency::Monthly
            )
        {
            return Err(DavError::parse(
                "BYYEARDAY is not valid with DAILY, WEEKLY or MONTHLY",
            ));
        }
        if !self.by_month_day.is_empty() && self.freq == Frequency::Weekly {
            return Err(DavError::parse("BYMONTHDAY is not valid with FREQ=WEEKLY"));
        }
        if self
            .by_day
            .iter()
            .any(|d| d.ordinal.is_some())
            && !matches!(self.freq, Frequency::Monthly | Frequency::Yearly)
        {
            return Err(DavError::parse(
                "ordinal BYDAY values require FREQ=MONTHLY or FREQ=YEARLY",
            ));
        }
        for s in &self.by_second {
            if *s > 60 {
                return Err(DavError::parse("BYSECOND out of range"));
            }
        }
        for m in &self.by_minute {
            if *m > 59 {
                return Err(DavError::parse("BYMINUTE out of range"));
            }
        }
        for h in &self.by_hour {
            if *h > 23 {
                return Err(DavError::parse("BYHOUR out of range"));
            }
        }
        for d in &self.by_month_day {
            if *d == 0 || *d < -31 || *d > 31 {
                return Err(DavError::parse("BYMONTHDAY out of range"));
            }
        }
        for m in &self.by_month {
            if *m == 0 || *m > 12 {
                return Err(DavError::parse("BYMONTH out of range"));
            }
        }
        Ok(())
    }

    /// Canonical text form, FREQ first, parts in RFC declaration order.
    pub fn to_ical_string(&self) -> String {
        let mut out = format!("FREQ={}", self.freq.as_ical());
        if let Some(until) = &self.until {
            out.push_str(";UNTIL=");
            out.push_str(&until.to_ical_string());
        }
        if let Some(count) = self.count {
            out.push_str(&format!(";COUNT={count}"));
        }
        if self.interval != 1 {
            out.push_str(&format!(";INTERVAL={}", self.interval));
        }
        push_list(&mut out, "BYSECOND", &self.by_second);
        push_list(&mut out, "BYMINUTE", &self.by_minute);
        push_list(&mut out, "BYHOUR", &self.by_hour);
        if !self.by_day.is_empty() {
            let days: Vec<String> = self
                .by_day
                .iter()
                .map(|d| match d.ordinal {
                    Some(ord) => format!("{ord}{}", d.weekday.as_ical()),
                    None => d.weekday.as_ical().to_string(),
                })
                .collect();
            out.push_str(";BYDAY=");
            out.push_str(&days.join(","));
        }
        push_list(&mut out, "BYMONTHDAY", &self.by_month_day);
        push_list(&mut out, "BYYEARDAY", &self.by_year_day);
        push_list(&mut out, "BYWEEKNO", &self.by_week_no);
        push_list(&mut out, "BYMONTH", &self.by_month);
        push_list(&mut out, "BYSETPOS", &self.by_set_pos);
        if let Some(wkst) = self.wkst {
            out.push_str(";WKST=");
            out.push_str(wkst.as_ical());
        }
        out
    }
}

fn push_list<T: std::fmt::Display>(out: &mut String, name: &str, values: &[T]) {
    if values.is_empty() {
        return;
    }
    out.push(';');
    out.push_str(name);
    out.push('=');
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    out.push_str(&parts.join(","));
}

/// Parse an RRULE property value.
pub fn parse_rrule(value: &str, default_zone: Tz) -> DavResult<RecurrenceRule> {
    let mut freq = None;
    let mut rule = RecurrenceRule::new(Frequency::Daily);

    for part in value.split(';').filter(|p| !p.trim().is_empty()) {
        let (key, val) = part
            .split_once('=')
            .ok_or_else(|| DavError::parse_with_raw("RRULE part without '='", value))?;
        let key = key.trim().to_ascii_uppercase();
        let val = val.trim();
        match key.as_str() {
            "FREQ" => {
                freq = Some(
                    Frequency::from_ical(val)
                        .ok_or_else(|| DavError::parse_with_raw("unknown FREQ", value))?,
                );
            }
            "INTERVAL" => {
                rule.interval = val
                    .parse()
                    .map_err(|_| DavError::parse_with_raw("invalid INTERVAL", value))?;
            }
            "COUNT" => {
                rule.count = Some(
                    val.parse()
                        .map_err(|_| DavError::parse_with_raw("invalid COUNT", value))?,
                );
            }
            "UNTIL" => {
                rule.until = Some(parse_datetime(val, None, default_zone)?);
            }
            "BYSECOND" => rule.by_second = parse_num_list(val, value)?,
            "BYMINUTE" => rule.by_minute = parse_num_list(val, value)?,
            "BYHOUR" => rule.by_hour = parse_num_list(val, value)?,
            "BYDAY" => {
                for day in val.split(',') {
                    rule.by_day.push(parse_weekday_num(day, value)?);
                }
            }
            "BYMONTHDAY" => rule.by_month_day = parse_num_list(val, value)?,
            "BYYEARDAY" => rule.by_year_day = parse_num_list(val, value)?,
            "BYWEEKNO" => rule.by_week_no = parse_num_list(val, value)?,
            "BYMONTH" => rule.by_month = parse_num_list(val, value)?,
            "BYSETPOS" => rule.by_set_pos = parse_num_list(val, value)?,
            "WKST" => {
                rule.wkst = Some(
                    RuleWeekday::from_ical(val)
                        .ok_or_else(|| DavError::parse_with_raw("invalid WKST", value))?,
                );
            }
            // Unknown rule parts (RSCALE extensions etc.) are tolerated.
            _ => tracing::debug!(part = key.as_str(), "ignoring unknown RRULE part"),
        }
    }

    rule.freq = freq.ok_or_else(|| DavError::parse_with_raw("RRULE without FREQ", value))?;
    rule.validate()?;
    Ok(rule)
}

fn parse_num_list<T: std::str::FromStr>(val: &str, raw: &str) -> DavResult<Vec<T>> {
    val.split(',')
        .map(|n| {
            n.trim()
                .parse::<T>()
                .map_err(|_| DavError::parse_with_raw("invalid numeric list in RRULE", raw))
        })
        .collect()
}

fn parse_weekday_num(part: &str, raw: &str) -> DavResult<WeekdayNum> {
    let part = part.trim();
    let split = part.len().saturating_sub(2);
    let (ord, day) = part.split_at(split);
    let weekday = RuleWeekday::from_ical(day)
        .ok_or_else(|| DavError::parse_with_raw("invalid BYDAY weekday", raw))?;
    let ordinal = if ord.is_empty() {
        None
    } else {
        Some(
            ord.parse::<i8>()
                .map_err(|_| DavError::parse_with_raw("invalid BYDAY ordinal", raw))?,
        )
    };
    Ok(WeekdayNum { ordinal, weekday })
}
