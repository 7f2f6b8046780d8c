//! DATE / DATE-TIME / DURATION value types (RFC 5545 §3.3.4, §3.3.5, §3.3.6).
//!
//! An [`ICalDateTime`] carries enough provenance to regenerate the exact
//! textual form it was parsed from: the UTC instant, the `Z` suffix flag,
//! the DATE flag, and the resolved IANA zone for zoned values.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{DavError, DavResult};

const UTC_DATETIME_FMT: &str = "%Y%m%dT%H%M%S";

/// A date or date-time value with regeneration provenance.
///
/// Invariants (enforced by the constructors):
/// - `is_date` ⇒ the timestamp is midnight UTC of the calendar date and
///   `timezone` is `None`;
/// - `is_utc` ⇒ `timezone` is `None`;
/// - otherwise `timezone` is `Some(zone)`. A floating input (no `Z`, no
///   TZID) is normalized to the caller-supplied default zone with
///   `is_floating` set so generation omits the TZID parameter again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ICalDateTime {
    pub timestamp_utc_ms: i64,
    pub timezone: Option<Tz>,
    pub is_utc: bool,
    pub is_date: bool,
    pub is_floating: bool,
}

impl ICalDateTime {
    /// A DATE-TIME in UTC (`...Z`).
    pub fn utc_ms(timestamp_utc_ms: i64) -> Self {
        Self {
            timestamp_utc_ms,
            timezone: None,
            is_utc: true,
            is_date: false,
            is_floating: false,
        }
    }

    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::utc_ms(dt.timestamp_millis())
    }

    /// A DATE value, anchored to midnight UTC of the calendar date so the
    /// day never drifts across zones.
    pub fn date(year: i32, month: u32, day: u32) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let midnight = date.and_hms_opt(0, 0, 0)?;
        Some(Self {
            timestamp_utc_ms: midnight.and_utc().timestamp_millis(),
            timezone: None,
            is_utc: false,
            is_date: true,
            is_floating: false,
        })
    }

    /// A local DATE-TIME resolved in `zone`.
    pub fn zoned(local: NaiveDateTime, zone: Tz) -> Self {
        let ts = zone
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.timestamp_millis())
            // Inside a DST gap: treat the wall time as if no shift occurred.
            .unwrap_or_else(|| local.and_utc().timestamp_millis());
        Self {
            timestamp_utc_ms: ts,
            timezone: Some(zone),
            is_utc: false,
            is_date: false,
            is_floating: false,
        }
    }

    /// A floating DATE-TIME, normalized into `default_zone` on read.
    pub fn floating(local: NaiveDateTime, default_zone: Tz) -> Self {
        let mut dt = Self::zoned(local, default_zone);
        dt.is_floating = true;
        dt
    }

    pub fn datetime_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp_utc_ms)
            .single()
            .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC)
    }

    /// The calendar date this value falls on, independent of the machine's
    /// zone: UTC date for DATE and UTC values, local date for zoned values.
    pub fn to_local_date(&self) -> NaiveDate {
        match self.timezone {
            Some(tz) => self.datetime_utc().with_timezone(&tz).date_naive(),
            None => self.datetime_utc().date_naive(),
        }
    }

    /// TZID parameter to emit, if any. Floating values stay parameter-less.
    pub fn tzid_param(&self) -> Option<&'static str> {
        if self.is_floating {
            return None;
        }
        self.timezone.map(|tz| tz.name())
    }

    /// The property value text: `YYYYMMDD`, `YYYYMMDDThhmmssZ`, or local
    /// `YYYYMMDDThhmmss`.
    pub fn to_ical_string(&self) -> String {
        if self.is_date {
            return self.datetime_utc().format("%Y%m%d").to_string();
        }
        if self.is_utc {
            return self.datetime_utc().format("%Y%m%dT%H%M%SZ").to_string();
        }
        match self.timezone {
            Some(tz) => self
                .datetime_utc()
                .with_timezone(&tz)
                .format("%Y%m%dT%H%M%S")
                .to_string(),
            None => self.datetime_utc().format("%Y%m%dT%H%M%S").to_string(),
        }
    }
}

impl PartialOrd for ICalDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.timestamp_utc_ms.cmp(&other.timestamp_utc_ms))
    }
}

/// Decode strictness for impossible calendar dates (`20230230`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    Strict,
    #[default]
    Lenient,
}

/// Parse one DATE / DATE-TIME value.
///
/// Three accepted shapes: `YYYYMMDDThhmmssZ` (UTC), `YYYYMMDDThhmmss`
/// (zoned via `tzid`, else floating), `YYYYMMDD` (DATE). The TZID goes
/// through [`normalize_tzid`] first.
pub fn parse_datetime(
    value: &str,
    tzid: Option<&str>,
    default_zone: Tz,
) -> DavResult<ICalDateTime> {
    let value = value.trim();

    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|e| DavError::parse_with_raw(format!("invalid DATE: {e}"), value))?;
        return ICalDateTime::date(date.year(), date.month(), date.day())
            .ok_or_else(|| DavError::parse_with_raw("impossible DATE", value));
    }

    if let Some(stripped) = value.strip_suffix(['Z', 'z']) {
        let naive = NaiveDateTime::parse_from_str(stripped, UTC_DATETIME_FMT)
            .map_err(|e| DavError::parse_with_raw(format!("invalid DATE-TIME: {e}"), value))?;
        return Ok(ICalDateTime::utc_ms(naive.and_utc().timestamp_millis()));
    }

    let naive = NaiveDateTime::parse_from_str(value, UTC_DATETIME_FMT)
        .map_err(|e| DavError::parse_with_raw(format!("invalid DATE-TIME: {e}"), value))?;

    match tzid {
        Some(raw) => Ok(ICalDateTime::zoned(naive, normalize_tzid(raw))),
        None => Ok(ICalDateTime::floating(naive, default_zone)),
    }
}

/// Alias table for the zone names real emitters produce. Unknown names fall
/// back to UTC with a diagnostic rather than failing the whole parse.
const TZID_ALIASES: &[(&str, Tz)] = &[
    ("US/Eastern", chrono_tz::America::New_York),
    ("US/Central", chrono_tz::America::Chicago),
    ("US/Mountain", chrono_tz::America::Denver),
    ("US/Pacific", chrono_tz::America::Los_Angeles),
    ("Eastern Standard Time", chrono_tz::America::New_York),
    ("Eastern Daylight Time", chrono_tz::America::New_York),
    ("Central Standard Time", chrono_tz::America::Chicago),
    ("Mountain Standard Time", chrono_tz::America::Denver),
    ("Pacific Standard Time", chrono_tz::America::Los_Angeles),
    ("Pacific Daylight Time", chrono_tz::America::Los_Angeles),
    ("GMT Standard Time", chrono_tz::Europe::London),
    ("W. Europe Standard Time", chrono_tz::Europe::Berlin),
    ("Romance Standard Time", chrono_tz::Europe::Paris),
    ("GMT", chrono_tz::UTC),
    ("Z", chrono_tz::UTC),
];

/// Resolve a TZID parameter value to an IANA zone.
pub fn normalize_tzid(raw: &str) -> Tz {
    let name = raw.trim().trim_matches('"');

    if let Some((_, tz)) = TZID_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
    {
        return *tz;
    }
    if let Ok(tz) = name.parse::<Tz>() {
        return tz;
    }
    // Some producers prefix a vendor path: "/mozilla.org/20070129_1/Europe/Paris".
    if let Some(idx) = name.rfind('/') {
        let tail_start = name[..idx]
            .rfind('/')
            .map(|i| i + 1)
            .unwrap_or(0);
        if let Ok(tz) = name[tail_start..].parse::<Tz>() {
            return tz;
        }
    }
    tracing::warn!(tzid = name, "unknown timezone, falling back to UTC");
    chrono_tz::UTC
}

/// Parse an RFC 5545 DURATION: `[+-]P[nW | nD][T nH nM nS]`.
///
/// Negative durations are legal (alarm triggers fire before the event).
pub fn parse_duration(value: &str) -> DavResult<TimeDelta> {
    let err = || DavError::parse_with_raw("invalid DURATION", value);
    let mut rest = value.trim();

    let negative = match rest.as_bytes().first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    rest = rest.strip_prefix(['P', 'p']).ok_or_else(err)?;

    let mut seconds: i64 = 0;
    let mut in_time = false;
    let mut saw_component = false;
    let mut digits = String::new();

    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' | 't' => {
                if !digits.is_empty() {
                    return Err(err());
                }
                in_time = true;
            }
            _ => {
                let n: i64 = digits.parse().map_err(|_| err())?;
                digits.clear();
                saw_component = true;
                let unit = match (c.to_ascii_uppercase(), in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return Err(err()),
                };
                seconds = seconds.checked_add(n.checked_mul(unit).ok_or_else(err)?).ok_or_else(err)?;
            }
        }
    }
    if !digits.is_empty() || !saw_component {
        return Err(err());
    }

    let delta = TimeDelta::try_seconds(if negative { -seconds } else { seconds }).ok_or_else(err)?;
    Ok(delta)
}

/// Serialize a duration back to the RFC 5545 shape.
pub fn format_duration(delta: TimeDelta) -> String {
    let mut total = delta.num_seconds();
    let mut out = String::new();
    if total < 0 {
        out.push('-');
        total = -total;
    }
    out.push('P');

    if total == 0 {
        out.push_str("T0S");
        return out;
    }
    if total % (7 * 86_400) == 0 {
        out.push_str(&format!("{}W", total / (7 * 86_400)));
        return out;
    }

    let days = total / 86_400;
    total %= 86_400;
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if total > 0 {
        out.push('T');
        let hours = total / 3_600;
        let minutes = (total % 3_600) / 60;
        let secs = total % 60;
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if secs > 0 {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

/// Format an instant as a UTC DATE-TIME property value (`...Z`).
pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
