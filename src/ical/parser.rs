//! VCALENDAR text → component tree.
//!
//! A single pass over unfolded content lines drives a BEGIN/END state
//! machine. Property application is scoped to the innermost open component,
//! which is what keeps a VTIMEZONE's RRULE from ever leaking into the
//! enclosing event. The parser is lenient: mismatched or missing END lines
//! close whatever is still open, and only a document with no VCALENDAR
//! framing at all is rejected outright.

use chrono_tz::Tz;

use crate::error::{DavError, DavResult};
use crate::ical::contentline::{
    ContentLine, parse_content_line, split_on_unescaped_commas, unescape_text,
};
use crate::ical::datetime::{DecodeMode, ICalDateTime, parse_datetime, parse_duration};
use crate::ical::rrule::parse_rrule;
use crate::ical::types::{
    Alarm, AlarmAction, AlarmTrigger, Attendee, AttendeeRole, Classification, CuType, EventStatus,
    FreeBusyPeriod, ICalEvent, ICalFreeBusy, ICalJournal, ICalTodo, ICalendar, Organizer,
    PartStat, ScheduleAgent, TodoStatus, Transparency,
};

/// Knobs for the decoding pass.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Zone that floating DATE-TIME values are normalized into.
    pub default_zone: Tz,
    /// Whether impossible calendar dates fail the parse or fall back to
    /// `raw_properties`.
    pub mode: DecodeMode,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_zone: chrono_tz::UTC,
            mode: DecodeMode::Lenient,
        }
    }
}

/// Parse a complete iCalendar document with default options.
pub fn parse_calendar(input: &str) -> DavResult<ICalendar> {
    parse_calendar_with(input, &ParseOptions::default())
}

/// Parse a complete iCalendar document.
pub fn parse_calendar_with(input: &str, opts: &ParseOptions) -> DavResult<ICalendar> {
    let lines = crate::ical::unfold::unfold_lines(input);

    let mut cal = WorkingCalendar::default();
    let mut saw_vcalendar = false;
    let mut stack: Vec<Component> = Vec::new();

    for line_text in &lines {
        let Ok(line) = parse_content_line(line_text) else {
            tracing::debug!(line = line_text.as_str(), "skipping malformed content line");
            continue;
        };

        match line.name.as_str() {
            "BEGIN" => {
                let kind = line.value.trim().to_ascii_uppercase();
                if kind == "VCALENDAR" {
                    saw_vcalendar = true;
                    continue;
                }
                // Timezone interiors are captured verbatim, nested
                // STANDARD/DAYLIGHT framing included; nothing inside a
                // VTIMEZONE opens a real component.
                if in_timezone(&stack) {
                    if let Some(tz) = innermost_timezone(&mut stack) {
                        tz.push(line_text.clone());
                    }
                    stack.push(Component::TimezoneSub(kind));
                } else {
                    stack.push(Component::open(&kind, line_text));
                }
            }
            "END" => {
                let kind = line.value.trim().to_ascii_uppercase();
                if kind == "VCALENDAR" {
                    while let Some(component) = stack.pop() {
                        close_component(component, &mut stack, &mut cal);
                    }
                    continue;
                }
                if let Some(tz) = innermost_timezone(&mut stack) {
                    tz.push(line_text.clone());
                }
                // Close up to and including the matching component; an END
                // with no matching BEGIN is dropped on the floor.
                if let Some(pos) = stack.iter().rposition(|c| c.matches(&kind)) {
                    while stack.len() > pos {
                        let component = stack.pop().expect("stack is non-empty");
                        close_component(component, &mut stack, &mut cal);
                    }
                }
            }
            _ => {
                if in_timezone(&stack) {
                    if let Some(tz) = innermost_timezone(&mut stack) {
                        tz.push(line_text.clone());
                    }
                } else {
                    match stack.last_mut() {
                        Some(Component::Lines { lines, .. }) => lines.push(line),
                        Some(_) => {}
                        None => {
                            if saw_vcalendar {
                                apply_calendar_property(&mut cal, &line);
                            }
                        }
                    }
                }
            }
        }
    }

    // EOF closes everything still open.
    while let Some(component) = stack.pop() {
        close_component(component, &mut stack, &mut cal);
    }

    if !saw_vcalendar {
        return Err(DavError::parse("no VCALENDAR framing found"));
    }
    finalize_components(cal, opts)
}

/// Parse a document and return its first VEVENT, the common case for a
/// single-resource `calendar-data` payload.
pub fn parse_single_event(input: &str) -> DavResult<ICalEvent> {
    let cal = parse_calendar(input)?;
    cal.events
        .into_iter()
        .next()
        .ok_or_else(|| DavError::parse("document contains no VEVENT"))
}

fn in_timezone(stack: &[Component]) -> bool {
    stack
        .iter()
        .any(|c| matches!(c, Component::Timezone { .. }))
}

fn innermost_timezone(stack: &mut [Component]) -> Option<&mut Vec<String>> {
    stack.iter_mut().rev().find_map(|c| match c {
        Component::Timezone { raw } => Some(raw),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentKind {
    Event,
    Todo,
    Journal,
    FreeBusy,
    Alarm,
}

impl ComponentKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Journal => "VJOURNAL",
            Self::FreeBusy => "VFREEBUSY",
            Self::Alarm => "VALARM",
        }
    }
}

enum Component {
    Lines {
        kind: ComponentKind,
        lines: Vec<ContentLine>,
        alarms: Vec<Vec<ContentLine>>,
    },
    Timezone { raw: Vec<String> },
    TimezoneSub(String),
    Unknown(String),
}

impl Component {
    fn open(kind: &str, begin_line: &str) -> Self {
        let component_kind = match kind {
            "VEVENT" => Some(ComponentKind::Event),
            "VTODO" => Some(ComponentKind::Todo),
            "VJOURNAL" => Some(ComponentKind::Journal),
            "VFREEBUSY" => Some(ComponentKind::FreeBusy),
            "VALARM" => Some(ComponentKind::Alarm),
            _ => None,
        };
        match component_kind {
            Some(kind) => Self::Lines {
                kind,
                lines: Vec::new(),
                alarms: Vec::new(),
            },
            None if kind == "VTIMEZONE" => Self::Timezone {
                raw: vec![begin_line.to_string()],
            },
            None => Self::Unknown(kind.to_string()),
        }
    }

    fn matches(&self, end_kind: &str) -> bool {
        match self {
            Self::Lines { kind, .. } => kind.tag() == end_kind,
            Self::Timezone { .. } => end_kind == "VTIMEZONE",
            Self::TimezoneSub(kind) => kind == end_kind,
            Self::Unknown(kind) => kind == end_kind,
        }
    }
}

/// Move a finished component into the draft (or, for alarms, into the
/// parent's pending list). Decoding happens later in one pass.
fn close_component(component: Component, stack: &mut [Component], cal: &mut WorkingCalendar) {
    match component {
        Component::Lines {
            kind: ComponentKind::Alarm,
            lines,
            ..
        } => {
            if let Some(Component::Lines { alarms, .. }) = stack.last_mut() {
                alarms.push(lines);
            }
            // An alarm outside an event or todo has no anchor; dropped.
        }
        Component::Lines { kind, lines, alarms } => {
            cal.pending.push(PendingComponent { kind, lines, alarms });
        }
        Component::Timezone { mut raw } => {
            if raw
                .last()
                .map(|l| !l.trim().eq_ignore_ascii_case("END:VTIMEZONE"))
                .unwrap_or(false)
            {
                raw.push("END:VTIMEZONE".to_string());
            }
            cal.timezones_raw.push(raw.join("\r\n"));
        }
        Component::TimezoneSub(_) | Component::Unknown(_) => {}
    }
}

struct PendingComponent {
    kind: ComponentKind,
    lines: Vec<ContentLine>,
    alarms: Vec<Vec<ContentLine>>,
}

// The working document during the structural pass. `pending` holds closed
// components awaiting property decoding.
#[derive(Default)]
struct WorkingCalendar {
    prodid: Option<String>,
    version: Option<String>,
    method: Option<String>,
    calscale: Option<String>,
    timezones_raw: Vec<String>,
    pending: Vec<PendingComponent>,
}

fn apply_calendar_property(cal: &mut WorkingCalendar, line: &ContentLine) {
    match line.name.as_str() {
        "PRODID" => cal.prodid = Some(line.value.clone()),
        "VERSION" => cal.version = Some(line.value.clone()),
        "METHOD" => cal.method = Some(line.value.trim().to_ascii_uppercase()),
        "CALSCALE" => cal.calscale = Some(line.value.clone()),
        _ => {}
    }
}

fn finalize_components(draft: WorkingCalendar, opts: &ParseOptions) -> DavResult<ICalendar> {
    let mut cal = ICalendar {
        prodid: draft.prodid,
        version: draft.version,
        method: draft.method,
        calscale: draft.calscale,
        timezones_raw: draft.timezones_raw,
        ..ICalendar::default()
    };

    for pending in draft.pending {
        let alarms: Vec<Alarm> = pending
            .alarms
            .iter()
            .filter_map(|lines| finalize_alarm(lines, opts))
            .collect();
        match pending.kind {
            ComponentKind::Event => match finalize_event(&pending.lines, alarms, opts) {
                Ok(event) => cal.events.push(event),
                Err(e) => match opts.mode {
                    DecodeMode::Strict => return Err(e),
                    DecodeMode::Lenient => {
                        tracing::warn!(error = %e, "dropping undecodable VEVENT");
                    }
                },
            },
            ComponentKind::Todo => match finalize_todo(&pending.lines, alarms, opts) {
                Ok(todo) => cal.todos.push(todo),
                Err(e) => match opts.mode {
                    DecodeMode::Strict => return Err(e),
                    DecodeMode::Lenient => {
                        tracing::warn!(error = %e, "dropping undecodable VTODO");
                    }
                },
            },
            ComponentKind::Journal => match finalize_journal(&pending.lines, opts) {
                Ok(journal) => cal.journals.push(journal),
                Err(e) => match opts.mode {
                    DecodeMode::Strict => return Err(e),
                    DecodeMode::Lenient => {
                        tracing::warn!(error = %e, "dropping undecodable VJOURNAL");
                    }
                },
            },
            ComponentKind::FreeBusy => cal.freebusys.push(finalize_freebusy(&pending.lines, opts)),
            ComponentKind::Alarm => {}
        }
    }
    Ok(cal)
}

/// Reassemble the `NAME;PARAMS` prefix of a line for `raw_properties`.
fn raw_key(line: &ContentLine) -> String {
    let mut key = line.name_raw.clone();
    for (k, v) in &line.params {
        key.push(';');
        key.push_str(k);
        if v.contains([';', ':', ',']) {
            key.push_str("=\"");
            key.push_str(v);
            key.push('"');
        } else if !v.is_empty() {
            key.push('=');
            key.push_str(v);
        }
    }
    key
}

/// Decode a datetime property, falling back to `raw_properties` in lenient
/// mode when the value is impossible.
fn decode_datetime_prop(
    line: &ContentLine,
    opts: &ParseOptions,
    raw: &mut Vec<(String, String)>,
) -> DavResult<Option<ICalDateTime>> {
    match parse_datetime(&line.value, line.param("TZID"), opts.default_zone) {
        Ok(dt) => Ok(Some(dt)),
        Err(e) => match opts.mode {
            DecodeMode::Strict => Err(e),
            DecodeMode::Lenient => {
                tracing::debug!(value = line.value.as_str(), "keeping undecodable datetime raw");
                raw.push((raw_key(line), line.value.clone()));
                Ok(None)
            }
        },
    }
}

fn decode_datetime_list(
    line: &ContentLine,
    opts: &ParseOptions,
    raw: &mut Vec<(String, String)>,
    out: &mut Vec<ICalDateTime>,
) -> DavResult<()> {
    // RDATE may carry VALUE=PERIOD; periods are preserved raw, not modeled.
    if line
        .param("VALUE")
        .map(|v| v.eq_ignore_ascii_case("PERIOD"))
        .unwrap_or(false)
    {
        raw.push((raw_key(line), line.value.clone()));
        return Ok(());
    }
    for part in line.value.split(',').filter(|p| !p.trim().is_empty()) {
        match parse_datetime(part, line.param("TZID"), opts.default_zone) {
            Ok(dt) => out.push(dt),
            Err(e) => match opts.mode {
                DecodeMode::Strict => return Err(e),
                DecodeMode::Lenient => raw.push((raw_key(line), part.trim().to_string())),
            },
        }
    }
    Ok(())
}

fn parse_cal_address(line: &ContentLine) -> String {
    let v = line.value.trim();
    if v.len() >= 7 && v[..7].eq_ignore_ascii_case("mailto:") {
        v[7..].to_string()
    } else {
        v.to_string()
    }
}

fn parse_organizer(line: &ContentLine) -> Organizer {
    Organizer {
        email: parse_cal_address(line),
        common_name: line.param("CN").map(|v| v.to_string()),
        sent_by: line
            .param("SENT-BY")
            .map(|v| v.trim_start_matches("mailto:").to_string()),
    }
}

fn parse_attendee(line: &ContentLine) -> Attendee {
    let mut attendee = Attendee::new(parse_cal_address(line));
    attendee.common_name = line.param("CN").map(|v| v.to_string());
    if let Some(ps) = line.param("PARTSTAT").and_then(PartStat::from_ical) {
        attendee.part_stat = ps;
    }
    if let Some(role) = line.param("ROLE").and_then(AttendeeRole::from_ical) {
        attendee.role = role;
    }
    attendee.rsvp = line
        .param("RSVP")
        .map(|v| v.eq_ignore_ascii_case("TRUE"))
        .unwrap_or(false);
    if let Some(ct) = line.param("CUTYPE").and_then(CuType::from_ical) {
        attendee.cutype = ct;
    }
    attendee.delegated_to = mailto_list(line.param("DELEGATED-TO"));
    attendee.delegated_from = mailto_list(line.param("DELEGATED-FROM"));
    attendee.schedule_agent = line.param("SCHEDULE-AGENT").and_then(ScheduleAgent::from_ical);
    attendee.schedule_status = line
        .param("SCHEDULE-STATUS")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    attendee.schedule_force_send = line
        .param("SCHEDULE-FORCE-SEND")
        .map(|v| v.eq_ignore_ascii_case("REQUEST") || v.eq_ignore_ascii_case("REPLY"))
        .unwrap_or(false);
    attendee
}

fn mailto_list(param: Option<&str>) -> Vec<String> {
    param
        .map(|v| {
            v.split(',')
                .map(|s| {
                    s.trim()
                        .trim_matches('"')
                        .trim_start_matches("mailto:")
                        .to_string()
                })
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn lenient_or(
    opts: &ParseOptions,
    err: DavError,
    line: &ContentLine,
    raw: &mut Vec<(String, String)>,
) -> DavResult<()> {
    match opts.mode {
        DecodeMode::Strict => Err(err),
        DecodeMode::Lenient => {
            raw.push((raw_key(line), line.value.clone()));
            Ok(())
        }
    }
}

fn finalize_event(
    lines: &[ContentLine],
    alarms: Vec<Alarm>,
    opts: &ParseOptions,
) -> DavResult<ICalEvent> {
    let mut uid = None;
    let mut dt_start = None;
    let mut event = ICalEvent::new(String::new(), ICalDateTime::utc_ms(0));
    event.alarms = alarms;

    for line in lines {
        match line.name.as_str() {
            "UID" => uid = Some(line.value.trim().to_string()),
            "SUMMARY" => event.summary = Some(unescape_text(&line.value)),
            "DESCRIPTION" => event.description = Some(unescape_text(&line.value)),
            "LOCATION" => event.location = Some(unescape_text(&line.value)),
            "URL" => event.url = Some(line.value.trim().to_string()),
            "DTSTART" => dt_start = decode_datetime_prop(line, opts, &mut event.raw_properties)?,
            "DTEND" => event.dt_end = decode_datetime_prop(line, opts, &mut event.raw_properties)?,
            "DURATION" => match parse_duration(&line.value) {
                Ok(d) => event.duration = Some(d),
                Err(e) => lenient_or(opts, e, line, &mut event.raw_properties)?,
            },
            "STATUS" => match EventStatus::from_ical(&line.value) {
                Some(status) => event.status = status,
                None => event.raw_properties.push((raw_key(line), line.value.clone())),
            },
            "TRANSP" => {
                if let Some(t) = Transparency::from_ical(&line.value) {
                    event.transparency = t;
                }
            }
            "CLASS" => event.classification = Classification::from_ical(&line.value),
            "SEQUENCE" => event.sequence = line.value.trim().parse().unwrap_or(0),
            "PRIORITY" => {
                event.priority = line.value.trim().parse::<u8>().ok().filter(|p| *p <= 9);
            }
            "RRULE" => match parse_rrule(&line.value, opts.default_zone) {
                Ok(rule) => event.rrule = Some(rule),
                Err(e) => lenient_or(opts, e, line, &mut event.raw_properties)?,
            },
            "EXDATE" => {
                decode_datetime_list(line, opts, &mut event.raw_properties, &mut event.exdates)?;
            }
            "RDATE" => {
                decode_datetime_list(line, opts, &mut event.raw_properties, &mut event.rdates)?;
            }
            "RECURRENCE-ID" => {
                event.recurrence_id = decode_datetime_prop(line, opts, &mut event.raw_properties)?;
            }
            "ORGANIZER" => event.organizer = Some(parse_organizer(line)),
            "ATTENDEE" => event.attendees.push(parse_attendee(line)),
            "CATEGORIES" => event
                .categories
                .extend(split_on_unescaped_commas(&line.value)),
            "DTSTAMP" => event.dtstamp = decode_datetime_prop(line, opts, &mut event.raw_properties)?,
            "CREATED" => event.created = decode_datetime_prop(line, opts, &mut event.raw_properties)?,
            "LAST-MODIFIED" => {
                event.last_modified = decode_datetime_prop(line, opts, &mut event.raw_properties)?;
            }
            _ => event.raw_properties.push((raw_key(line), line.value.clone())),
        }
    }

    event.uid = uid
        .filter(|u| !u.is_empty())
        .ok_or_else(|| DavError::parse("VEVENT without UID"))?;
    event.dt_start = dt_start.ok_or_else(|| DavError::parse("VEVENT without DTSTART"))?;
    event.is_all_day = event.dt_start.is_date;
    Ok(event)
}

fn finalize_todo(
    lines: &[ContentLine],
    alarms: Vec<Alarm>,
    opts: &ParseOptions,
) -> DavResult<ICalTodo> {
    let mut uid = None;
    let mut todo = ICalTodo {
        uid: String::new(),
        summary: None,
        description: None,
        dt_start: None,
        due: None,
        completed: None,
        status: TodoStatus::default(),
        percent_complete: None,
        priority: None,
        sequence: 0,
        rrule: None,
        recurrence_id: None,
        categories: Vec::new(),
        alarms,
        dtstamp: None,
        last_modified: None,
        raw_properties: Vec::new(),
    };

    for line in lines {
        match line.name.as_str() {
            "UID" => uid = Some(line.value.trim().to_string()),
            "SUMMARY" => todo.summary = Some(unescape_text(&line.value)),
            "DESCRIPTION" => todo.description = Some(unescape_text(&line.value)),
            "DTSTART" => todo.dt_start = decode_datetime_prop(line, opts, &mut todo.raw_properties)?,
            "DUE" => todo.due = decode_datetime_prop(line, opts, &mut todo.raw_properties)?,
            "COMPLETED" => {
                todo.completed = decode_datetime_prop(line, opts, &mut todo.raw_properties)?;
            }
            "STATUS" => {
                if let Some(status) = TodoStatus::from_ical(&line.value) {
                    todo.status = status;
                }
            }
            "PERCENT-COMPLETE" => {
                todo.percent_complete = line.value.trim().parse::<u8>().ok().filter(|p| *p <= 100);
            }
            "PRIORITY" => todo.priority = line.value.trim().parse::<u8>().ok().filter(|p| *p <= 9),
            "SEQUENCE" => todo.sequence = line.value.trim().parse().unwrap_or(0),
            "RRULE" => match parse_rrule(&line.value, opts.default_zone) {
                Ok(rule) => todo.rrule = Some(rule),
                Err(e) => lenient_or(opts, e, line, &mut todo.raw_properties)?,
            },
            "RECURRENCE-ID" => {
                todo.recurrence_id = decode_datetime_prop(line, opts, &mut todo.raw_properties)?;
            }
            "CATEGORIES" => todo.categories.extend(split_on_unescaped_commas(&line.value)),
            "DTSTAMP" => todo.dtstamp = decode_datetime_prop(line, opts, &mut todo.raw_properties)?,
            "LAST-MODIFIED" => {
                todo.last_modified = decode_datetime_prop(line, opts, &mut todo.raw_properties)?;
            }
            _ => todo.raw_properties.push((raw_key(line), line.value.clone())),
        }
    }

    todo.uid = uid
        .filter(|u| !u.is_empty())
        .ok_or_else(|| DavError::parse("VTODO without UID"))?;
    Ok(todo)
}

fn finalize_journal(lines: &[ContentLine], opts: &ParseOptions) -> DavResult<ICalJournal> {
    let mut uid = None;
    let mut journal = ICalJournal {
        uid: String::new(),
        summary: None,
        description: None,
        dt_start: None,
        sequence: 0,
        recurrence_id: None,
        categories: Vec::new(),
        dtstamp: None,
        last_modified: None,
        raw_properties: Vec::new(),
    };

    for line in lines {
        match line.name.as_str() {
            "UID" => uid = Some(line.value.trim().to_string()),
            "SUMMARY" => journal.summary = Some(unescape_text(&line.value)),
            "DESCRIPTION" => journal.description = Some(unescape_text(&line.value)),
            "DTSTART" => {
                journal.dt_start = decode_datetime_prop(line, opts, &mut journal.raw_properties)?;
            }
            "SEQUENCE" => journal.sequence = line.value.trim().parse().unwrap_or(0),
            "RECURRENCE-ID" => {
                journal.recurrence_id =
                    decode_datetime_prop(line, opts, &mut journal.raw_properties)?;
            }
            "CATEGORIES" => journal
                .categories
                .extend(split_on_unescaped_commas(&line.value)),
            "DTSTAMP" => {
                journal.dtstamp = decode_datetime_prop(line, opts, &mut journal.raw_properties)?;
            }
            "LAST-MODIFIED" => {
                journal.last_modified =
                    decode_datetime_prop(line, opts, &mut journal.raw_properties)?;
            }
            _ => journal
                .raw_properties
                .push((raw_key(line), line.value.clone())),
        }
    }

    journal.uid = uid
        .filter(|u| !u.is_empty())
        .ok_or_else(|| DavError::parse("VJOURNAL without UID"))?;
    Ok(journal)
}

fn finalize_freebusy(lines: &[ContentLine], opts: &ParseOptions) -> ICalFreeBusy {
    let mut fb = ICalFreeBusy {
        uid: None,
        dt_start: None,
        dt_end: None,
        organizer: None,
        attendees: Vec::new(),
        periods: Vec::new(),
        dtstamp: None,
        raw_properties: Vec::new(),
    };

    for line in lines {
        match line.name.as_str() {
            "UID" => fb.uid = Some(line.value.trim().to_string()),
            "DTSTART" => {
                fb.dt_start = decode_datetime_prop(line, opts, &mut fb.raw_properties)
                    .unwrap_or(None);
            }
            "DTEND" => {
                fb.dt_end = decode_datetime_prop(line, opts, &mut fb.raw_properties)
                    .unwrap_or(None);
            }
            "ORGANIZER" => fb.organizer = Some(parse_organizer(line)),
            "ATTENDEE" => fb.attendees.push(parse_attendee(line)),
            "FREEBUSY" => fb.periods.push(FreeBusyPeriod {
                fb_type: line.param("FBTYPE").map(|v| v.to_string()),
                periods: line.value.split(',').map(|p| p.trim().to_string()).collect(),
            }),
            "DTSTAMP" => {
                fb.dtstamp = decode_datetime_prop(line, opts, &mut fb.raw_properties)
                    .unwrap_or(None);
            }
            _ => fb.raw_properties.push((raw_key(line), line.value.clone())),
        }
    }
    fb
}

fn finalize_alarm(lines: &[ContentLine], opts: &ParseOptions) -> Option<Alarm> {
    let mut action = AlarmAction::default();
    let mut trigger = None;
    let mut description = None;
    let mut summary = None;
    let mut repeat = None;
    let mut duration = None;

    for line in lines {
        match line.name.as_str() {
            "ACTION" => {
                if let Some(a) = AlarmAction::from_ical(&line.value) {
                    action = a;
                }
            }
            "TRIGGER" => {
                let absolute = line
                    .param("VALUE")
                    .map(|v| v.eq_ignore_ascii_case("DATE-TIME"))
                    .unwrap_or(false)
                    || line.value.trim().ends_with(['Z', 'z']);
                trigger = if absolute {
                    parse_datetime(&line.value, None, opts.default_zone)
                        .ok()
                        .map(AlarmTrigger::Absolute)
                } else {
                    parse_duration(&line.value)
                        .ok()
                        .map(|offset| AlarmTrigger::Relative {
                            offset,
                            related_to_end: line
                                .param("RELATED")
                                .map(|r| r.eq_ignore_ascii_case("END"))
                                .unwrap_or(false),
                        })
                };
            }
            "DESCRIPTION" => description = Some(unescape_text(&line.value)),
            "SUMMARY" => summary = Some(unescape_text(&line.value)),
            "REPEAT" => repeat = line.value.trim().parse().ok(),
            "DURATION" => duration = parse_duration(&line.value).ok(),
            _ => {}
        }
    }

    Some(Alarm {
        action,
        trigger: trigger?,
        description,
        summary,
        repeat,
        duration,
    })
}
