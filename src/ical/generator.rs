//! Component tree → VCALENDAR text.
//!
//! Emission rules: CRLF terminators, logical lines folded at 75 octets on
//! character boundaries, TEXT values re-escaped, DATE values without TZID or
//! `Z`, UTC values with `Z`, zoned values with a TZID parameter, floating
//! values with neither. `raw_properties` lines are merged back verbatim so
//! unknown input survives a parse/generate cycle.

use crate::ical::contentline::escape_text;
use crate::ical::datetime::{ICalDateTime, format_duration};
use crate::ical::types::{
    Alarm, AlarmTrigger, Attendee, AttendeeRole, CuType, EventStatus, ICalEvent, ICalFreeBusy,
    ICalJournal, ICalTodo, ICalendar, Organizer, TodoStatus, Transparency,
};
use crate::ical::unfold::fold_line;

/// PRODID stamped on documents that did not carry one.
pub const DEFAULT_PRODID: &str = "-//caldav-sync-rs//EN";

/// Serialize a full document.
pub fn generate_calendar(cal: &ICalendar) -> String {
    let mut out = String::new();
    fold_line("BEGIN:VCALENDAR", &mut out);
    write_prop(
        &mut out,
        "VERSION",
        cal.version.as_deref().unwrap_or("2.0"),
    );
    write_prop(
        &mut out,
        "PRODID",
        cal.prodid.as_deref().unwrap_or(DEFAULT_PRODID),
    );
    if let Some(calscale) = &cal.calscale {
        write_prop(&mut out, "CALSCALE", calscale);
    }
    if let Some(method) = &cal.method {
        write_prop(&mut out, "METHOD", method);
    }
    for tz in &cal.timezones_raw {
        for line in tz.split("\r\n") {
            fold_line(line, &mut out);
        }
    }
    for event in &cal.events {
        write_event(&mut out, event);
    }
    for todo in &cal.todos {
        write_todo(&mut out, todo);
    }
    for journal in &cal.journals {
        write_journal(&mut out, journal);
    }
    for fb in &cal.freebusys {
        write_freebusy(&mut out, fb);
    }
    fold_line("END:VCALENDAR", &mut out);
    out
}

/// Serialize one event wrapped in minimal VCALENDAR framing.
pub fn generate_event(event: &ICalEvent) -> String {
    let cal = ICalendar {
        events: vec![event.clone()],
        ..ICalendar::default()
    };
    generate_calendar(&cal)
}

fn write_prop(out: &mut String, name: &str, value: &str) {
    fold_line(&format!("{name}:{value}"), out);
}

fn write_text_prop(out: &mut String, name: &str, value: &str) {
    fold_line(&format!("{name}:{}", escape_text(value)), out);
}

/// Emit a datetime property with the parameters its provenance requires.
fn write_datetime(out: &mut String, name: &str, dt: &ICalDateTime) {
    let mut line = String::from(name);
    if dt.is_date {
        line.push_str(";VALUE=DATE");
    } else if let Some(tzid) = dt.tzid_param() {
        line.push_str(";TZID=");
        line.push_str(tzid);
    }
    line.push(':');
    line.push_str(&dt.to_ical_string());
    fold_line(&line, out);
}

fn write_datetime_list(out: &mut String, name: &str, values: &[ICalDateTime]) {
    for dt in values {
        write_datetime(out, name, dt);
    }
}

fn write_organizer(out: &mut String, organizer: &Organizer) {
    let mut line = String::from("ORGANIZER");
    if let Some(cn) = &organizer.common_name {
        line.push_str(";CN=");
        push_param_value(&mut line, cn);
    }
    if let Some(sent_by) = &organizer.sent_by {
        line.push_str(";SENT-BY=\"mailto:");
        line.push_str(sent_by);
        line.push('"');
    }
    line.push_str(":mailto:");
    line.push_str(&organizer.email);
    fold_line(&line, out);
}

fn write_attendee(out: &mut String, attendee: &Attendee) {
    let mut line = String::from("ATTENDEE");
    if let Some(cn) = &attendee.common_name {
        line.push_str(";CN=");
        push_param_value(&mut line, cn);
    }
    if attendee.cutype != CuType::Individual {
        line.push_str(";CUTYPE=");
        line.push_str(attendee.cutype.as_ical());
    }
    if attendee.role != AttendeeRole::ReqParticipant {
        line.push_str(";ROLE=");
        line.push_str(attendee.role.as_ical());
    }
    line.push_str(";PARTSTAT=");
    line.push_str(attendee.part_stat.as_ical());
    if attendee.rsvp {
        line.push_str(";RSVP=TRUE");
    }
    push_mailto_list_param(&mut line, "DELEGATED-TO", &attendee.delegated_to);
    push_mailto_list_param(&mut line, "DELEGATED-FROM", &attendee.delegated_from);
    if let Some(agent) = attendee.schedule_agent {
        line.push_str(";SCHEDULE-AGENT=");
        line.push_str(agent.as_ical());
    }
    if !attendee.schedule_status.is_empty() {
        line.push_str(";SCHEDULE-STATUS=\"");
        line.push_str(&attendee.schedule_status.join(","));
        line.push('"');
    }
    if attendee.schedule_force_send {
        line.push_str(";SCHEDULE-FORCE-SEND=REQUEST");
    }
    line.push_str(":mailto:");
    line.push_str(&attendee.email);
    fold_line(&line, out);
}

fn push_param_value(line: &mut String, value: &str) {
    if value.contains([';', ':', ',']) {
        line.push('"');
        line.push_str(value);
        line.push('"');
    } else {
        line.push_str(value);
    }
}

fn push_mailto_list_param(line: &mut String, name: &str, addresses: &[String]) {
    if addresses.is_empty() {
        return;
    }
    line.push(';');
    line.push_str(name);
    line.push('=');
    let quoted: Vec<String> = addresses
        .iter()
        .map(|a| format!("\"mailto:{a}\""))
        .collect();
    line.push_str(&quoted.join(","));
}

fn write_alarm(out: &mut String, alarm: &Alarm) {
    fold_line("BEGIN:VALARM", out);
    write_prop(out, "ACTION", alarm.action.as_ical());
    match &alarm.trigger {
        AlarmTrigger::Relative {
            offset,
            related_to_end,
        } => {
            let mut line = String::from("TRIGGER");
            if *related_to_end {
                line.push_str(";RELATED=END");
            }
            line.push(':');
            line.push_str(&format_duration(*offset));
            fold_line(&line, out);
        }
        AlarmTrigger::Absolute(dt) => {
            fold_line(
                &format!("TRIGGER;VALUE=DATE-TIME:{}", dt.to_ical_string()),
                out,
            );
        }
    }
    if let Some(description) = &alarm.description {
        write_text_prop(out, "DESCRIPTION", description);
    }
    if let Some(summary) = &alarm.summary {
        write_text_prop(out, "SUMMARY", summary);
    }
    if let Some(repeat) = alarm.repeat {
        write_prop(out, "REPEAT", &repeat.to_string());
    }
    if let Some(duration) = alarm.duration {
        write_prop(out, "DURATION", &format_duration(duration));
    }
    fold_line("END:VALARM", out);
}

fn write_categories(out: &mut String, categories: &[String]) {
    if categories.is_empty() {
        return;
    }
    let escaped: Vec<String> = categories.iter().map(|c| escape_text(c)).collect();
    fold_line(&format!("CATEGORIES:{}", escaped.join(",")), out);
}

fn write_raw_properties(out: &mut String, raw: &[(String, String)]) {
    for (key, value) in raw {
        fold_line(&format!("{key}:{value}"), out);
    }
}

fn write_event(out: &mut String, event: &ICalEvent) {
    fold_line("BEGIN:VEVENT", out);
    write_prop(out, "UID", &event.uid);
    if let Some(dtstamp) = &event.dtstamp {
        write_datetime(out, "DTSTAMP", dtstamp);
    }
    write_datetime(out, "DTSTART", &event.dt_start);
    if let Some(dt_end) = &event.dt_end {
        write_datetime(out, "DTEND", dt_end);
    }
    if let Some(duration) = event.duration {
        write_prop(out, "DURATION", &format_duration(duration));
    }
    if let Some(summary) = &event.summary {
        write_text_prop(out, "SUMMARY", summary);
    }
    if let Some(description) = &event.description {
        write_text_prop(out, "DESCRIPTION", description);
    }
    if let Some(location) = &event.location {
        write_text_prop(out, "LOCATION", location);
    }
    if let Some(url) = &event.url {
        write_prop(out, "URL", url);
    }
    if event.status != EventStatus::Confirmed {
        write_prop(out, "STATUS", event.status.as_ical());
    }
    if event.transparency != Transparency::Opaque {
        write_prop(out, "TRANSP", event.transparency.as_ical());
    }
    if let Some(class) = event.classification {
        write_prop(out, "CLASS", class.as_ical());
    }
    if event.sequence > 0 {
        write_prop(out, "SEQUENCE", &event.sequence.to_string());
    }
    if let Some(priority) = event.priority {
        write_prop(out, "PRIORITY", &priority.to_string());
    }
    if let Some(rrule) = &event.rrule {
        write_prop(out, "RRULE", &rrule.to_ical_string());
    }
    write_datetime_list(out, "EXDATE", &event.exdates);
    write_datetime_list(out, "RDATE", &event.rdates);
    if let Some(rid) = &event.recurrence_id {
        write_datetime(out, "RECURRENCE-ID", rid);
    }
    if let Some(organizer) = &event.organizer {
        write_organizer(out, organizer);
    }
    for attendee in &event.attendees {
        write_attendee(out, attendee);
    }
    write_categories(out, &event.categories);
    if let Some(created) = &event.created {
        write_datetime(out, "CREATED", created);
    }
    if let Some(last_modified) = &event.last_modified {
        write_datetime(out, "LAST-MODIFIED", last_modified);
    }
    write_raw_properties(out, &event.raw_properties);
    for alarm in &event.alarms {
        write_alarm(out, alarm);
    }
    fold_line("END:VEVENT", out);
}

fn write_todo(out: &mut String, todo: &ICalTodo) {
    fold_line("BEGIN:VTODO", out);
    write_prop(out, "UID", &todo.uid);
    if let Some(dtstamp) = &todo.dtstamp {
        write_datetime(out, "DTSTAMP", dtstamp);
    }
    if let Some(dt_start) = &todo.dt_start {
        write_datetime(out, "DTSTART", dt_start);
    }
    if let Some(due) = &todo.due {
        write_datetime(out, "DUE", due);
    }
    if let Some(completed) = &todo.completed {
        write_datetime(out, "COMPLETED", completed);
    }
    if let Some(summary) = &todo.summary {
        write_text_prop(out, "SUMMARY", summary);
    }
    if let Some(description) = &todo.description {
        write_text_prop(out, "DESCRIPTION", description);
    }
    if todo.status != TodoStatus::NeedsAction {
        write_prop(out, "STATUS", todo.status.as_ical());
    }
    if let Some(pct) = todo.percent_complete {
        write_prop(out, "PERCENT-COMPLETE", &pct.to_string());
    }
    if let Some(priority) = todo.priority {
        write_prop(out, "PRIORITY", &priority.to_string());
    }
    if todo.sequence > 0 {
        write_prop(out, "SEQUENCE", &todo.sequence.to_string());
    }
    if let Some(rrule) = &todo.rrule {
        write_prop(out, "RRULE", &rrule.to_ical_string());
    }
    if let Some(rid) = &todo.recurrence_id {
        write_datetime(out, "RECURRENCE-ID", rid);
    }
    write_categories(out, &todo.categories);
    if let Some(last_modified) = &todo.last_modified {
        write_datetime(out, "LAST-MODIFIED", last_modified);
    }
    write_raw_properties(out, &todo.raw_properties);
    for alarm in &todo.alarms {
        write_alarm(out, alarm);
    }
    fold_line("END:VTODO", out);
}

fn write_journal(out: &mut String, journal: &ICalJournal) {
    fold_line("BEGIN:VJOURNAL", out);
    write_prop(out, "UID", &journal.uid);
    if let Some(dtstamp) = &journal.dtstamp {
        write_datetime(out, "DTSTAMP", dtstamp);
    }
    if let Some(dt_start) = &journal.dt_start {
        write_datetime(out, "DTSTART", dt_start);
    }
    if let Some(summary) = &journal.summary {
        write_text_prop(out, "SUMMARY", summary);
    }
    if let Some(description) = &journal.description {
        write_text_prop(out, "DESCRIPTION", description);
    }
    if journal.sequence > 0 {
        write_prop(out, "SEQUENCE", &journal.sequence.to_string());
    }
    if let Some(rid) = &journal.recurrence_id {
        write_datetime(out, "RECURRENCE-ID", rid);
    }
    write_categories(out, &journal.categories);
    if let Some(last_modified) = &journal.last_modified {
        write_datetime(out, "LAST-MODIFIED", last_modified);
    }
    write_raw_properties(out, &journal.raw_properties);
    fold_line("END:VJOURNAL", out);
}

fn write_freebusy(out: &mut String, fb: &ICalFreeBusy) {
    fold_line("BEGIN:VFREEBUSY", out);
    if let Some(uid) = &fb.uid {
        write_prop(out, "UID", uid);
    }
    if let Some(dtstamp) = &fb.dtstamp {
        write_datetime(out, "DTSTAMP", dtstamp);
    }
    if let Some(dt_start) = &fb.dt_start {
        write_datetime(out, "DTSTART", dt_start);
    }
    if let Some(dt_end) = &fb.dt_end {
        write_datetime(out, "DTEND", dt_end);
    }
    if let Some(organizer) = &fb.organizer {
        write_organizer(out, organizer);
    }
    for attendee in &fb.attendees {
        write_attendee(out, attendee);
    }
    for period in &fb.periods {
        let mut line = String::from("FREEBUSY");
        if let Some(fb_type) = &period.fb_type {
            line.push_str(";FBTYPE=");
            line.push_str(fb_type);
        }
        line.push(':');
        line.push_str(&period.periods.join(","));
        fold_line(&line, out);
    }
    write_raw_properties(out, &fb.raw_properties);
    fold_line("END:VFREEBUSY", out);
}
