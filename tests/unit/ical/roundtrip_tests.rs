use caldav_sync_rs::ical::{generate_calendar, generate_event, parse_calendar};

const RICH_EVENT: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:rich-1@example.com\r\n\
DTSTAMP:20240101T090000Z\r\n\
DTSTART;TZID=Europe/Paris:20240610T093000\r\n\
DTEND;TZID=Europe/Paris:20240610T103000\r\n\
SUMMARY:Quarterly review\\, part 1\r\n\
DESCRIPTION:agenda:\\n- numbers\\n- risks\r\n\
LOCATION:Room 4\\; west wing\r\n\
URL:https://meet.example.com/q1\r\n\
STATUS:TENTATIVE\r\n\
TRANSP:TRANSPARENT\r\n\
CLASS:CONFIDENTIAL\r\n\
SEQUENCE:7\r\n\
PRIORITY:5\r\n\
RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE\r\n\
EXDATE;TZID=Europe/Paris:20240624T093000\r\n\
EXDATE;TZID=Europe/Paris:20240708T093000\r\n\
ORGANIZER;CN=Jane Doe:mailto:jane@example.com\r\n\
ATTENDEE;CN=Bob;PARTSTAT=ACCEPTED;RSVP=TRUE:mailto:bob@example.com\r\n\
ATTENDEE;CN=Carol;CUTYPE=ROOM;PARTSTAT=NEEDS-ACTION:mailto:room4@example.com\r\n\
CATEGORIES:WORK,FINANCE\r\n\
CREATED:20240101T080000Z\r\n\
LAST-MODIFIED:20240102T080000Z\r\n\
X-CUSTOM-TAG:opaque value\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
TRIGGER:-PT30M\r\n\
DESCRIPTION:Reminder\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

#[test]
fn parse_generate_parse_is_identity_on_events() {
    let first = parse_calendar(RICH_EVENT).expect("first parse");
    let regenerated = generate_calendar(&first);
    let second = parse_calendar(&regenerated).expect("second parse");
    assert_eq!(first.events, second.events);
}

#[test]
fn generated_output_uses_crlf_and_75_octet_lines() {
    let cal = parse_calendar(RICH_EVENT).expect("parses");
    let text = generate_calendar(&cal);

    assert!(text.ends_with("\r\n"));
    assert!(!text.replace("\r\n", "").contains('\r'));
    for line in text.split("\r\n") {
        assert!(line.len() <= 75, "physical line exceeds 75 octets: {line:?}");
    }
    assert!(text.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(text.contains("VERSION:2.0\r\n"));
    assert!(text.contains("PRODID:"));
}

#[test]
fn date_values_regenerate_without_time_or_zone_markers() {
    let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:d\r\nDTSTART;VALUE=DATE:20260123\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    let cal = parse_calendar(ics).expect("parses");
    let value = cal.events[0].dt_start.to_ical_string();
    assert!(!value.contains('T'));
    assert!(!value.contains('Z'));

    let text = generate_calendar(&cal);
    assert!(text.contains("DTSTART;VALUE=DATE:20260123\r\n"));
}

#[test]
fn utc_values_regenerate_with_z_suffix() {
    let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:z\r\nDTSTART:20231215T140000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    let cal = parse_calendar(ics).expect("parses");
    assert!(cal.events[0].dt_start.to_ical_string().ends_with('Z'));
    let text = generate_calendar(&cal);
    assert!(text.contains("DTSTART:20231215T140000Z\r\n"));
}

#[test]
fn zoned_values_regenerate_with_tzid_parameter() {
    let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:p\r\nDTSTART;TZID=Europe/Paris:20240610T093000\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    let cal = parse_calendar(ics).expect("parses");
    let text = generate_calendar(&cal);
    assert!(text.contains("DTSTART;TZID=Europe/Paris:20240610T093000\r\n"));
}

#[test]
fn unknown_properties_are_merged_back_verbatim() {
    let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:x\r\nDTSTART:20240101T000000Z\r\nX-APPLE-STRUCTURED-LOCATION;VALUE=URI:geo:48.85,2.35\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    let cal = parse_calendar(ics).expect("parses");
    let text = generate_calendar(&cal);
    assert!(text.contains("X-APPLE-STRUCTURED-LOCATION;VALUE=URI:geo:48.85,2.35\r\n"));

    let second = parse_calendar(&text).expect("reparses");
    assert_eq!(cal.events, second.events);
}

#[test]
fn vtimezone_blocks_round_trip_verbatim() {
    let ics = "BEGIN:VCALENDAR\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/Paris\r\n\
BEGIN:DAYLIGHT\r\n\
DTSTART:19810329T020000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0200\r\n\
END:DAYLIGHT\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:tzrt\r\n\
DTSTART;TZID=Europe/Paris:20240610T093000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    let cal = parse_calendar(ics).expect("parses");
    let text = generate_calendar(&cal);
    assert!(text.contains("BEGIN:VTIMEZONE\r\nTZID:Europe/Paris\r\n"));
    assert!(text.contains("RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU"));

    let second = parse_calendar(&text).expect("reparses");
    assert_eq!(second.timezones_raw, cal.timezones_raw);
    assert_eq!(second.events, cal.events);
}

#[test]
fn single_event_wrapper_emits_minimal_framing() {
    let cal = parse_calendar(RICH_EVENT).expect("parses");
    let text = generate_event(&cal.events[0]);
    assert!(text.starts_with("BEGIN:VCALENDAR\r\n"));
    assert_eq!(text.matches("BEGIN:VEVENT").count(), 1);
    let reparsed = parse_calendar(&text).expect("reparses");
    assert_eq!(reparsed.events[0], cal.events[0]);
}

#[test]
fn duration_only_event_round_trips() {
    let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:dur\r\nDTSTART:20240101T100000Z\r\nDURATION:PT1H30M\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    let cal = parse_calendar(ics).expect("parses");
    assert_eq!(cal.events[0].duration.unwrap().num_minutes(), 90);
    let text = generate_calendar(&cal);
    assert!(text.contains("DURATION:PT1H30M\r\n"));
    assert_eq!(parse_calendar(&text).expect("reparses").events, cal.events);
}
