//! Value types for iCalendar components.
//!
//! All records are plain `pub`-field structs. They are immutable by
//! convention: edits produce a new value (see [`ICalEvent::bump_sequence`]).

use chrono::TimeDelta;

use crate::ical::datetime::ICalDateTime;
use crate::ical::rrule::RecurrenceRule;

/// Separator between a UID and its RECURRENCE-ID inside an import id.
pub const RECID_SEPARATOR: &str = ":RECID:";

/// Compose the flat store key for a master event or a modified occurrence.
pub fn import_id(uid: &str, recurrence_id: Option<&ICalDateTime>) -> String {
    match recurrence_id {
        None => uid.to_string(),
        Some(rid) => format!("{uid}{RECID_SEPARATOR}{}", rid.to_ical_string()),
    }
}

/// Split an import id back into `(uid, recurrence_id_text)`.
pub fn parse_import_id(id: &str) -> (&str, Option<&str>) {
    match id.split_once(RECID_SEPARATOR) {
        Some((uid, rid)) => (uid, Some(rid)),
        None => (id, None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CONFIRMED" => Some(Self::Confirmed),
            "TENTATIVE" => Some(Self::Tentative),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Tentative => "TENTATIVE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transparency {
    #[default]
    Opaque,
    Transparent,
}

impl Transparency {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPAQUE" => Some(Self::Opaque),
            "TRANSPARENT" => Some(Self::Transparent),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Opaque => "OPAQUE",
            Self::Transparent => "TRANSPARENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Public,
    Private,
    Confidential,
}

impl Classification {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PUBLIC" => Some(Self::Public),
            "PRIVATE" => Some(Self::Private),
            "CONFIDENTIAL" => Some(Self::Confidential),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
            Self::Confidential => "CONFIDENTIAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartStat {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
}

impl PartStat {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NEEDS-ACTION" => Some(Self::NeedsAction),
            "ACCEPTED" => Some(Self::Accepted),
            "DECLINED" => Some(Self::Declined),
            "TENTATIVE" => Some(Self::Tentative),
            "DELEGATED" => Some(Self::Delegated),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::NeedsAction => "NEEDS-ACTION",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Tentative => "TENTATIVE",
            Self::Delegated => "DELEGATED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttendeeRole {
    Chair,
    #[default]
    ReqParticipant,
    OptParticipant,
    NonParticipant,
}

impl AttendeeRole {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CHAIR" => Some(Self::Chair),
            "REQ-PARTICIPANT" => Some(Self::ReqParticipant),
            "OPT-PARTICIPANT" => Some(Self::OptParticipant),
            "NON-PARTICIPANT" => Some(Self::NonParticipant),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Chair => "CHAIR",
            Self::ReqParticipant => "REQ-PARTICIPANT",
            Self::OptParticipant => "OPT-PARTICIPANT",
            Self::NonParticipant => "NON-PARTICIPANT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CuType {
    #[default]
    Individual,
    Group,
    Resource,
    Room,
    Unknown,
}

impl CuType {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INDIVIDUAL" => Some(Self::Individual),
            "GROUP" => Some(Self::Group),
            "RESOURCE" => Some(Self::Resource),
            "ROOM" => Some(Self::Room),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Individual => "INDIVIDUAL",
            Self::Group => "GROUP",
            Self::Resource => "RESOURCE",
            Self::Room => "ROOM",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// RFC 6638 SCHEDULE-AGENT parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleAgent {
    #[default]
    Server,
    Client,
    None,
}

impl ScheduleAgent {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SERVER" => Some(Self::Server),
            "CLIENT" => Some(Self::Client),
            "NONE" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Server => "SERVER",
            Self::Client => "CLIENT",
            Self::None => "NONE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attendee {
    pub email: String,
    pub common_name: Option<String>,
    pub part_stat: PartStat,
    pub role: AttendeeRole,
    pub rsvp: bool,
    pub cutype: CuType,
    pub delegated_to: Vec<String>,
    pub delegated_from: Vec<String>,
    pub schedule_agent: Option<ScheduleAgent>,
    pub schedule_status: Vec<String>,
    pub schedule_force_send: bool,
}

impl Attendee {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Organizer {
    pub email: String,
    pub common_name: Option<String>,
    pub sent_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmAction {
    #[default]
    Display,
    Audio,
    Email,
}

impl AlarmAction {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DISPLAY" => Some(Self::Display),
            "AUDIO" => Some(Self::Audio),
            "EMAIL" => Some(Self::Email),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Display => "DISPLAY",
            Self::Audio => "AUDIO",
            Self::Email => "EMAIL",
        }
    }
}

/// VALARM trigger: a signed offset (negative = before the anchor) or an
/// absolute instant.
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmTrigger {
    Relative {
        offset: TimeDelta,
        related_to_end: bool,
    },
    Absolute(ICalDateTime),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub action: AlarmAction,
    pub trigger: AlarmTrigger,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub repeat: Option<u32>,
    pub duration: Option<TimeDelta>,
}

/// A single VEVENT.
#[derive(Debug, Clone, PartialEq)]
pub struct ICalEvent {
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub dt_start: ICalDateTime,
    pub dt_end: Option<ICalDateTime>,
    pub duration: Option<TimeDelta>,
    pub is_all_day: bool,
    pub status: EventStatus,
    pub transparency: Transparency,
    pub classification: Option<Classification>,
    pub sequence: u32,
    pub priority: Option<u8>,
    pub rrule: Option<RecurrenceRule>,
    pub exdates: Vec<ICalDateTime>,
    pub rdates: Vec<ICalDateTime>,
    pub recurrence_id: Option<ICalDateTime>,
    pub organizer: Option<Organizer>,
    pub attendees: Vec<Attendee>,
    pub alarms: Vec<Alarm>,
    pub categories: Vec<String>,
    pub dtstamp: Option<ICalDateTime>,
    pub created: Option<ICalDateTime>,
    pub last_modified: Option<ICalDateTime>,
    /// Properties the codec does not model, in document order, as raw
    /// `NAME;PARAMS:VALUE` lines. Merged back verbatim on generation.
    pub raw_properties: Vec<(String, String)>,
}

impl ICalEvent {
    pub fn new(uid: impl Into<String>, dt_start: ICalDateTime) -> Self {
        Self {
            uid: uid.into(),
            summary: None,
            description: None,
            location: None,
            url: None,
            dt_start,
            dt_end: None,
            duration: None,
            is_all_day: dt_start.is_date,
            status: EventStatus::default(),
            transparency: Transparency::default(),
            classification: None,
            sequence: 0,
            priority: None,
            rrule: None,
            exdates: Vec::new(),
            rdates: Vec::new(),
            recurrence_id: None,
            organizer: None,
            attendees: Vec::new(),
            alarms: Vec::new(),
            categories: Vec::new(),
            dtstamp: None,
            created: None,
            last_modified: None,
            raw_properties: Vec::new(),
        }
    }

    /// Store key: `uid`, or `uid:RECID:<datetime>` for a modified occurrence.
    pub fn import_id(&self) -> String {
        import_id(&self.uid, self.recurrence_id.as_ref())
    }

    /// A copy representing the next revision of this event.
    pub fn bump_sequence(&self) -> Self {
        let mut next = self.clone();
        next.sequence = self.sequence.saturating_add(1);
        next
    }
}

/// VTODO statuses differ from VEVENT ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TodoStatus {
    #[default]
    NeedsAction,
    Completed,
    InProcess,
    Cancelled,
}

impl TodoStatus {
    pub fn from_ical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NEEDS-ACTION" => Some(Self::NeedsAction),
            "COMPLETED" => Some(Self::Completed),
            "IN-PROCESS" => Some(Self::InProcess),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_ical(self) -> &'static str {
        match self {
            Self::NeedsAction => "NEEDS-ACTION",
            Self::Completed => "COMPLETED",
            Self::InProcess => "IN-PROCESS",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ICalTodo {
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub dt_start: Option<ICalDateTime>,
    pub due: Option<ICalDateTime>,
    pub completed: Option<ICalDateTime>,
    pub status: TodoStatus,
    pub percent_complete: Option<u8>,
    pub priority: Option<u8>,
    pub sequence: u32,
    pub rrule: Option<RecurrenceRule>,
    pub recurrence_id: Option<ICalDateTime>,
    pub categories: Vec<String>,
    pub alarms: Vec<Alarm>,
    pub dtstamp: Option<ICalDateTime>,
    pub last_modified: Option<ICalDateTime>,
    pub raw_properties: Vec<(String, String)>,
}

impl ICalTodo {
    pub fn import_id(&self) -> String {
        import_id(&self.uid, self.recurrence_id.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ICalJournal {
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub dt_start: Option<ICalDateTime>,
    pub sequence: u32,
    pub recurrence_id: Option<ICalDateTime>,
    pub categories: Vec<String>,
    pub dtstamp: Option<ICalDateTime>,
    pub last_modified: Option<ICalDateTime>,
    pub raw_properties: Vec<(String, String)>,
}

/// A FREEBUSY period, preserved as the raw `start/end-or-duration` text.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeBusyPeriod {
    pub fb_type: Option<String>,
    pub periods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ICalFreeBusy {
    pub uid: Option<String>,
    pub dt_start: Option<ICalDateTime>,
    pub dt_end: Option<ICalDateTime>,
    pub organizer: Option<Organizer>,
    pub attendees: Vec<Attendee>,
    pub periods: Vec<FreeBusyPeriod>,
    pub dtstamp: Option<ICalDateTime>,
    pub raw_properties: Vec<(String, String)>,
}

/// A parsed VCALENDAR document.
///
/// VTIMEZONE blocks are carried as raw text: the core scopes their
/// properties away from events but never interprets them (zones resolve by
/// name against the IANA database).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ICalendar {
    pub prodid: Option<String>,
    pub version: Option<String>,
    pub method: Option<String>,
    pub calscale: Option<String>,
    pub events: Vec<ICalEvent>,
    pub todos: Vec<ICalTodo>,
    pub journals: Vec<ICalJournal>,
    pub freebusys: Vec<ICalFreeBusy>,
    pub timezones_raw: Vec<String>,
}

impl ICalendar {
    /// All events plus their modified occurrences, keyed for a flat store.
    pub fn events_by_import_id(&self) -> Vec<(String, &ICalEvent)> {
        self.events
            .iter()
            .map(|e| (e.import_id(), e))
            .collect()
    }
}
