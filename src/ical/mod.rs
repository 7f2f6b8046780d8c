pub mod contentline;
pub mod datetime;
pub mod generator;
pub mod itip;
pub mod parser;
pub mod rrule;
pub mod types;
pub mod unfold;

pub use datetime::{DecodeMode, ICalDateTime, normalize_tzid, parse_datetime, parse_duration};
pub use generator::{generate_calendar, generate_event};
pub use itip::ITipBuilder;
pub use parser::{ParseOptions, parse_calendar, parse_calendar_with, parse_single_event};
pub use rrule::{Frequency, RecurrenceRule, RuleWeekday, WeekdayNum, parse_rrule};
pub use types::{
    Alarm, AlarmAction, AlarmTrigger, Attendee, AttendeeRole, Classification, CuType, EventStatus,
    ICalEvent, ICalFreeBusy, ICalJournal, ICalTodo, ICalendar, Organizer, PartStat, ScheduleAgent,
    TodoStatus, Transparency, import_id, parse_import_id,
};
