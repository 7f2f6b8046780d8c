//! iTIP scheduling message construction (RFC 5546).
//!
//! Each method derives a single VEVENT from a source event, applies that
//! method's sequence-number and attendee-projection rules, and serializes it
//! under a top-level `METHOD` property. VALARMs never travel in scheduling
//! messages.

use crate::error::{DavError, DavResult};
use crate::ical::generator::generate_calendar;
use crate::ical::types::{Attendee, EventStatus, ICalEvent, ICalendar, PartStat};

/// Builder for outgoing scheduling messages.
#[derive(Debug, Clone, Default)]
pub struct ITipBuilder {
    prodid: Option<String>,
}

impl ITipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prodid(prodid: impl Into<String>) -> Self {
        Self {
            prodid: Some(prodid.into()),
        }
    }

    /// Invite or update: every attendee is reset to NEEDS-ACTION with RSVP
    /// set, and the sequence is bumped only when this is an update of a
    /// previously sent invitation.
    pub fn request(
        &self,
        event: &ICalEvent,
        attendees: &[Attendee],
        is_update: bool,
    ) -> DavResult<String> {
        let mut derived = self.strip(event);
        if is_update {
            derived.sequence = derived.sequence.saturating_add(1);
        }
        derived.status = EventStatus::Confirmed;
        derived.attendees = attendees
            .iter()
            .map(|a| {
                let mut a = a.clone();
                a.part_stat = PartStat::NeedsAction;
                a.rsvp = true;
                a
            })
            .collect();
        Ok(self.render("REQUEST", derived))
    }

    /// Attendee response: mirrors the request's sequence and carries exactly
    /// one ATTENDEE line, the responder with their chosen participation
    /// status.
    pub fn reply(&self, event: &ICalEvent, responder: &Attendee) -> DavResult<String> {
        let mut derived = self.strip(event);
        derived.attendees = vec![responder.clone()];
        Ok(self.render("REPLY", derived))
    }

    /// Cancellation. With `removed_attendees` empty the whole event is
    /// cancelled (STATUS:CANCELLED, all attendees listed); otherwise only
    /// the named subset is being uninvited and the event status is left
    /// alone.
    pub fn cancel(
        &self,
        event: &ICalEvent,
        removed_attendees: &[Attendee],
    ) -> DavResult<String> {
        let mut derived = self.strip(event);
        if removed_attendees.is_empty() {
            derived.status = EventStatus::Cancelled;
        } else {
            derived.attendees = removed_attendees.to_vec();
        }
        Ok(self.render("CANCEL", derived))
    }

    /// Add one occurrence to a recurring event. The occurrence must carry a
    /// RECURRENCE-ID; the master's UID and SEQUENCE are preserved and any
    /// RRULE is stripped from the transmitted instance.
    pub fn add(&self, occurrence: &ICalEvent) -> DavResult<String> {
        if occurrence.recurrence_id.is_none() {
            return Err(DavError::parse("ADD requires a RECURRENCE-ID"));
        }
        let mut derived = self.strip(occurrence);
        derived.rrule = None;
        derived.attendees = occurrence
            .attendees
            .iter()
            .map(|a| {
                let mut a = a.clone();
                a.part_stat = PartStat::NeedsAction;
                a.rsvp = true;
                a
            })
            .collect();
        Ok(self.render("ADD", derived))
    }

    /// Counter-proposal: the proposer suggests changed event details. The
    /// sequence mirrors the request; only the proposer is listed.
    pub fn counter(&self, event: &ICalEvent, proposer: &Attendee) -> DavResult<String> {
        let mut derived = self.strip(event);
        derived.attendees = vec![proposer.clone()];
        Ok(self.render("COUNTER", derived))
    }

    /// Organizer's rejection of a counter-proposal.
    pub fn decline_counter(&self, event: &ICalEvent, decliner: &Attendee) -> DavResult<String> {
        let mut derived = self.strip(event);
        derived.attendees = vec![decliner.clone()];
        Ok(self.render("DECLINECOUNTER", derived))
    }

    /// Attendee's request for the current state of the event.
    pub fn refresh(&self, event: &ICalEvent, requester: &Attendee) -> DavResult<String> {
        let mut derived = self.strip(event);
        derived.attendees = vec![requester.clone()];
        Ok(self.render("REFRESH", derived))
    }

    fn strip(&self, event: &ICalEvent) -> ICalEvent {
        let mut derived = event.clone();
        derived.alarms.clear();
        derived
    }

    fn render(&self, method: &str, event: ICalEvent) -> String {
        let cal = ICalendar {
            method: Some(method.to_string()),
            prodid: self.prodid.clone(),
            events: vec![event],
            ..ICalendar::default()
        };
        generate_calendar(&cal)
    }
}
