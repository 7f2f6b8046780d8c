//! Streaming parser for WebDAV `207 Multi-Status` documents.
//!
//! Built on quick-xml events with an element-name stack. Namespace prefixes
//! vary wildly across servers (`D:`, `d:`, default `xmlns="DAV:"`), so
//! elements are matched by local name with any prefix. Property values are
//! buffered per propstat and merged into the response only when that
//! propstat's status is 2xx; property *presence* is recorded regardless.

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::error::{DavError, DavResult};
use crate::webdav::types::{DavResponse, MultiStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementName {
    Multistatus,
    Response,
    Propstat,
    Prop,
    Href,
    Status,
    Displayname,
    Getetag,
    Resourcetype,
    Collection,
    Calendar,
    Principal,
    SupportedCalendarComponentSet,
    Comp,
    CalendarData,
    CalendarDescription,
    CalendarColor,
    Getctag,
    SyncToken,
    CalendarHomeSet,
    CurrentUserPrincipal,
    ScheduleInbox,
    ScheduleOutbox,
    CurrentUserPrivilegeSet,
    Privilege,
    Write,
    Owner,
    Getcontenttype,
    Getlastmodified,
    Other,
}

/// Strip any namespace prefix and return the local name.
fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    }
}

pub fn element_from_bytes(raw: &[u8]) -> ElementName {
    let local = local_name(raw);

    if local.eq_ignore_ascii_case(b"multistatus") {
        ElementName::Multistatus
    } else if local.eq_ignore_ascii_case(b"response") {
        ElementName::Response
    } else if local.eq_ignore_ascii_case(b"propstat") {
        ElementName::Propstat
    } else if local.eq_ignore_ascii_case(b"prop") {
        ElementName::Prop
    } else if local.eq_ignore_ascii_case(b"href") {
        ElementName::Href
    } else if local.eq_ignore_ascii_case(b"status") {
        ElementName::Status
    } else if local.eq_ignore_ascii_case(b"displayname") {
        ElementName::Displayname
    } else if local.eq_ignore_ascii_case(b"getetag") {
        ElementName::Getetag
    } else if local.eq_ignore_ascii_case(b"resourcetype") {
        ElementName::Resourcetype
    } else if local.eq_ignore_ascii_case(b"collection") {
        ElementName::Collection
    } else if local.eq_ignore_ascii_case(b"calendar") {
        ElementName::Calendar
    } else if local.eq_ignore_ascii_case(b"principal") {
        ElementName::Principal
    } else if local.eq_ignore_ascii_case(b"supported-calendar-component-set") {
        ElementName::SupportedCalendarComponentSet
    } else if local.eq_ignore_ascii_case(b"comp") {
        ElementName::Comp
    } else if local.eq_ignore_ascii_case(b"calendar-data") {
        ElementName::CalendarData
    } else if local.eq_ignore_ascii_case(b"calendar-description") {
        ElementName::CalendarDescription
    } else if local.eq_ignore_ascii_case(b"calendar-color") {
        ElementName::CalendarColor
    } else if local.eq_ignore_ascii_case(b"getctag") {
        ElementName::Getctag
    } else if local.eq_ignore_ascii_case(b"sync-token") {
        ElementName::SyncToken
    } else if local.eq_ignore_ascii_case(b"calendar-home-set") {
        ElementName::CalendarHomeSet
    } else if local.eq_ignore_ascii_case(b"current-user-principal") {
        ElementName::CurrentUserPrincipal
    } else if local.eq_ignore_ascii_case(b"schedule-inbox-URL") {
        ElementName::ScheduleInbox
    } else if local.eq_ignore_ascii_case(b"schedule-outbox-URL") {
        ElementName::ScheduleOutbox
    } else if local.eq_ignore_ascii_case(b"current-user-privilege-set") {
        ElementName::CurrentUserPrivilegeSet
    } else if local.eq_ignore_ascii_case(b"privilege") {
        ElementName::Privilege
    } else if local.eq_ignore_ascii_case(b"write") {
        ElementName::Write
    } else if local.eq_ignore_ascii_case(b"owner") {
        ElementName::Owner
    } else if local.eq_ignore_ascii_case(b"getcontenttype") {
        ElementName::Getcontenttype
    } else if local.eq_ignore_ascii_case(b"getlastmodified") {
        ElementName::Getlastmodified
    } else {
        ElementName::Other
    }
}

/// Percent-decode an href. `+` stays literal: WebDAV hrefs are paths, not
/// query strings.
pub fn percent_decode_href(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = bytes.get(i + 1..i + 3)
            && let Ok(hex_str) = std::str::from_utf8(hex)
            && let Ok(byte) = u8::from_str_radix(hex_str, 16)
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// `"HTTP/1.1 200 OK"` → `200`.
fn parse_status_code(text: &str) -> Option<u16> {
    text.split_whitespace().nth(1)?.parse().ok()
}

/// Strip one layer of surrounding double quotes from an etag.
pub fn normalize_etag(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Property values buffered while inside one `<propstat>`.
#[derive(Default)]
struct PropstatBuffer {
    status_ok: Option<bool>,
    values: DavResponse,
    saw_privilege_set: bool,
    has_write: bool,
}

struct MultistatusParser {
    stack: Vec<ElementName>,
    current: DavResponse,
    propstat: PropstatBuffer,
    result: MultiStatus,
}

impl MultistatusParser {
    fn new() -> Self {
        Self {
            stack: Vec::with_capacity(16),
            current: DavResponse::new(),
            propstat: PropstatBuffer::default(),
            result: MultiStatus::default(),
        }
    }

    fn path_ends_with(&self, needle: &[ElementName]) -> bool {
        self.stack.len() >= needle.len()
            && self.stack[self.stack.len() - needle.len()..] == needle[..]
    }

    fn in_prop(&self) -> bool {
        // ... response > propstat > prop > <here>
        self.stack.len() >= 3
            && self.stack[self.stack.len() - 3..]
                == [ElementName::Response, ElementName::Propstat, ElementName::Prop]
    }

    fn on_start(&mut self, event: &BytesStart<'_>) -> DavResult<()> {
        let element = element_from_bytes(event.name().as_ref());

        // Record presence of any property element, known or not, before the
        // element goes onto the stack.
        if self.in_prop() {
            let local = String::from_utf8_lossy(local_name(event.name().as_ref()))
                .to_ascii_lowercase();
            if !self.propstat.values.present.contains(&local) {
                self.propstat.values.present.push(local);
            }
        }

        self.stack.push(element);

        match element {
            ElementName::Response => {
                self.current = DavResponse::new();
            }
            ElementName::Propstat => {
                self.propstat = PropstatBuffer::default();
            }
            ElementName::Collection => {
                if self.path_ends_with(&[ElementName::Resourcetype, ElementName::Collection]) {
                    self.propstat.values.is_collection = true;
                }
            }
            ElementName::Calendar => {
                if self.path_ends_with(&[ElementName::Resourcetype, ElementName::Calendar]) {
                    self.propstat.values.is_calendar = true;
                }
            }
            ElementName::Principal => {
                if self.path_ends_with(&[ElementName::Resourcetype, ElementName::Principal]) {
                    self.propstat.values.is_principal = true;
                }
            }
            ElementName::CurrentUserPrivilegeSet => {
                self.propstat.saw_privilege_set = true;
            }
            ElementName::Write => {
                if self.path_ends_with(&[
                    ElementName::CurrentUserPrivilegeSet,
                    ElementName::Privilege,
                    ElementName::Write,
                ]) {
                    self.propstat.has_write = true;
                }
            }
            ElementName::Comp => {
                if self.path_ends_with(&[
                    ElementName::SupportedCalendarComponentSet,
                    ElementName::Comp,
                ]) {
                    for attr in event.attributes().with_checks(false) {
                        let attr = attr?;
                        if local_name(attr.key.as_ref()).eq_ignore_ascii_case(b"name") {
                            let value = attr
                                .unescape_value()
                                .map_err(|e| DavError::parse(format!("xml attribute: {e}")))?
                                .into_owned();
                            let components = &mut self.propstat.values.supported_components;
                            if !value.is_empty()
                                && !components.iter().any(|c| c.eq_ignore_ascii_case(&value))
                            {
                                components.push(value);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_end(&mut self, name: &[u8]) {
        let element = element_from_bytes(name);
        // Mismatched nesting is tolerated; the stack realigns at the next
        // response element.
        self.stack.pop();

        match element {
            ElementName::Propstat => {
                let buffer = std::mem::take(&mut self.propstat);
                merge_propstat(&mut self.current, buffer);
            }
            ElementName::Response => {
                let finished = std::mem::take(&mut self.current);
                self.result.responses.push(finished);
            }
            _ => {}
        }
    }

    fn on_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }

        // calendar-data is multi-line and may arrive in chunks; keep the
        // exact payload.
        if self.path_ends_with(&[ElementName::Prop, ElementName::CalendarData]) {
            match self.propstat.values.calendar_data.as_mut() {
                Some(existing) => existing.push_str(&text),
                None => self.propstat.values.calendar_data = Some(text),
            }
            return;
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        if self.path_ends_with(&[ElementName::Response, ElementName::Href]) {
            self.current.href = percent_decode_href(trimmed);
        } else if self.path_ends_with(&[ElementName::Response, ElementName::Status]) {
            self.current.status_code = parse_status_code(trimmed);
        } else if self.path_ends_with(&[
            ElementName::Response,
            ElementName::Propstat,
            ElementName::Status,
        ]) {
            self.propstat.status_ok = parse_status_code(trimmed).map(|c| (200..300).contains(&c));
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Getetag]) {
            self.propstat.values.etag = Some(normalize_etag(trimmed));
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Displayname]) {
            self.propstat.values.displayname = Some(trimmed.to_string());
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::CalendarDescription]) {
            self.propstat.values.calendar_description = Some(trimmed.to_string());
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::CalendarColor]) {
            self.propstat.values.calendar_color = Some(trimmed.to_string());
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Getctag]) {
            self.propstat.values.ctag = Some(trimmed.to_string());
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::SyncToken]) {
            self.propstat.values.sync_token = Some(trimmed.to_string());
        } else if self.path_ends_with(&[ElementName::Multistatus, ElementName::SyncToken]) {
            self.result.sync_token = Some(trimmed.to_string());
        } else if self.path_ends_with(&[
            ElementName::Prop,
            ElementName::CurrentUserPrincipal,
            ElementName::Href,
        ]) {
            self.propstat.values.current_user_principal = Some(percent_decode_href(trimmed));
        } else if self.path_ends_with(&[
            ElementName::Prop,
            ElementName::CalendarHomeSet,
            ElementName::Href,
        ]) {
            self.propstat
                .values
                .calendar_home_set
                .push(percent_decode_href(trimmed));
        } else if self.path_ends_with(&[
            ElementName::Prop,
            ElementName::ScheduleInbox,
            ElementName::Href,
        ]) {
            self.propstat.values.schedule_inbox = Some(percent_decode_href(trimmed));
        } else if self.path_ends_with(&[
            ElementName::Prop,
            ElementName::ScheduleOutbox,
            ElementName::Href,
        ]) {
            self.propstat.values.schedule_outbox = Some(percent_decode_href(trimmed));
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Owner, ElementName::Href])
        {
            self.propstat.values.owner = Some(percent_decode_href(trimmed));
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Getcontenttype]) {
            self.propstat.values.content_type = Some(trimmed.to_string());
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Getlastmodified]) {
            self.propstat.values.last_modified = Some(trimmed.to_string());
        }
    }
}

/// Fold one finished propstat into the response. Presence always carries
/// over; values only under a 2xx (or absent) status.
fn merge_propstat(current: &mut DavResponse, buffer: PropstatBuffer) {
    let PropstatBuffer {
        status_ok,
        values,
        saw_privilege_set,
        has_write,
    } = buffer;

    let new_present: Vec<_> = values
        .present
        .iter()
        .filter(|p| !current.present.contains(*p))
        .cloned()
        .collect();
    current.present.extend(new_present);

    if status_ok == Some(false) {
        return;
    }

    if values.etag.is_some() {
        current.etag = values.etag;
    }
    if values.calendar_data.is_some() {
        current.calendar_data = values.calendar_data;
    }
    if values.displayname.is_some() {
        current.displayname = values.displayname;
    }
    if values.calendar_description.is_some() {
        current.calendar_description = values.calendar_description;
    }
    if values.calendar_color.is_some() {
        current.calendar_color = values.calendar_color;
    }
    if values.ctag.is_some() {
        current.ctag = values.ctag;
    }
    if values.sync_token.is_some() {
        current.sync_token = values.sync_token;
    }
    if values.current_user_principal.is_some() {
        current.current_user_principal = values.current_user_principal;
    }
    if values.schedule_inbox.is_some() {
        current.schedule_inbox = values.schedule_inbox;
    }
    if values.schedule_outbox.is_some() {
        current.schedule_outbox = values.schedule_outbox;
    }
    if values.owner.is_some() {
        current.owner = values.owner;
    }
    if values.content_type.is_some() {
        current.content_type = values.content_type;
    }
    if values.last_modified.is_some() {
        current.last_modified = values.last_modified;
    }
    current.is_collection |= values.is_collection;
    current.is_calendar |= values.is_calendar;
    current.is_principal |= values.is_principal;
    if !values.supported_components.is_empty() {
        current.supported_components = values.supported_components;
    }
    if saw_privilege_set && !has_write {
        current.read_only = true;
    }
}

/// Parse a multistatus document from an aggregated body.
pub fn parse_multistatus(body: &[u8]) -> DavResult<MultiStatus> {
    let mut xml = Reader::from_reader(body);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut parser = MultistatusParser::new();
    let mut saw_multistatus = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if element_from_bytes(e.name().as_ref()) == ElementName::Multistatus {
                    saw_multistatus = true;
                }
                parser.on_start(&e)?;
            }
            Ok(Event::Empty(e)) => {
                parser.on_start(&e)?;
                parser.on_end(e.name().as_ref());
            }
            Ok(Event::Text(e)) => {
                let text = decode_text(e.as_ref())?;
                parser.on_text(text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                parser.on_text(text);
            }
            Ok(Event::End(e)) => parser.on_end(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DavError::parse_with_raw(
                    format!("multistatus xml: {e}"),
                    String::from_utf8_lossy(body).into_owned(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_multistatus {
        return Err(DavError::parse_with_raw(
            "document contains no multistatus element",
            String::from_utf8_lossy(body).into_owned(),
        ));
    }
    Ok(parser.result)
}

pub fn decode_text(raw: &[u8]) -> DavResult<String> {
    match std::str::from_utf8(raw) {
        Ok(s) => Ok(unescape(s)
            .map_err(|err| DavError::parse(format!("xml decode: {err}")))?
            .into_owned()),
        Err(_) => Ok(String::from_utf8_lossy(raw).into_owned()),
    }
}
