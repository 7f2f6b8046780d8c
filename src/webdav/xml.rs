//! Request-body builders for every WebDAV/CalDAV body this client issues.
//!
//! Plain string assembly, one named entry point per request shape. All
//! caller-supplied text goes through [`escape_xml`].

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// PROPFIND for `current-user-principal` (discovery step one).
pub fn propfind_principal() -> String {
    format!(
        r#"{XML_DECL}
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:current-user-principal/>
  </D:prop>
</D:propfind>"#
    )
}

/// PROPFIND for `calendar-home-set` on a principal.
pub fn propfind_calendar_home() -> String {
    format!(
        r#"{XML_DECL}
<D:propfind xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <C:calendar-home-set/>
  </D:prop>
</D:propfind>"#
    )
}

/// PROPFIND for the schedule inbox/outbox URLs on a principal (RFC 6638).
pub fn propfind_schedule_urls() -> String {
    format!(
        r#"{XML_DECL}
<D:propfind xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <C:schedule-inbox-URL/>
    <C:schedule-outbox-URL/>
  </D:prop>
</D:propfind>"#
    )
}

/// Depth:1 PROPFIND that enumerates the collections under a calendar home.
pub fn propfind_calendars() -> String {
    format!(
        r#"{XML_DECL}
<D:propfind xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav" xmlns:CS="http://calendarserver.org/ns/" xmlns:IC="http://apple.com/ns/ical/">
  <D:prop>
    <D:displayname/>
    <D:resourcetype/>
    <D:current-user-privilege-set/>
    <C:calendar-description/>
    <C:supported-calendar-component-set/>
    <IC:calendar-color/>
    <CS:getctag/>
    <D:sync-token/>
  </D:prop>
</D:propfind>"#
    )
}

/// PROPFIND for the change indicators of one calendar collection.
pub fn propfind_ctag_and_sync_token() -> String {
    format!(
        r#"{XML_DECL}
<D:propfind xmlns:D="DAV:" xmlns:CS="http://calendarserver.org/ns/">
  <D:prop>
    <CS:getctag/>
    <D:sync-token/>
  </D:prop>
</D:propfind>"#
    )
}

fn time_range_fragment(time_range: Option<(&str, &str)>) -> String {
    match time_range {
        Some((start, end)) => format!(
            "<C:time-range start=\"{}\" end=\"{}\"/>",
            escape_xml(start),
            escape_xml(end)
        ),
        None => String::new(),
    }
}

fn calendar_query_with_props(prop: &str, component: &str, time_range: Option<(&str, &str)>) -> String {
    format!(
        "{XML_DECL}\
<C:calendar-query xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">\
<D:prop>{prop}</D:prop>\
<C:filter><C:comp-filter name=\"VCALENDAR\"><C:comp-filter name=\"{}\">{}\
</C:comp-filter></C:comp-filter></C:filter>\
</C:calendar-query>",
        escape_xml(component),
        time_range_fragment(time_range),
    )
}

/// `calendar-query` REPORT fetching etags and calendar data.
pub fn calendar_query(component: &str, time_range: Option<(&str, &str)>) -> String {
    calendar_query_with_props("<D:getetag/><C:calendar-data/>", component, time_range)
}

/// `calendar-query` REPORT fetching etags only, for the ctag fallback diff.
pub fn calendar_query_etag_only(component: &str, time_range: Option<(&str, &str)>) -> String {
    calendar_query_with_props("<D:getetag/>", component, time_range)
}

/// `calendar-multiget` REPORT for a batch of hrefs. `None` when the list is
/// empty, mirroring that no request should be sent.
pub fn calendar_multiget<I, S>(hrefs: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut href_xml = String::new();
    let mut total = 0usize;
    for href in hrefs {
        let href = href.as_ref();
        if href.is_empty() {
            continue;
        }
        total += 1;
        href_xml.push_str("<D:href>");
        href_xml.push_str(&escape_xml(href));
        href_xml.push_str("</D:href>");
    }
    if total == 0 {
        return None;
    }

    Some(format!(
        "{XML_DECL}\
<C:calendar-multiget xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">\
<D:prop><D:getetag/><C:calendar-data/></D:prop>{href_xml}</C:calendar-multiget>"
    ))
}

/// `sync-collection` REPORT (RFC 6578). An empty token requests initial
/// sync.
pub fn sync_collection(sync_token: Option<&str>, limit: Option<u32>) -> String {
    let mut body = format!(
        "{XML_DECL}<D:sync-collection xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">"
    );
    match sync_token {
        Some(token) if !token.is_empty() => {
            body.push_str("<D:sync-token>");
            body.push_str(&escape_xml(token));
            body.push_str("</D:sync-token>");
        }
        _ => body.push_str("<D:sync-token/>"),
    }
    body.push_str("<D:sync-level>1</D:sync-level>");
    body.push_str("<D:prop><D:getetag/><C:calendar-data/></D:prop>");
    if let Some(limit) = limit {
        body.push_str("<D:limit><D:nresults>");
        body.push_str(&limit.to_string());
        body.push_str("</D:nresults></D:limit>");
    }
    body.push_str("</D:sync-collection>");
    body
}

/// Properties for a new calendar collection.
#[derive(Debug, Clone, Default)]
pub struct MkCalendarProps {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Raw VTIMEZONE block for `calendar-timezone`.
    pub timezone: Option<String>,
    pub supported_components: Vec<String>,
}

/// `MKCALENDAR` request body.
pub fn mkcalendar(props: &MkCalendarProps) -> String {
    let mut prop = String::new();
    if let Some(name) = &props.display_name {
        prop.push_str("<D:displayname>");
        prop.push_str(&escape_xml(name));
        prop.push_str("</D:displayname>");
    }
    if let Some(description) = &props.description {
        prop.push_str("<C:calendar-description>");
        prop.push_str(&escape_xml(description));
        prop.push_str("</C:calendar-description>");
    }
    if let Some(color) = &props.color {
        prop.push_str("<IC:calendar-color>");
        prop.push_str(&escape_xml(color));
        prop.push_str("</IC:calendar-color>");
    }
    if let Some(timezone) = &props.timezone {
        prop.push_str("<C:calendar-timezone><![CDATA[");
        prop.push_str(timezone);
        prop.push_str("]]></C:calendar-timezone>");
    }
    if !props.supported_components.is_empty() {
        prop.push_str("<C:supported-calendar-component-set>");
        for comp in &props.supported_components {
            prop.push_str(&format!("<C:comp name=\"{}\"/>", escape_xml(comp)));
        }
        prop.push_str("</C:supported-calendar-component-set>");
    }

    format!(
        "{XML_DECL}\
<C:mkcalendar xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\" xmlns:IC=\"http://apple.com/ns/ical/\">\
<D:set><D:prop>{prop}</D:prop></D:set></C:mkcalendar>"
    )
}

/// `free-busy-query` REPORT over a time range.
pub fn free_busy_query(start: &str, end: &str) -> String {
    format!(
        "{XML_DECL}\
<C:free-busy-query xmlns:C=\"urn:ietf:params:xml:ns:caldav\">\
<C:time-range start=\"{}\" end=\"{}\"/></C:free-busy-query>",
        escape_xml(start),
        escape_xml(end)
    )
}
