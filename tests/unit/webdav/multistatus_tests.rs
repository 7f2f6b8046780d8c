use caldav_sync_rs::webdav::parse_multistatus;

#[test]
fn extracts_calendar_properties_with_any_namespace_prefix() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<x:multistatus xmlns:x="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav" xmlns:cs="http://calendarserver.org/ns/">
  <x:response>
    <x:href>/dav/user01/personal/</x:href>
    <x:propstat>
      <x:prop>
        <x:displayname>Personal</x:displayname>
        <x:getetag>"etag-123"</x:getetag>
        <x:resourcetype>
          <x:collection/>
          <cal:calendar/>
        </x:resourcetype>
        <cal:supported-calendar-component-set>
          <cal:comp name="VEVENT"/>
          <cal:comp name="VTODO"/>
        </cal:supported-calendar-component-set>
        <cs:getctag>ctag-9</cs:getctag>
        <x:sync-token>token-123</x:sync-token>
      </x:prop>
      <x:status>HTTP/1.1 200 OK</x:status>
    </x:propstat>
  </x:response>
</x:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes()).expect("parses");
    assert_eq!(result.responses.len(), 1);

    let calendar = &result.responses[0];
    assert_eq!(calendar.href, "/dav/user01/personal/");
    assert!(calendar.is_collection);
    assert!(calendar.is_calendar);
    assert_eq!(calendar.displayname.as_deref(), Some("Personal"));
    assert_eq!(calendar.etag.as_deref(), Some("etag-123"), "etag quotes stripped");
    assert_eq!(calendar.ctag.as_deref(), Some("ctag-9"));
    assert_eq!(calendar.sync_token.as_deref(), Some("token-123"));
    assert_eq!(calendar.supported_components, vec!["VEVENT", "VTODO"]);
}

#[test]
fn default_namespace_documents_parse_too() {
    let xml = r#"<?xml version="1.0"?>
<multistatus xmlns="DAV:">
  <response>
    <href>/principals/jane/</href>
    <propstat>
      <prop>
        <current-user-principal><href>/principals/jane/</href></current-user-principal>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;

    let result = parse_multistatus(xml.as_bytes()).expect("parses");
    assert_eq!(
        result.responses[0].current_user_principal.as_deref(),
        Some("/principals/jane/")
    );
}

#[test]
fn values_from_404_propstat_are_present_but_not_captured() {
    let xml = r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/cal/event.ics</D:href>
    <D:propstat>
      <D:prop><D:getetag>"live-etag"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
    <D:propstat>
      <D:prop><D:displayname/></D:prop>
      <D:status>HTTP/1.1 404 Not Found</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes()).expect("parses");
    let response = &result.responses[0];
    assert_eq!(response.etag.as_deref(), Some("live-etag"));
    assert!(response.displayname.is_none());
    assert!(response.has_property("displayname"));
    assert!(response.has_property("getetag"));
}

#[test]
fn calendar_data_cdata_is_unwrapped() {
    let xml = "<?xml version=\"1.0\"?>\n<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">\n  <D:response>\n    <D:href>/cal/e.ics</D:href>\n    <D:propstat>\n      <D:prop><C:calendar-data><![CDATA[BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n]]></C:calendar-data></D:prop>\n      <D:status>HTTP/1.1 200 OK</D:status>\n    </D:propstat>\n  </D:response>\n</D:multistatus>";

    let result = parse_multistatus(xml.as_bytes()).expect("parses");
    let data = result.responses[0].calendar_data.as_deref().expect("data");
    assert!(data.starts_with("BEGIN:VCALENDAR"));
    assert!(data.contains("END:VCALENDAR"));
}

#[test]
fn hrefs_are_percent_decoded_with_literal_plus() {
    let xml = r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/cal/caf%C3%A9+meeting%20notes.ics</D:href>
    <D:propstat>
      <D:prop><D:getetag>"e"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes()).expect("parses");
    assert_eq!(result.responses[0].href, "/cal/café+meeting notes.ics");
}

#[test]
fn sync_collection_shape_with_top_level_token_and_deletion() {
    let xml = r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:response>
    <D:href>/cal/gone.ics</D:href>
    <D:status>HTTP/1.1 404 Not Found</D:status>
  </D:response>
  <D:response>
    <D:href>/cal/changed.ics</D:href>
    <D:propstat>
      <D:prop><D:getetag>"v2"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:sync-token>http://example.com/sync/00042</D:sync-token>
</D:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes()).expect("parses");
    assert_eq!(result.sync_token.as_deref(), Some("http://example.com/sync/00042"));

    let deleted = &result.responses[0];
    assert_eq!(deleted.status_code, Some(404));
    assert!(deleted.is_deleted());

    let changed = &result.responses[1];
    assert_eq!(changed.etag.as_deref(), Some("v2"));
    assert!(!changed.is_deleted());
}

#[test]
fn privilege_set_without_write_marks_read_only() {
    let xml = r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/cal/shared/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype><D:collection/></D:resourcetype>
        <D:current-user-privilege-set>
          <D:privilege><D:read/></D:privilege>
        </D:current-user-privilege-set>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/cal/mine/</D:href>
    <D:propstat>
      <D:prop>
        <D:current-user-privilege-set>
          <D:privilege><D:read/></D:privilege>
          <D:privilege><D:write/></D:privilege>
        </D:current-user-privilege-set>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes()).expect("parses");
    assert!(result.responses[0].read_only);
    assert!(!result.responses[1].read_only);
}

#[test]
fn non_multistatus_document_is_a_parse_error() {
    let err = parse_multistatus(b"<html><body>login page</body></html>").unwrap_err();
    match err {
        caldav_sync_rs::DavError::Parse { raw, .. } => {
            assert!(raw.expect("raw attached").contains("login page"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}
