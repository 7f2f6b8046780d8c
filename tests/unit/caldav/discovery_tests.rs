use std::sync::Arc;

use caldav_sync_rs::caldav::stores::SrvRecord;
use caldav_sync_rs::webdav::{Credentials, TransportConfig, WebDavTransport};
use caldav_sync_rs::Discovery;

use crate::helpers::{MockClock, MockDnsResolver, MockHttpClient};

fn transport(http: Arc<MockHttpClient>) -> Arc<WebDavTransport> {
    Arc::new(WebDavTransport::with_clock(
        http,
        Credentials::basic("jane", "pw"),
        TransportConfig::default(),
        Arc::new(MockClock::new()),
    ))
}

fn principal_response() -> String {
    r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/</D:href>
    <D:propstat>
      <D:prop>
        <D:current-user-principal><D:href>/principals/jane/</D:href></D:current-user-principal>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#
        .to_string()
}

fn home_set_response() -> String {
    r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:response>
    <D:href>/principals/jane/</D:href>
    <D:propstat>
      <D:prop>
        <C:calendar-home-set><D:href>/calendars/jane/</D:href></C:calendar-home-set>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#
        .to_string()
}

fn schedule_urls_response() -> String {
    r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:response>
    <D:href>/principals/jane/</D:href>
    <D:propstat>
      <D:prop>
        <C:schedule-inbox-URL><D:href>/calendars/jane/inbox/</D:href></C:schedule-inbox-URL>
        <C:schedule-outbox-URL><D:href>/calendars/jane/outbox/</D:href></C:schedule-outbox-URL>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#
        .to_string()
}

fn calendar_list_response() -> String {
    r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav" xmlns:CS="http://calendarserver.org/ns/">
  <D:response>
    <D:href>/calendars/jane/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype><D:collection/><C:calendar/></D:resourcetype>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/calendars/jane/work/</D:href>
    <D:propstat>
      <D:prop>
        <D:displayname>Work</D:displayname>
        <D:resourcetype><D:collection/><C:calendar/></D:resourcetype>
        <CS:getctag>ct-1</CS:getctag>
        <D:sync-token>st-1</D:sync-token>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/calendars/jane/inbox/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype><D:collection/><C:calendar/></D:resourcetype>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/calendars/jane/stuff/</D:href>
    <D:propstat>
      <D:prop>
        <D:displayname>My Reminders</D:displayname>
        <D:resourcetype><D:collection/><C:calendar/></D:resourcetype>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/calendars/jane/attachments/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype><D:collection/></D:resourcetype>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#
        .to_string()
}

#[tokio::test]
async fn full_walk_from_server_url() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(207, &[], &principal_response());
    http.push_response(207, &[], &home_set_response());
    http.push_response(207, &[], &schedule_urls_response());
    http.push_response(207, &[], &calendar_list_response());

    let account = Discovery::new(transport(http.clone()))
        .discover("https://cal.example.com/")
        .await
        .expect("discovers");

    assert_eq!(account.server_url, "https://cal.example.com");
    assert_eq!(account.principal_url, "https://cal.example.com/principals/jane/");
    assert_eq!(
        account.calendar_home_url,
        "https://cal.example.com/calendars/jane/"
    );
    assert_eq!(
        account.schedule_inbox_url.as_deref(),
        Some("https://cal.example.com/calendars/jane/inbox/")
    );
    assert_eq!(
        account.schedule_outbox_url.as_deref(),
        Some("https://cal.example.com/calendars/jane/outbox/")
    );

    // Home itself, the scheduling inbox, the reminders list, and the plain
    // collection are all filtered out.
    assert_eq!(account.calendars.len(), 1);
    let calendar = &account.calendars[0];
    assert_eq!(calendar.href, "https://cal.example.com/calendars/jane/work/");
    assert_eq!(calendar.display_name.as_deref(), Some("Work"));
    assert_eq!(calendar.ctag.as_deref(), Some("ct-1"));
    assert_eq!(calendar.sync_token.as_deref(), Some("st-1"));

    // Principal PROPFIND went to the base URL with Depth: 0.
    let first = http.request(0);
    assert_eq!(first.uri.host(), Some("cal.example.com"));
    assert_eq!(first.headers.get("Depth").unwrap().to_str().unwrap(), "0");
    // Calendar enumeration used Depth: 1.
    let last = http.request(3);
    assert_eq!(last.headers.get("Depth").unwrap().to_str().unwrap(), "1");
}

#[tokio::test]
async fn falls_back_to_well_known_when_direct_probe_fails() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(404, &[], "");
    http.push_response(207, &[], &principal_response());
    http.push_response(207, &[], &home_set_response());
    http.push_response(207, &[], &schedule_urls_response());
    http.push_response(207, &[], &calendar_list_response());

    let account = Discovery::new(transport(http.clone()))
        .discover("https://cal.example.com/some/odd/path")
        .await
        .expect("discovers via well-known");

    assert_eq!(http.request(1).uri.path(), "/.well-known/caldav");
    assert_eq!(account.principal_url, "https://cal.example.com/principals/jane/");
}

#[tokio::test]
async fn well_known_fallback_can_be_disabled() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(404, &[], "");

    let err = Discovery::new(transport(http.clone()))
        .well_known_enabled(false)
        .discover("https://cal.example.com/")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(http.request_count(), 1);
}

#[tokio::test]
async fn schedule_url_discovery_failure_is_not_fatal() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(207, &[], &principal_response());
    http.push_response(207, &[], &home_set_response());
    http.push_response(403, &[], "");
    http.push_response(207, &[], &calendar_list_response());

    let account = Discovery::new(transport(http.clone()))
        .discover("https://cal.example.com/")
        .await
        .expect("discovers without scheduling");
    assert!(account.schedule_inbox_url.is_none());
    assert!(account.schedule_outbox_url.is_none());
    assert_eq!(account.calendars.len(), 1);
}

#[tokio::test]
async fn email_discovery_uses_the_best_srv_record() {
    let dns = Arc::new(MockDnsResolver::new());
    dns.add(
        "_caldavs._tcp.example.com",
        vec![
            SrvRecord {
                priority: 20,
                weight: 100,
                port: 443,
                target: "backup-dav.example.com.".to_string(),
            },
            SrvRecord {
                priority: 10,
                weight: 5,
                port: 8443,
                target: "dav.example.com.".to_string(),
            },
        ],
    );

    let http = Arc::new(MockHttpClient::new());
    http.push_response(207, &[], &principal_response());
    http.push_response(207, &[], &home_set_response());
    http.push_response(207, &[], &schedule_urls_response());
    http.push_response(207, &[], &calendar_list_response());

    Discovery::new(transport(http.clone()))
        .with_dns(dns)
        .discover_from_email("jane@example.com")
        .await
        .expect("discovers");

    let first = http.request(0);
    assert_eq!(first.uri.host(), Some("dav.example.com"));
    assert_eq!(first.uri.port_u16(), Some(8443));
    assert_eq!(first.uri.scheme_str(), Some("https"));
}

#[tokio::test]
async fn email_discovery_without_srv_records_uses_https_domain() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(207, &[], &principal_response());
    http.push_response(207, &[], &home_set_response());
    http.push_response(207, &[], &schedule_urls_response());
    http.push_response(207, &[], &calendar_list_response());

    Discovery::new(transport(http.clone()))
        .with_dns(Arc::new(MockDnsResolver::new()))
        .discover_from_email("jane@example.com")
        .await
        .expect("discovers");

    let first = http.request(0);
    assert_eq!(first.uri.host(), Some("example.com"));
    assert_eq!(first.uri.scheme_str(), Some("https"));
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let http = Arc::new(MockHttpClient::new());
    let err = Discovery::new(transport(http))
        .discover_from_email("not-an-email")
        .await
        .unwrap_err();
    assert!(matches!(err, caldav_sync_rs::DavError::Parse { .. }));
}
