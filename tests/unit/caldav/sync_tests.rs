use std::sync::Arc;

use caldav_sync_rs::caldav::stores::DirtyEvent;
use caldav_sync_rs::webdav::{Credentials, TransportConfig, WebDavTransport};
use caldav_sync_rs::{CalDavClient, EngineState, SyncEngine, SyncState};

use crate::helpers::{
    MemoryLocalStore, MemoryStateStore, MockClock, MockHttpClient, sample_event, sample_ics,
};

const CAL: &str = "https://cal.example.com/cal/";

struct Fixture {
    http: Arc<MockHttpClient>,
    local: Arc<MemoryLocalStore>,
    states: Arc<MemoryStateStore>,
    engine: SyncEngine,
}

fn fixture() -> Fixture {
    let http = Arc::new(MockHttpClient::new());
    let transport = Arc::new(WebDavTransport::with_clock(
        http.clone(),
        Credentials::basic("jane", "pw"),
        TransportConfig::default(),
        Arc::new(MockClock::new()),
    ));
    let client = CalDavClient::new(transport, "https://cal.example.com/").expect("client");
    let local = Arc::new(MemoryLocalStore::new());
    let states = Arc::new(MemoryStateStore::new());
    let engine = SyncEngine::new(client, CAL, local.clone(), states.clone())
        .with_clock(Arc::new(MockClock::new()));
    Fixture {
        http,
        local,
        states,
        engine,
    }
}

fn options_with_report(http: &MockHttpClient) {
    http.push_response(
        200,
        &[("DAV", "1, 2, calendar-access"), ("Allow", "OPTIONS, PROPFIND, REPORT, PUT, DELETE")],
        "",
    );
}

fn options_without_report(http: &MockHttpClient) {
    http.push_response(200, &[("DAV", "1"), ("Allow", "OPTIONS, GET, PUT")], "");
}

fn empty_sync_report(http: &MockHttpClient, token: &str) {
    http.push_response(
        207,
        &[],
        &format!(
            r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:"><D:sync-token>{token}</D:sync-token></D:multistatus>"#
        ),
    );
}

fn multistatus_with_data(entries: &[(&str, &str, &str)]) -> String {
    let mut body = String::from(r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">"#);
    for (href, etag, ics) in entries {
        body.push_str(&format!(
            "<D:response><D:href>{href}</D:href><D:propstat><D:prop><D:getetag>\"{etag}\"</D:getetag><C:calendar-data>{ics}</C:calendar-data></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>"
        ));
    }
    body.push_str("</D:multistatus>");
    body
}

#[tokio::test]
async fn sync_collection_applies_upserts_deletes_and_batches_missing_data() {
    let mut fx = fixture();
    fx.local
        .seed_event(sample_event("uid-gone", "20240101T100000Z"), "/cal/gone.ics", Some("e0"));

    let mut state = SyncState::new(CAL);
    state.sync_token = Some("tok-1".to_string());
    state.etags.insert("/cal/gone.ics".to_string(), "e0".to_string());
    state.etags.insert("/cal/keep.ics".to_string(), "e9".to_string());
    fx.states.seed(state);

    options_with_report(&fx.http);
    let new_ics = sample_ics("uid-new", "20240105T090000Z", "Fresh");
    let sync_body = format!(
        r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav"><D:response><D:href>/cal/gone.ics</D:href><D:status>HTTP/1.1 404 Not Found</D:status></D:response><D:response><D:href>/cal/new.ics</D:href><D:propstat><D:prop><D:getetag>"e1"</D:getetag><C:calendar-data>{new_ics}</C:calendar-data></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response><D:response><D:href>/cal/nodata.ics</D:href><D:propstat><D:prop><D:getetag>"e2"</D:getetag></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response><D:sync-token>tok-2</D:sync-token></D:multistatus>"#
    );
    fx.http.push_response(207, &[], &sync_body);
    let nodata_ics = sample_ics("uid-nodata", "20240106T090000Z", "Fetched later");
    fx.http
        .push_response(207, &[], &multistatus_with_data(&[("/cal/nodata.ics", "e2", &nodata_ics)]));

    let outcome = fx.engine.sync().await.expect("sync succeeds");

    assert_eq!(outcome.pulled_deletes, 1);
    assert_eq!(outcome.pulled_upserts, 2);
    assert_eq!(fx.engine.state(), EngineState::Ready);

    assert!(!fx.local.contains("uid-gone"));
    assert!(fx.local.contains("uid-new"));
    assert!(fx.local.contains("uid-nodata"));

    let saved = fx.states.get(CAL).expect("state saved");
    assert_eq!(saved.sync_token.as_deref(), Some("tok-2"));
    assert!(!saved.etags.contains_key("/cal/gone.ics"));
    assert_eq!(saved.etags.get("/cal/new.ics").map(String::as_str), Some("e1"));
    assert_eq!(saved.etags.get("/cal/nodata.ics").map(String::as_str), Some("e2"));
    assert_eq!(saved.etags.get("/cal/keep.ics").map(String::as_str), Some("e9"));

    let bodies = fx.http.request_bodies();
    assert!(bodies[1].contains("sync-collection"));
    assert!(bodies[1].contains("<D:sync-token>tok-1</D:sync-token>"));
    assert!(bodies[2].contains("calendar-multiget"));
    assert!(bodies[2].contains("/cal/nodata.ics"));
}

#[tokio::test]
async fn etag_conflict_on_push_records_conflict_and_keeps_server_copy() {
    let mut fx = fixture();

    let mut local_event = sample_event("ev1", "20240201T100000Z");
    local_event.sequence = 1;
    local_event.summary = Some("Local edit".to_string());
    fx.local
        .seed_event(local_event.clone(), "/cal/ev1.ics", Some("abc"));
    fx.local.queue_dirty(DirtyEvent {
        event: local_event.clone(),
        href: Some("/cal/ev1.ics".to_string()),
        etag: Some("abc".to_string()),
        deleted: false,
    });

    // PUT is rejected, the server copy is fetched, pull finds nothing new.
    fx.http.push_response(412, &[], "");
    let mut remote = sample_ics("ev1", "20240201T100000Z", "Server edit");
    remote = remote.replace("SUMMARY:Server edit", "SUMMARY:Server edit\r\nSEQUENCE:2");
    fx.http.push_response(200, &[("ETag", "\"def\"")], &remote);
    options_with_report(&fx.http);
    empty_sync_report(&fx.http, "tok-9");

    let outcome = fx.engine.sync().await.expect("sync succeeds");

    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = &outcome.conflicts[0];
    assert_eq!(conflict.import_id, "ev1");
    assert_eq!(conflict.local.summary.as_deref(), Some("Local edit"));
    assert_eq!(
        conflict.remote.as_ref().and_then(|r| r.summary.as_deref()),
        Some("Server edit")
    );

    // Server wins locally, the losing copy is preserved as a record, and
    // the event is still queued for the caller to resolve.
    let stored = fx.local.event("ev1").expect("event present");
    assert_eq!(stored.summary.as_deref(), Some("Server edit"));
    assert_eq!(stored.sequence, 2);
    assert_eq!(fx.local.conflicts().len(), 1);
    assert_eq!(fx.local.dirty_len(), 1);

    let put = fx.http.request(0);
    assert_eq!(
        put.headers.get(hyper::header::IF_MATCH).unwrap().to_str().unwrap(),
        "\"abc\""
    );
    let saved = fx.states.get(CAL).expect("state saved");
    assert_eq!(saved.etags.get("/cal/ev1.ics").map(String::as_str), Some("def"));
}

#[tokio::test]
async fn invalid_sync_token_falls_back_to_ctag_etag_diff() {
    let mut fx = fixture();
    fx.local
        .seed_event(sample_event("uid-a", "20240101T100000Z"), "/cal/a.ics", Some("e1"));
    fx.local
        .seed_event(sample_event("uid-b", "20240102T100000Z"), "/cal/b.ics", Some("e2"));

    let mut state = SyncState::new(CAL);
    state.sync_token = Some("stale-token".to_string());
    state.ctag = Some("c1".to_string());
    state.etags.insert("/cal/a.ics".to_string(), "e1".to_string());
    state.etags.insert("/cal/b.ics".to_string(), "e2".to_string());
    fx.states.seed(state);

    options_with_report(&fx.http);
    fx.http.push_response(
        403,
        &[],
        r#"<?xml version="1.0"?><D:error xmlns:D="DAV:"><D:valid-sync-token/></D:error>"#,
    );
    // Fallback: ctag probe, etag-only query, multiget for the new object.
    fx.http.push_response(
        207,
        &[],
        r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:" xmlns:CS="http://calendarserver.org/ns/"><D:response><D:href>/cal/</D:href><D:propstat><D:prop><CS:getctag>c2</CS:getctag></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"#,
    );
    fx.http.push_response(
        207,
        &[],
        r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:"><D:response><D:href>/cal/a.ics</D:href><D:propstat><D:prop><D:getetag>"e1"</D:getetag></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response><D:response><D:href>/cal/c.ics</D:href><D:propstat><D:prop><D:getetag>"e3"</D:getetag></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"#,
    );
    let c_ics = sample_ics("uid-c", "20240110T090000Z", "Newcomer");
    fx.http
        .push_response(207, &[], &multistatus_with_data(&[("/cal/c.ics", "e3", &c_ics)]));

    let outcome = fx.engine.sync().await.expect("sync succeeds");

    assert_eq!(outcome.pulled_deletes, 1, "b vanished from the server map");
    assert_eq!(outcome.pulled_upserts, 1, "c is new");
    assert!(!fx.local.contains("uid-b"));
    assert!(fx.local.contains("uid-c"));

    let saved = fx.states.get(CAL).expect("state saved");
    assert_eq!(saved.ctag.as_deref(), Some("c2"));
    assert!(saved.sync_token.is_none(), "stale token dropped");
    assert_eq!(saved.etags.len(), 2);
    assert_eq!(saved.etags.get("/cal/a.ics").map(String::as_str), Some("e1"));
    assert_eq!(saved.etags.get("/cal/c.ics").map(String::as_str), Some("e3"));

    let bodies = fx.http.request_bodies();
    assert!(bodies[3].contains("calendar-query"));
    assert!(bodies[3].contains("getetag"));
    assert!(!bodies[3].contains("calendar-data"), "etag-only query must not fetch data");
}

#[tokio::test]
async fn unchanged_ctag_short_circuits_the_fallback_pull() {
    let mut fx = fixture();
    let mut state = SyncState::new(CAL);
    state.ctag = Some("c1".to_string());
    fx.states.seed(state);

    options_without_report(&fx.http);
    fx.http.push_response(
        207,
        &[],
        r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:" xmlns:CS="http://calendarserver.org/ns/"><D:response><D:href>/cal/</D:href><D:propstat><D:prop><CS:getctag>c1</CS:getctag></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"#,
    );

    let outcome = fx.engine.sync().await.expect("sync succeeds");
    assert_eq!(outcome.pulled_upserts, 0);
    assert_eq!(outcome.pulled_deletes, 0);
    assert_eq!(fx.http.request_count(), 2, "OPTIONS + ctag probe only");
    assert_eq!(fx.engine.state(), EngineState::Ready);
}

#[tokio::test]
async fn new_local_event_is_created_with_if_none_match() {
    let mut fx = fixture();
    let event = sample_event("Team Sync! 2024", "20240301T100000Z");
    fx.local.queue_dirty(DirtyEvent {
        event,
        href: None,
        etag: None,
        deleted: false,
    });

    fx.http.push_response(201, &[("ETag", "\"n1\"")], "");
    options_with_report(&fx.http);
    empty_sync_report(&fx.http, "tok-1");

    let outcome = fx.engine.sync().await.expect("sync succeeds");
    assert_eq!(outcome.pushed_creates, 1);
    assert_eq!(fx.local.dirty_len(), 0, "dirty queue drained");

    let put = fx.http.request(0);
    assert_eq!(put.method, hyper::Method::PUT);
    assert_eq!(put.uri.path(), "/cal/Team_Sync__2024.ics", "uid sanitized into the filename");
    assert_eq!(
        put.headers
            .get(hyper::header::IF_NONE_MATCH)
            .unwrap()
            .to_str()
            .unwrap(),
        "*"
    );

    let saved = fx.states.get(CAL).expect("state saved");
    assert_eq!(
        saved
            .etags
            .get("https://cal.example.com/cal/Team_Sync__2024.ics")
            .map(String::as_str),
        Some("n1")
    );
}

#[tokio::test]
async fn local_deletion_is_pushed_and_404_counts_as_done() {
    let mut fx = fixture();
    let event = sample_event("uid-del", "20240101T100000Z");
    fx.local.seed_event(event.clone(), "/cal/del.ics", Some("e5"));
    fx.local.queue_dirty(DirtyEvent {
        event,
        href: Some("/cal/del.ics".to_string()),
        etag: Some("e5".to_string()),
        deleted: true,
    });

    let mut state = SyncState::new(CAL);
    state.etags.insert("/cal/del.ics".to_string(), "e5".to_string());
    fx.states.seed(state);

    fx.http.push_response(404, &[], "");
    options_with_report(&fx.http);
    empty_sync_report(&fx.http, "tok-1");

    let outcome = fx.engine.sync().await.expect("sync succeeds");
    assert_eq!(outcome.pushed_deletes, 1);
    assert!(!fx.local.contains("uid-del"));
    assert_eq!(fx.local.dirty_len(), 0);
    let saved = fx.states.get(CAL).expect("state saved");
    assert!(saved.etags.is_empty());
}

#[tokio::test]
async fn failed_push_item_is_skipped_and_the_queue_continues() {
    let mut fx = fixture();
    fx.local.queue_dirty(DirtyEvent {
        event: sample_event("uid-bad", "20240101T100000Z"),
        href: None,
        etag: None,
        deleted: false,
    });
    fx.local.queue_dirty(DirtyEvent {
        event: sample_event("uid-good", "20240102T100000Z"),
        href: None,
        etag: None,
        deleted: false,
    });

    // First PUT keeps failing server-side through all retries.
    fx.http.push_response(500, &[], "");
    fx.http.push_response(500, &[], "");
    fx.http.push_response(500, &[], "");
    // Second PUT lands.
    fx.http.push_response(201, &[("ETag", "\"g1\"")], "");
    options_with_report(&fx.http);
    empty_sync_report(&fx.http, "tok-1");

    let outcome = fx.engine.sync().await.expect("sync succeeds overall");
    assert_eq!(outcome.pushed_creates, 1);
    assert_eq!(outcome.push_failures, 1);
    assert_eq!(fx.local.dirty_len(), 1, "failed item stays queued");
    assert!(fx.local.contains("uid-good"));
}

#[tokio::test]
async fn pull_only_run_leaves_no_dirty_queue_and_reports_ready() {
    let mut fx = fixture();
    options_with_report(&fx.http);
    empty_sync_report(&fx.http, "tok-initial");

    let outcome = fx.engine.sync().await.expect("initial sync");
    assert_eq!(outcome.pulled_upserts, 0);
    assert_eq!(fx.local.dirty_len(), 0);
    assert_eq!(fx.engine.state(), EngineState::Ready);

    let saved = fx.states.get(CAL).expect("state saved");
    assert_eq!(saved.sync_token.as_deref(), Some("tok-initial"));
}

#[tokio::test]
async fn fatal_pull_failure_surfaces_and_preserves_previous_state() {
    let mut fx = fixture();
    let mut state = SyncState::new(CAL);
    state.sync_token = Some("tok-keep".to_string());
    state.ctag = Some("c-keep".to_string());
    fx.states.seed(state.clone());

    options_with_report(&fx.http);
    // Not an invalid-token status and no marker in the body: genuine failure.
    fx.http.push_response(500, &[], "internal error");
    fx.http.push_response(500, &[], "internal error");
    fx.http.push_response(500, &[], "internal error");

    let err = fx.engine.sync().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(fx.engine.state(), EngineState::Error);

    let saved = fx.states.get(CAL).expect("state still there");
    assert_eq!(saved.sync_token, state.sync_token);
    assert_eq!(saved.ctag, state.ctag);
}
