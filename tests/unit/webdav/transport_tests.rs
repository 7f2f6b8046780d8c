use hyper::Uri;
use hyper::header;
use std::sync::Arc;
use std::time::Duration;

use caldav_sync_rs::error::{DavError, NetworkErrorKind};
use caldav_sync_rs::webdav::{
    Credentials, Depth, PutPrecondition, TransportConfig, WebDavTransport,
};

use crate::helpers::{MockClock, MockHttpClient};

const EMPTY_MULTISTATUS: &str =
    r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:"></D:multistatus>"#;

fn transport(
    http: Arc<MockHttpClient>,
    clock: Arc<MockClock>,
    credentials: Credentials,
) -> WebDavTransport {
    WebDavTransport::with_clock(http, credentials, TransportConfig::default(), clock)
}

fn url(s: &str) -> Uri {
    s.parse().expect("valid url")
}

#[tokio::test]
async fn server_errors_are_retried_with_backoff() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(503, &[], "busy");
    http.push_response(200, &[], "hello");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let (body, _) = t.get(&url("https://cal.example.com/x")).await.expect("succeeds");
    assert_eq!(body, "hello");
    assert_eq!(http.request_count(), 2);

    let sleeps = clock.sleeps.lock().unwrap().clone();
    assert_eq!(sleeps, vec![Duration::from_millis(500)]);
}

#[tokio::test]
async fn rate_limit_honors_retry_after() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(429, &[("Retry-After", "2")], "slow down");
    http.push_response(200, &[], "ok");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    t.get(&url("https://cal.example.com/x")).await.expect("succeeds");
    assert!(clock.total_slept() >= Duration::from_secs(2));
}

#[tokio::test]
async fn rate_limit_without_header_waits_thirty_seconds() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(429, &[], "slow down");
    http.push_response(200, &[], "ok");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    t.get(&url("https://cal.example.com/x")).await.expect("succeeds");
    assert_eq!(clock.total_slept(), Duration::from_secs(30));
}

#[tokio::test]
async fn tls_failures_are_never_retried() {
    let http = Arc::new(MockHttpClient::new());
    http.push_error(NetworkErrorKind::Tls, "certificate verify failed");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let err = t.get(&url("https://cal.example.com/x")).await.unwrap_err();
    assert!(matches!(
        err,
        DavError::Network { kind: NetworkErrorKind::Tls, .. }
    ));
    assert_eq!(http.request_count(), 1);
    assert!(clock.sleeps.lock().unwrap().is_empty());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(404, &[], "nope");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let err = t.get(&url("https://cal.example.com/x")).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(http.request_count(), 1);
}

#[tokio::test]
async fn transient_network_errors_retry_until_exhausted() {
    let http = Arc::new(MockHttpClient::new());
    http.push_error(NetworkErrorKind::Timeout, "read timed out");
    http.push_error(NetworkErrorKind::Timeout, "read timed out");
    http.push_error(NetworkErrorKind::Timeout, "read timed out");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let err = t.get(&url("https://cal.example.com/x")).await.unwrap_err();
    assert!(matches!(
        err,
        DavError::Network { kind: NetworkErrorKind::Timeout, .. }
    ));
    // retry_max = 2 → three attempts, backoff 500 then 1000 ms.
    assert_eq!(http.request_count(), 3);
    let sleeps = clock.sleeps.lock().unwrap().clone();
    assert_eq!(
        sleeps,
        vec![Duration::from_millis(500), Duration::from_millis(1000)]
    );
}

#[tokio::test]
async fn cross_host_redirects_preserve_authorization() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(
        301,
        &[("Location", "https://p42-caldav.example.net/dav/jane/")],
        "",
    );
    http.push_response(207, &[], EMPTY_MULTISTATUS);
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::basic("jane", "pw"));

    t.propfind(
        &url("https://cal.example.com/dav/jane/"),
        "<propfind/>",
        Depth::Zero,
        false,
    )
    .await
    .expect("succeeds");

    assert_eq!(http.request_count(), 2);
    let first = http.request(0);
    let second = http.request(1);
    assert_eq!(second.uri.host(), Some("p42-caldav.example.net"));

    let auth_first = first.headers.get(header::AUTHORIZATION).expect("auth on first");
    let auth_second = second
        .headers
        .get(header::AUTHORIZATION)
        .expect("auth preserved across hosts");
    assert_eq!(auth_first, auth_second);
    assert_eq!(second.method, first.method, "verb survives the redirect");
}

#[tokio::test]
async fn redirect_loops_stop_at_the_limit() {
    let http = Arc::new(MockHttpClient::new());
    for _ in 0..10 {
        http.push_response(302, &[("Location", "https://cal.example.com/loop")], "");
    }
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let err = t.get(&url("https://cal.example.com/start")).await.unwrap_err();
    assert_eq!(err.status(), Some(302));
    // redirect_max = 5 → initial request plus five follows.
    assert_eq!(http.request_count(), 6);
}

#[tokio::test]
async fn put_if_match_sends_quoted_etag_and_maps_412() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(412, &[], "");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let err = t
        .put(
            &url("https://cal.example.com/cal/e.ics"),
            "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n",
            PutPrecondition::IfMatch("abc".to_string()),
        )
        .await
        .unwrap_err();

    match err {
        DavError::Http { code, message } => {
            assert_eq!(code, 412);
            assert!(message.contains("etag conflict"));
        }
        other => panic!("expected http error, got {other:?}"),
    }

    let request = http.request(0);
    assert_eq!(
        request.headers.get(header::IF_MATCH).unwrap().to_str().unwrap(),
        "\"abc\""
    );
    assert_eq!(
        request.headers.get(header::CONTENT_TYPE).unwrap().to_str().unwrap(),
        "text/calendar; charset=utf-8"
    );
}

#[tokio::test]
async fn put_if_none_match_maps_412_to_already_exists() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(412, &[], "");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let err = t
        .put(
            &url("https://cal.example.com/cal/e.ics"),
            "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n",
            PutPrecondition::IfNoneMatchAny,
        )
        .await
        .unwrap_err();
    assert!(format!("{err}").contains("already exists"));

    let request = http.request(0);
    assert_eq!(
        request.headers.get(header::IF_NONE_MATCH).unwrap().to_str().unwrap(),
        "*"
    );
}

#[tokio::test]
async fn put_returns_normalized_etag() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(201, &[("ETag", "\"fresh-1\"")], "");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let etag = t
        .put(
            &url("https://cal.example.com/cal/e.ics"),
            "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n",
            PutPrecondition::Unconditional,
        )
        .await
        .expect("succeeds");
    assert_eq!(etag.as_deref(), Some("fresh-1"));
}

#[tokio::test]
async fn delete_treats_404_as_success() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(404, &[], "");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    t.delete(&url("https://cal.example.com/cal/e.ics"), Some("abc"))
        .await
        .expect("404 delete is idempotent success");
    let request = http.request(0);
    assert_eq!(
        request.headers.get(header::IF_MATCH).unwrap().to_str().unwrap(),
        "\"abc\""
    );
}

#[tokio::test]
async fn oversized_responses_fail_without_retry() {
    let http = Arc::new(MockHttpClient::new());
    http.push_error(NetworkErrorKind::TooLarge, "response too large");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let err = t.get(&url("https://cal.example.com/huge.ics")).await.unwrap_err();
    assert!(matches!(
        err,
        DavError::Network { kind: NetworkErrorKind::TooLarge, .. }
    ));
    assert_eq!(http.request_count(), 1);
}

#[tokio::test]
async fn options_results_are_cached_within_ttl() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(
        200,
        &[("DAV", "1, 2, calendar-access"), ("Allow", "OPTIONS, PROPFIND, REPORT, PUT")],
        "",
    );
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);
    let target = url("https://cal.example.com/cal/");

    let first = t.options(&target).await.expect("succeeds");
    let second = t.options(&target).await.expect("served from cache");
    assert_eq!(http.request_count(), 1);
    assert_eq!(first, second);
    assert!(first.known);
    assert!(first.supports_calendar_access());
    assert!(first.supports_sync_collection());
}

#[tokio::test]
async fn options_405_degrades_to_unknown_capabilities() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(405, &[], "");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    let capabilities = t
        .options(&url("https://cal.example.com/"))
        .await
        .expect("405 is not an error");
    assert!(!capabilities.known);
    assert!(!capabilities.supports_sync_collection());
}

#[tokio::test]
async fn every_request_carries_a_user_agent() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(200, &[], "");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    t.get(&url("https://cal.example.com/x")).await.expect("succeeds");
    let ua = http.request(0);
    let ua = ua.headers.get(header::USER_AGENT).expect("user agent set");
    assert!(ua.to_str().unwrap().starts_with("caldav-sync-rs/"));
}

#[tokio::test]
async fn post_sets_recipient_and_originator_headers() {
    let http = Arc::new(MockHttpClient::new());
    http.push_response(200, &[], "<schedule-response/>");
    let clock = Arc::new(MockClock::new());
    let t = transport(http.clone(), clock.clone(), Credentials::None);

    t.post(
        &url("https://cal.example.com/outbox/"),
        "BEGIN:VCALENDAR\r\nMETHOD:REQUEST\r\nEND:VCALENDAR\r\n",
        &["bob@example.com".to_string(), "carol@example.com".to_string()],
        "jane@example.com",
    )
    .await
    .expect("succeeds");

    let request = http.request(0);
    let recipients: Vec<_> = request
        .headers
        .get_all("Recipient")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(recipients, vec!["mailto:bob@example.com", "mailto:carol@example.com"]);
    assert_eq!(
        request.headers.get("Originator").unwrap().to_str().unwrap(),
        "mailto:jane@example.com"
    );
}
