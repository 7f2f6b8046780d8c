//! WebDAV verb surface with retry, redirect-preserving authentication,
//! conditional-update discipline, and a capability cache.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::{HeaderMap, Method, StatusCode, Uri, header};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::clock::{Clock, SystemClock};
use crate::common::http::{HttpClient, HttpRequest, HttpResponse, HyperHttpClient};
use crate::error::{DavError, DavResult, NetworkErrorKind};
use crate::webdav::multistatus::{normalize_etag, parse_multistatus};
use crate::webdav::types::{Capabilities, Depth, MultiStatus};

const BACKOFF_INITIAL: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_millis(2000);
const RATE_LIMIT_FALLBACK: Duration = Duration::from_secs(30);
const CAPABILITY_CACHE_MAX: usize = 100;

/// Authentication material. The `Debug` impl never prints the secret.
#[derive(Clone)]
pub enum Credentials {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    fn header_value(&self) -> DavResult<Option<header::HeaderValue>> {
        match self {
            Self::None => Ok(None),
            Self::Basic { username, password } => {
                let token = B64.encode(format!("{username}:{password}"));
                Ok(Some(header::HeaderValue::from_str(&format!(
                    "Basic {token}"
                ))?))
            }
            Self::Bearer { token } => Ok(Some(header::HeaderValue::from_str(&format!(
                "Bearer {token}"
            ))?)),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("Credentials::None"),
            Self::Basic { username, .. } => f
                .debug_struct("Credentials::Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Credentials::Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Transport tuning, mirroring the `caldav.*` configuration keys.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Bounds the whole exchange; intentionally long, large calendars take
    /// a while to stream.
    pub read_timeout: Duration,
    /// Request-body send bound, for [`crate::common::http::HttpClient`]
    /// implementations that enforce it separately. The bundled client folds
    /// it into the exchange bound.
    pub write_timeout: Duration,
    pub retry_max: u32,
    pub max_response_bytes: usize,
    pub redirect_max: u32,
    pub capabilities_ttl: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(300),
            write_timeout: Duration::from_secs(60),
            retry_max: 2,
            max_response_bytes: 10 * 1024 * 1024,
            redirect_max: 5,
            capabilities_ttl: Duration::from_secs(3600),
            user_agent: concat!("caldav-sync-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Conditional-update policy for `PUT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutPrecondition {
    /// `If-None-Match: *`; creation only.
    IfNoneMatchAny,
    /// `If-Match: "<etag>"`; update only. The etag is stored unquoted and
    /// re-quoted here.
    IfMatch(String),
    Unconditional,
}

struct CapabilityEntry {
    capabilities: Capabilities,
    inserted: DateTime<Utc>,
}

/// One function per verb; every operation returns a [`DavResult`].
///
/// A transport is cheap to share (`Arc` it) and safe for concurrent use;
/// the capability cache is its only mutable state.
pub struct WebDavTransport {
    http: Arc<dyn HttpClient>,
    credentials: Credentials,
    config: TransportConfig,
    clock: Arc<dyn Clock>,
    capabilities: Mutex<HashMap<String, CapabilityEntry>>,
}

impl WebDavTransport {
    pub fn new(http: Arc<dyn HttpClient>, credentials: Credentials, config: TransportConfig) -> Self {
        Self::with_clock(http, credentials, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        http: Arc<dyn HttpClient>,
        credentials: Credentials,
        config: TransportConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            credentials,
            config,
            clock,
            capabilities: Mutex::new(HashMap::new()),
        }
    }

    /// Bundled-client convenience constructor.
    pub fn with_hyper(credentials: Credentials, config: TransportConfig) -> Self {
        let http = Arc::new(HyperHttpClient::new(config.connect_timeout));
        Self::new(http, credentials, config)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    // ----------- Core send: retry loop around redirect-following -----------

    async fn send(
        &self,
        method: Method,
        url: &Uri,
        mut headers: HeaderMap,
        body: Option<Bytes>,
    ) -> DavResult<HttpResponse> {
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&self.config.user_agent)?,
        );
        // The bundled client does not decode compressed bodies; say so.
        headers.insert(
            header::ACCEPT_ENCODING,
            header::HeaderValue::from_static("identity"),
        );
        if let Some(auth) = self.credentials.header_value()? {
            headers.insert(header::AUTHORIZATION, auth);
        }

        let mut attempt: u32 = 0;
        let mut backoff = BACKOFF_INITIAL;

        loop {
            let result = self
                .send_following_redirects(method.clone(), url.clone(), headers.clone(), body.clone())
                .await;

            let retry_after = match &result {
                Ok(resp) if resp.status == StatusCode::TOO_MANY_REQUESTS => {
                    Some(parse_retry_after(&resp.headers).unwrap_or(RATE_LIMIT_FALLBACK))
                }
                Ok(resp) if resp.status.is_server_error() => Some(backoff),
                Ok(_) => None,
                Err(DavError::Network { kind, .. }) if kind.is_transient() => Some(backoff),
                Err(_) => None,
            };

            match retry_after {
                Some(delay) if attempt < self.config.retry_max => {
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        method = %method,
                        "retrying after transient failure"
                    );
                    self.clock.sleep(delay).await;
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
                _ => return result,
            }
        }
    }

    /// Follow 3xx manually so the `Authorization` header survives host
    /// changes (iCloud redirects to partition hosts and expects it to).
    async fn send_following_redirects(
        &self,
        method: Method,
        mut url: Uri,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> DavResult<HttpResponse> {
        let mut redirects: u32 = 0;

        loop {
            let request = HttpRequest {
                method: method.clone(),
                uri: url.clone(),
                headers: headers.clone(),
                body: body.clone(),
                read_timeout: self.config.read_timeout,
                max_response_bytes: self.config.max_response_bytes,
            };
            let response = self.http.execute(request).await?;

            if !matches!(
                response.status,
                StatusCode::MOVED_PERMANENTLY
                    | StatusCode::FOUND
                    | StatusCode::SEE_OTHER
                    | StatusCode::TEMPORARY_REDIRECT
                    | StatusCode::PERMANENT_REDIRECT
            ) {
                return Ok(response);
            }

            redirects += 1;
            if redirects > self.config.redirect_max {
                // Hand the last 3xx back; the verb's status check turns it
                // into an HttpError and the retry loop leaves 3xx alone.
                tracing::warn!(url = %url, "redirect limit exceeded");
                return Ok(response);
            }

            let location = response
                .headers
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    DavError::network(NetworkErrorKind::Io, "redirect without Location header")
                })?;
            let next = resolve_location(&url, location)?;
            tracing::debug!(from = %url, to = %next, "following redirect");
            url = next;
        }
    }

    fn xml_headers(depth: Option<Depth>, prefer_minimal: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        if let Some(depth) = depth {
            headers.insert("Depth", header::HeaderValue::from_static(depth.as_str()));
        }
        if prefer_minimal {
            headers.insert("Prefer", header::HeaderValue::from_static("return=minimal"));
        }
        headers
    }

    fn expect_multistatus(response: HttpResponse) -> DavResult<MultiStatus> {
        if !response.status.is_success() {
            return Err(http_error(&response));
        }
        parse_multistatus(&response.body)
    }

    // ----------- Verbs -----------

    pub async fn propfind(
        &self,
        url: &Uri,
        body: &str,
        depth: Depth,
        prefer_minimal: bool,
    ) -> DavResult<MultiStatus> {
        let headers = Self::xml_headers(Some(depth), prefer_minimal);
        let response = self
            .send(
                Method::from_bytes(b"PROPFIND").expect("valid method"),
                url,
                headers,
                Some(Bytes::from(body.to_owned())),
            )
            .await?;
        Self::expect_multistatus(response)
    }

    pub async fn report(
        &self,
        url: &Uri,
        body: &str,
        depth: Depth,
        prefer_minimal: bool,
    ) -> DavResult<MultiStatus> {
        let headers = Self::xml_headers(Some(depth), prefer_minimal);
        let response = self
            .send(
                Method::from_bytes(b"REPORT").expect("valid method"),
                url,
                headers,
                Some(Bytes::from(body.to_owned())),
            )
            .await?;
        Self::expect_multistatus(response)
    }

    /// Raw REPORT for callers that need the status code alongside the body
    /// (the sync engine inspects 403/410/412 bodies for token invalidation).
    pub async fn report_raw(
        &self,
        url: &Uri,
        body: &str,
        depth: Depth,
        prefer_minimal: bool,
    ) -> DavResult<HttpResponse> {
        let headers = Self::xml_headers(Some(depth), prefer_minimal);
        self.send(
            Method::from_bytes(b"REPORT").expect("valid method"),
            url,
            headers,
            Some(Bytes::from(body.to_owned())),
        )
        .await
    }

    /// `OPTIONS`, cached per URL for the configured TTL. A 405 answer maps
    /// to [`Capabilities::unknown`] so callers degrade gracefully.
    pub async fn options(&self, url: &Uri) -> DavResult<Capabilities> {
        let key = url.to_string();
        if let Some(cached) = self.cached_capabilities(&key) {
            return Ok(cached);
        }

        let response = self.send(Method::OPTIONS, url, HeaderMap::new(), None).await?;
        let capabilities = if response.status == StatusCode::METHOD_NOT_ALLOWED {
            Capabilities::unknown()
        } else if response.status.is_success() {
            Capabilities::from_headers(&response.headers)
        } else {
            return Err(http_error(&response));
        };

        self.store_capabilities(key, capabilities.clone());
        Ok(capabilities)
    }

    pub async fn get(&self, url: &Uri) -> DavResult<(String, Option<String>)> {
        let response = self.send(Method::GET, url, HeaderMap::new(), None).await?;
        if !response.status.is_success() {
            return Err(http_error(&response));
        }
        let etag = response.etag_header().map(|e| normalize_etag(&e));
        let body = String::from_utf8_lossy(&response.body).into_owned();
        Ok((body, etag))
    }

    /// `HEAD`, for refreshing an etag without fetching the body.
    pub async fn head(&self, url: &Uri) -> DavResult<Option<String>> {
        let response = self.send(Method::HEAD, url, HeaderMap::new(), None).await?;
        if !response.status.is_success() {
            return Err(http_error(&response));
        }
        Ok(response.etag_header().map(|e| normalize_etag(&e)))
    }

    /// `PUT` an iCalendar body. Returns the new etag when the server
    /// provides one (many do not; callers fall back to [`Self::head`]).
    pub async fn put(
        &self,
        url: &Uri,
        body: &str,
        precondition: PutPrecondition,
    ) -> DavResult<Option<String>> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/calendar; charset=utf-8"),
        );
        match &precondition {
            PutPrecondition::IfNoneMatchAny => {
                headers.insert(header::IF_NONE_MATCH, header::HeaderValue::from_static("*"));
            }
            PutPrecondition::IfMatch(etag) => {
                headers.insert(header::IF_MATCH, quoted_etag_value(etag)?);
            }
            PutPrecondition::Unconditional => {}
        }

        let response = self
            .send(Method::PUT, url, headers, Some(Bytes::from(body.to_owned())))
            .await?;

        if response.status == StatusCode::PRECONDITION_FAILED {
            let message = match precondition {
                PutPrecondition::IfNoneMatchAny => "resource already exists",
                _ => "etag conflict",
            };
            return Err(DavError::http(412, message));
        }
        if !response.status.is_success() {
            return Err(http_error(&response));
        }
        Ok(response.etag_header().map(|e| normalize_etag(&e)))
    }

    /// `DELETE`, optionally guarded by `If-Match`. A 404 answer is
    /// idempotent success: the resource is gone either way.
    pub async fn delete(&self, url: &Uri, etag: Option<&str>) -> DavResult<()> {
        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            headers.insert(header::IF_MATCH, quoted_etag_value(etag)?);
        }
        let response = self.send(Method::DELETE, url, headers, None).await?;
        if response.status == StatusCode::NOT_FOUND || response.status.is_success() {
            return Ok(());
        }
        Err(http_error(&response))
    }

    pub async fn mkcalendar(&self, url: &Uri, body: &str) -> DavResult<()> {
        let headers = Self::xml_headers(None, false);
        let response = self
            .send(
                Method::from_bytes(b"MKCALENDAR").expect("valid method"),
                url,
                headers,
                Some(Bytes::from(body.to_owned())),
            )
            .await?;
        if !response.status.is_success() {
            return Err(http_error(&response));
        }
        Ok(())
    }

    pub async fn acl(&self, url: &Uri, body: &str) -> DavResult<()> {
        let headers = Self::xml_headers(None, false);
        let response = self
            .send(
                Method::from_bytes(b"ACL").expect("valid method"),
                url,
                headers,
                Some(Bytes::from(body.to_owned())),
            )
            .await?;
        if !response.status.is_success() {
            return Err(http_error(&response));
        }
        Ok(())
    }

    /// Schedule-outbox `POST` of an iTIP message (RFC 6638): one
    /// `Recipient` header per attendee plus the `Originator`.
    pub async fn post(
        &self,
        url: &Uri,
        itip_body: &str,
        recipients: &[String],
        originator: &str,
    ) -> DavResult<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/calendar; charset=utf-8"),
        );
        headers.insert(
            "Originator",
            header::HeaderValue::from_str(&format!("mailto:{originator}"))?,
        );
        for recipient in recipients {
            headers.append(
                "Recipient",
                header::HeaderValue::from_str(&format!("mailto:{recipient}"))?,
            );
        }

        let response = self
            .send(
                Method::POST,
                url,
                headers,
                Some(Bytes::from(itip_body.to_owned())),
            )
            .await?;
        if !response.status.is_success() {
            return Err(http_error(&response));
        }
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }

    // ----------- Capability cache -----------

    fn cached_capabilities(&self, key: &str) -> Option<Capabilities> {
        let cache = self.capabilities.lock().ok()?;
        let entry = cache.get(key)?;
        let age = self.clock.now_utc().signed_duration_since(entry.inserted);
        if age.to_std().ok()? <= self.config.capabilities_ttl {
            Some(entry.capabilities.clone())
        } else {
            None
        }
    }

    fn store_capabilities(&self, key: String, capabilities: Capabilities) {
        let Ok(mut cache) = self.capabilities.lock() else {
            return;
        };
        if cache.len() >= CAPABILITY_CACHE_MAX && !cache.contains_key(&key) {
            // Evict the entry discovered longest ago.
            if let Some(oldest) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(k, _)| k.clone())
            {
                cache.remove(&oldest);
            }
        }
        cache.insert(
            key,
            CapabilityEntry {
                capabilities,
                inserted: self.clock.now_utc(),
            },
        );
    }
}

fn http_error(response: &HttpResponse) -> DavError {
    let reason = response
        .status
        .canonical_reason()
        .unwrap_or("unexpected status");
    DavError::http(response.status.as_u16(), reason)
}

/// Stored etags are unquoted; the wire form is quoted.
fn quoted_etag_value(etag: &str) -> DavResult<header::HeaderValue> {
    if etag.is_empty() {
        return Err(DavError::parse("empty etag"));
    }
    let quoted = if etag.starts_with('"') {
        etag.to_string()
    } else {
        format!("\"{etag}\"")
    };
    Ok(header::HeaderValue::from_str(&quoted)?)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Resolve a `Location` header (or any href) against the URL that produced
/// it: absolute URLs pass through, absolute paths keep the origin, relative
/// paths resolve against the parent collection.
pub fn resolve_location(base: &Uri, location: &str) -> DavResult<Uri> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(location.parse()?);
    }

    let mut parts = base.clone().into_parts();
    let path = if location.starts_with('/') {
        location.to_string()
    } else {
        let base_path = base.path();
        let parent = match base_path.rfind('/') {
            Some(idx) => &base_path[..idx + 1],
            None => "/",
        };
        format!("{parent}{location}")
    };
    parts.path_and_query = Some(path.parse()?);
    Ok(Uri::from_parts(parts)?)
}
