use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{HeaderMap, Method, Request, StatusCode, Uri, header};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use tokio::time::{Duration, timeout};

use crate::error::{DavError, NetworkErrorKind};

/// Type alias for the bundled Hyper client.
pub type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// A single HTTP exchange as the transport composes it.
///
/// `read_timeout` bounds the whole exchange; `max_response_bytes` caps how
/// much body an implementation may aggregate.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub read_timeout: Duration,
    pub max_response_bytes: usize,
}

/// Aggregated response handed back to the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// `ETag` response header value, verbatim (quotes included).
    pub fn etag_header(&self) -> Option<String> {
        self.headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

/// The injected HTTP seam.
///
/// The crate ships [`HyperHttpClient`]; hosts with their own connection
/// management plug in anything satisfying this trait. Implementations must
/// be shareable across tasks (the transport holds an `Arc`).
///
/// Cancellation is cooperative: dropping the returned future must abort the
/// in-flight exchange and release the connection. An implementation that
/// races an external cancellation token reports it as
/// [`NetworkErrorKind::Cancelled`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, DavError>;
}

/// Bundled [`HttpClient`] built on **hyper 1.x** + **rustls**.
///
/// HTTP/2 multiplexing, connection pooling, and a TLS connector that prefers
/// native roots but falls back to the bundled WebPKI store. Redirects are
/// not followed here; the transport handles them so the `Authorization`
/// header survives cross-host hops.
pub struct HyperHttpClient {
    inner: HyperClient,
}

impl HyperHttpClient {
    pub fn new(connect_timeout: Duration) -> Self {
        let https_builder = HttpsConnectorBuilder::new()
            .with_native_roots()
            .unwrap_or_else(|err| {
                tracing::debug!(error = %err, "native roots unavailable, using webpki roots");
                HttpsConnectorBuilder::new().with_webpki_roots()
            });

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(connect_timeout));

        let https = https_builder
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http);

        let inner = Client::builder(TokioExecutor::new())
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(128)
            .build::<_, Full<Bytes>>(https);

        Self { inner }
    }
}

#[async_trait]
impl HttpClient for HyperHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, DavError> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(request.uri.clone());
        for (k, v) in request.headers.iter() {
            builder = builder.header(k, v);
        }

        let req = builder
            .body(Full::new(request.body.clone().unwrap_or_default()))
            .map_err(|e| DavError::network(NetworkErrorKind::Io, e.to_string()))?;

        let fut = self.inner.request(req);
        let resp = timeout(request.read_timeout, fut)
            .await
            .map_err(|_| DavError::network(NetworkErrorKind::Timeout, "request timed out"))?
            .map_err(classify_hyper_error)?;

        // A Content-Length above the ceiling is rejected before the body is touched.
        if let Some(len) = resp
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            && len > request.max_response_bytes
        {
            return Err(DavError::network(
                NetworkErrorKind::TooLarge,
                "response too large",
            ));
        }

        let (parts, body) = resp.into_parts();
        let body = timeout(
            request.read_timeout,
            aggregate_limited(body, request.max_response_bytes),
        )
        .await
        .map_err(|_| DavError::network(NetworkErrorKind::Timeout, "response body timed out"))??;

        Ok(HttpResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

/// Aggregate a body frame-by-frame, failing as soon as the running total
/// exceeds `limit` instead of buffering the remainder.
async fn aggregate_limited(mut body: Incoming, limit: usize) -> Result<Bytes, DavError> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| DavError::network(NetworkErrorKind::Io, e.to_string()))?;
        if let Some(data) = frame.data_ref() {
            if buf.len() + data.len() > limit {
                return Err(DavError::network(
                    NetworkErrorKind::TooLarge,
                    "response too large",
                ));
            }
            buf.extend_from_slice(data);
        }
    }
    Ok(Bytes::from(buf))
}

fn classify_hyper_error(err: hyper_util::client::legacy::Error) -> DavError {
    let msg = err.to_string();
    let chain = error_chain_string(&err);

    let kind =
        if chain.contains("certificate") || chain.contains("tls") || chain.contains("handshake") {
            NetworkErrorKind::Tls
        } else if chain.contains("dns") || chain.contains("failed to lookup") {
            NetworkErrorKind::Dns
        } else if err.is_connect() {
            NetworkErrorKind::Connect
        } else if chain.contains("timed out") {
            NetworkErrorKind::Timeout
        } else {
            NetworkErrorKind::Io
        };

    DavError::network(kind, msg)
}

fn error_chain_string(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string().to_ascii_lowercase();
    let mut source = err.source();
    while let Some(s) = source {
        out.push_str(": ");
        out.push_str(&s.to_string().to_ascii_lowercase());
        source = s.source();
    }
    out
}
