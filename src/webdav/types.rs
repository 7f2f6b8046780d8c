use hyper::HeaderMap;

/// WebDAV Depth header value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

/// One `<response>` extracted from a multistatus document.
///
/// Typed fields are filled only from propstat blocks whose status was 2xx;
/// `present` records every property element seen regardless of its status,
/// including self-closing ones.
#[derive(Debug, Clone, Default)]
pub struct DavResponse {
    pub href: String,
    /// Per-response `<status>` (sync-collection uses it for deletions).
    pub status_code: Option<u16>,
    pub etag: Option<String>,
    pub calendar_data: Option<String>,
    pub displayname: Option<String>,
    pub is_collection: bool,
    pub is_calendar: bool,
    pub is_principal: bool,
    pub supported_components: Vec<String>,
    pub calendar_color: Option<String>,
    pub calendar_description: Option<String>,
    pub ctag: Option<String>,
    pub sync_token: Option<String>,
    pub current_user_principal: Option<String>,
    pub calendar_home_set: Vec<String>,
    pub schedule_inbox: Option<String>,
    pub schedule_outbox: Option<String>,
    pub owner: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub read_only: bool,
    /// Lower-cased local names of every property element present.
    pub present: Vec<String>,
}

impl DavResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_property(&self, local_name: &str) -> bool {
        self.present
            .iter()
            .any(|p| p.eq_ignore_ascii_case(local_name))
    }

    /// Whether this entry reports a deleted resource (sync-collection).
    pub fn is_deleted(&self) -> bool {
        matches!(self.status_code, Some(404) | Some(410))
    }
}

/// A parsed `207 Multi-Status` document.
#[derive(Debug, Clone, Default)]
pub struct MultiStatus {
    pub responses: Vec<DavResponse>,
    /// Top-level `<sync-token>` (RFC 6578).
    pub sync_token: Option<String>,
}

/// Server capabilities gathered from an `OPTIONS` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    /// Compliance classes from the `DAV:` header (`1`, `2`, `3`,
    /// `calendar-access`, `calendar-schedule`, ...).
    pub dav_classes: Vec<String>,
    /// Methods from the `Allow:` header.
    pub allow: Vec<String>,
    /// False when the server answered 405 and nothing could be learned.
    pub known: bool,
}

impl Capabilities {
    /// Placeholder when a server rejects OPTIONS outright.
    pub fn unknown() -> Self {
        Self {
            dav_classes: Vec::new(),
            allow: Vec::new(),
            known: false,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let split = |value: Option<&hyper::header::HeaderValue>| -> Vec<String> {
            value
                .and_then(|v| v.to_str().ok())
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            dav_classes: split(headers.get("DAV")),
            allow: split(headers.get("Allow")),
            known: true,
        }
    }

    pub fn supports_calendar_access(&self) -> bool {
        self.dav_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case("calendar-access"))
    }

    pub fn supports_scheduling(&self) -> bool {
        self.dav_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case("calendar-auto-schedule") || c.eq_ignore_ascii_case("calendar-schedule"))
    }

    /// Whether `sync-collection` REPORTs are worth attempting. Servers do
    /// not announce RFC 6578 in the `DAV:` header uniformly, so an
    /// advertised REPORT method counts too.
    pub fn supports_sync_collection(&self) -> bool {
        self.dav_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case("sync-collection"))
            || self.allow.iter().any(|m| m.eq_ignore_ascii_case("REPORT"))
    }
}
