use thiserror::Error;

/// Result alias used by every protocol-facing operation in this crate.
pub type DavResult<T> = Result<T, DavError>;

/// Failure classes a transport-layer error can belong to.
///
/// The distinction matters for the retry policy: everything except `Tls`,
/// `Cancelled`, and `TooLarge` is considered transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    Cancelled,
    TooLarge,
    Io,
}

impl NetworkErrorKind {
    /// Whether the transport may retry an operation that failed this way.
    ///
    /// TLS failures are never retried: a handshake that stops validating
    /// half-way through a session can indicate interception. Cancellation
    /// is a caller decision and a size-limit violation will not shrink on
    /// retry.
    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Tls | Self::Cancelled | Self::TooLarge)
    }
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Cancelled => "cancelled",
            Self::TooLarge => "response too large",
            Self::Io => "io",
        };
        f.write_str(s)
    }
}

/// The error side of [`DavResult`].
///
/// Every foreign error (HTTP library, XML library, chrono, ...) is mapped
/// into one of these three variants at the layer boundary where it occurs;
/// none of them escape the transport or codec surfaces.
#[derive(Debug, Error)]
pub enum DavError {
    /// The server answered with a status the operation cannot salvage.
    #[error("http {code}: {message}")]
    Http { code: u16, message: String },

    /// The transport failed before a usable response existed.
    #[error("network ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// A codec could not decode its input.
    ///
    /// `raw` carries the offending bytes for diagnostics. Callers may log
    /// it but must not persist it unless explicitly configured to.
    #[error("parse: {message}")]
    Parse {
        message: String,
        raw: Option<String>,
    },
}

impl DavError {
    pub fn http(code: u16, message: impl Into<String>) -> Self {
        Self::Http {
            code,
            message: message.into(),
        }
    }

    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            raw: None,
        }
    }

    pub fn parse_with_raw(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            raw: Some(raw.into()),
        }
    }

    /// HTTP status code, when this is a [`DavError::Http`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Network {
                kind: NetworkErrorKind::Cancelled,
                ..
            }
        )
    }
}

impl From<quick_xml::Error> for DavError {
    fn from(value: quick_xml::Error) -> Self {
        Self::parse(format!("xml: {value}"))
    }
}

impl From<quick_xml::events::attributes::AttrError> for DavError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Self::parse(format!("xml attribute: {value}"))
    }
}

impl From<std::str::Utf8Error> for DavError {
    fn from(value: std::str::Utf8Error) -> Self {
        Self::parse(format!("utf-8: {value}"))
    }
}

impl From<std::num::ParseIntError> for DavError {
    fn from(value: std::num::ParseIntError) -> Self {
        Self::parse(format!("number: {value}"))
    }
}

impl From<hyper::http::uri::InvalidUri> for DavError {
    fn from(value: hyper::http::uri::InvalidUri) -> Self {
        Self::network(NetworkErrorKind::Io, format!("invalid uri: {value}"))
    }
}

impl From<hyper::http::uri::InvalidUriParts> for DavError {
    fn from(value: hyper::http::uri::InvalidUriParts) -> Self {
        Self::network(NetworkErrorKind::Io, format!("invalid uri: {value}"))
    }
}

impl From<hyper::header::InvalidHeaderValue> for DavError {
    fn from(value: hyper::header::InvalidHeaderValue) -> Self {
        Self::network(NetworkErrorKind::Io, format!("invalid header: {value}"))
    }
}
