pub mod acl;
pub mod multistatus;
pub mod transport;
pub mod types;
pub mod xml;

pub use acl::{Ace, AclPrincipal, Privilege, acl_request_body, parse_acl};
pub use multistatus::{normalize_etag, parse_multistatus, percent_decode_href};
pub use transport::{
    Credentials, PutPrecondition, TransportConfig, WebDavTransport, resolve_location,
};
pub use types::{Capabilities, DavResponse, Depth, MultiStatus};
