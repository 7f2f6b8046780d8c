//! Injected persistence and lookup seams.
//!
//! The engine never owns storage: the host's calendar database sits behind
//! [`LocalStore`], sync cursors behind [`StateStore`], and SRV lookup behind
//! [`DnsResolver`]. All trait methods are expected to be internally
//! synchronized.

use async_trait::async_trait;

use crate::error::DavResult;
use crate::ical::types::ICalEvent;
use crate::caldav::types::{Conflict, SyncState};

/// One entry of the host's dirty queue, in FIFO order.
#[derive(Debug, Clone)]
pub struct DirtyEvent {
    pub event: ICalEvent,
    /// Set once the event exists on the server.
    pub href: Option<String>,
    /// Unquoted etag of the last known server version.
    pub etag: Option<String>,
    /// True when the local user deleted the event and the server copy must
    /// go too.
    pub deleted: bool,
}

/// The host's calendar database, keyed by `import_id` per calendar.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Locally modified events, oldest first. The engine drains this queue
    /// in order and never reorders it.
    async fn dirty_events(&self, calendar_href: &str) -> DavResult<Vec<DirtyEvent>>;

    /// Apply a server-fetched event. Implementations replace any existing
    /// record with the same `import_id`.
    async fn upsert_server_event(
        &self,
        calendar_href: &str,
        event: &ICalEvent,
        href: &str,
        etag: Option<&str>,
    ) -> DavResult<()>;

    /// Current local copy, used for the SEQUENCE merge decision.
    async fn local_event(
        &self,
        calendar_href: &str,
        import_id: &str,
    ) -> DavResult<Option<ICalEvent>>;

    /// Remove an event the server no longer has. Unknown ids are a no-op.
    async fn remove_by_import_id(&self, calendar_href: &str, import_id: &str) -> DavResult<()>;

    /// Clear the dirty flag and record the server identity of a pushed
    /// event.
    async fn mark_synced(
        &self,
        calendar_href: &str,
        import_id: &str,
        href: &str,
        etag: Option<&str>,
    ) -> DavResult<()>;

    /// Preserve the losing side of a concurrent modification.
    async fn record_conflict(&self, calendar_href: &str, conflict: &Conflict) -> DavResult<()>;

    /// Reverse lookup for deletions reported by href only.
    async fn import_id_for_href(
        &self,
        calendar_href: &str,
        href: &str,
    ) -> DavResult<Option<String>>;
}

/// Persistence for [`SyncState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, calendar_url: &str) -> DavResult<Option<SyncState>>;
    async fn save(&self, state: &SyncState) -> DavResult<()>;
}

/// One DNS SRV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// SRV lookup seam; hosts wire in their resolver of choice.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Records for a service name such as `_caldavs._tcp.example.com`.
    /// An empty vec means the name exists but has no records.
    async fn resolve_srv(&self, name: &str) -> DavResult<Vec<SrvRecord>>;
}
