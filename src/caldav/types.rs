use std::collections::HashMap;

use crate::ical::types::ICalEvent;

/// Summary of one calendar collection discovered under a home set.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub href: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub ctag: Option<String>,
    pub sync_token: Option<String>,
    pub read_only: bool,
    pub supported_components: Vec<String>,
}

impl Calendar {
    pub fn supports_events(&self) -> bool {
        self.supported_components.is_empty()
            || self
                .supported_components
                .iter()
                .any(|c| c.eq_ignore_ascii_case("VEVENT"))
    }
}

/// Everything discovery learns about a server account.
#[derive(Debug, Clone, Default)]
pub struct CalDavAccount {
    /// Origin (scheme + authority) every relative href resolves against.
    pub server_url: String,
    pub principal_url: String,
    pub calendar_home_url: String,
    pub schedule_inbox_url: Option<String>,
    pub schedule_outbox_url: Option<String>,
    pub calendars: Vec<Calendar>,
}

/// Persisted synchronization cursor for one calendar, kept by the host via
/// [`crate::caldav::stores::StateStore`]. ETags are stored unquoted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    pub calendar_url: String,
    pub sync_token: Option<String>,
    pub ctag: Option<String>,
    /// href → etag for every event the engine has seen.
    pub etags: HashMap<String, String>,
}

impl SyncState {
    pub fn new(calendar_url: impl Into<String>) -> Self {
        Self {
            calendar_url: calendar_url.into(),
            ..Self::default()
        }
    }
}

/// Both sides of a concurrent modification, surfaced to the caller when the
/// engine resolves it (server wins by default, the local copy is preserved
/// here).
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub import_id: String,
    pub local: ICalEvent,
    pub remote: Option<ICalEvent>,
}

/// Aggregate result of one [`crate::caldav::sync::SyncEngine::sync`] run.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub pulled_upserts: usize,
    pub pulled_deletes: usize,
    pub pushed_creates: usize,
    pub pushed_updates: usize,
    pub pushed_deletes: usize,
    /// Dirty entries that failed this run and stay queued.
    pub push_failures: usize,
    pub conflicts: Vec<Conflict>,
}

/// Per-calendar engine state, driven by an external scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Unsynced,
    Ready,
    Checking,
    Syncing,
    Resyncing,
    Error,
}

/// An object fetched from the server: the raw payload plus its etag.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub href: String,
    pub etag: Option<String>,
    pub calendar_data: Option<String>,
}
