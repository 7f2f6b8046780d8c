//! Incremental synchronization of one calendar collection.
//!
//! A run pushes the local dirty queue (FIFO, conditional PUTs), then pulls
//! remote changes: `sync-collection` when the server supports it, the
//! ctag + etag-diff walk otherwise or after a token invalidation. Conflicts
//! resolve server-wins with the local copy preserved as a conflict record.
//!
//! One engine instance is bound to one calendar and serializes all its
//! state transitions; run engines for different calendars in parallel tasks
//! freely.

use chrono::TimeDelta;
use std::sync::Arc;

use crate::common::clock::{Clock, SystemClock};
use crate::error::{DavError, DavResult};
use crate::ical::datetime::format_utc;
use crate::ical::generator::generate_event;
use crate::ical::parser::parse_calendar;
use crate::ical::types::ICalEvent;
use crate::webdav::multistatus::parse_multistatus;
use crate::webdav::transport::PutPrecondition;
use crate::webdav::types::Capabilities;
use crate::caldav::client::CalDavClient;
use crate::caldav::provider::Provider;
use crate::caldav::stores::{DirtyEvent, LocalStore, StateStore};
use crate::caldav::types::{Conflict, EngineState, SyncOutcome, SyncState};

/// Engine tuning, mirroring the `caldav.sync.*` configuration keys.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Active window start, days before now.
    pub range_back_days: i64,
    /// Active window end, days after now.
    pub range_forward_days: i64,
    /// Drain the dirty queue before pulling (the default), or after.
    pub push_before_pull: bool,
    /// Batch size for follow-up multigets.
    pub multiget_batch_size: usize,
    /// How many multiget batches may be in flight at once.
    pub multiget_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            range_back_days: 365,
            range_forward_days: 3650,
            push_before_pull: true,
            multiget_batch_size: 50,
            multiget_concurrency: 4,
        }
    }
}

pub struct SyncEngine {
    client: CalDavClient,
    calendar_href: String,
    local: Arc<dyn LocalStore>,
    state_store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    provider: Provider,
    state: EngineState,
}

impl SyncEngine {
    pub fn new(
        client: CalDavClient,
        calendar_href: impl Into<String>,
        local: Arc<dyn LocalStore>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        let provider = Provider::detect(&client.base().to_string());
        Self {
            client,
            calendar_href: calendar_href.into(),
            local,
            state_store,
            clock: Arc::new(SystemClock),
            config: SyncConfig::default(),
            provider,
            state: EngineState::Unsynced,
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// One full reconciliation pass. On failure the persisted [`SyncState`]
    /// keeps its last successfully saved value so the next run can retry.
    pub async fn sync(&mut self) -> DavResult<SyncOutcome> {
        self.state = EngineState::Checking;
        let result = self.sync_inner().await;
        self.state = match &result {
            Ok(_) => EngineState::Ready,
            Err(_) => EngineState::Error,
        };
        result
    }

    async fn sync_inner(&mut self) -> DavResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        let mut state = self
            .state_store
            .load(&self.calendar_href)
            .await?
            .unwrap_or_else(|| SyncState::new(&self.calendar_href));

        if self.config.push_before_pull {
            self.push(&mut state, &mut outcome).await?;
            self.state_store.save(&state).await?;
        }

        self.pull(&mut state, &mut outcome).await?;
        self.state_store.save(&state).await?;

        if !self.config.push_before_pull {
            self.push(&mut state, &mut outcome).await?;
            self.state_store.save(&state).await?;
        }

        tracing::info!(
            calendar = self.calendar_href.as_str(),
            upserts = outcome.pulled_upserts,
            deletes = outcome.pulled_deletes,
            pushed = outcome.pushed_creates + outcome.pushed_updates + outcome.pushed_deletes,
            conflicts = outcome.conflicts.len(),
            "sync pass complete"
        );
        Ok(outcome)
    }

    // ----------- Push phase -----------

    async fn push(&mut self, state: &mut SyncState, outcome: &mut SyncOutcome) -> DavResult<()> {
        let dirty = self.local.dirty_events(&self.calendar_href).await?;
        if dirty.is_empty() {
            return Ok(());
        }
        self.state = EngineState::Syncing;
        tracing::debug!(count = dirty.len(), "draining dirty queue");

        for entry in dirty {
            match self.push_one(&entry, state, outcome).await {
                Ok(()) => {}
                // A dead transport fails every later item too; stop here.
                Err(e @ DavError::Network { .. }) => return Err(e),
                Err(e) => {
                    outcome.push_failures += 1;
                    tracing::warn!(
                        import_id = entry.event.import_id().as_str(),
                        error = %e,
                        "push failed, event stays queued"
                    );
                }
            }
        }
        Ok(())
    }

    async fn push_one(
        &self,
        entry: &DirtyEvent,
        state: &mut SyncState,
        outcome: &mut SyncOutcome,
    ) -> DavResult<()> {
        let import_id = entry.event.import_id();

        if entry.deleted {
            if let Some(href) = &entry.href {
                self.client
                    .delete_event(href, entry.etag.as_deref())
                    .await?;
                state.etags.remove(href);
            }
            self.local
                .remove_by_import_id(&self.calendar_href, &import_id)
                .await?;
            outcome.pushed_deletes += 1;
            return Ok(());
        }

        let body = generate_event(&entry.event);
        match &entry.href {
            // Never uploaded: create under a sanitized UID filename.
            None => {
                let href = self.event_href(&entry.event)?;
                match self
                    .client
                    .put_event(&href, &body, PutPrecondition::IfNoneMatchAny)
                    .await
                {
                    Ok(etag) => {
                        let etag = self.ensure_etag(&href, etag).await;
                        self.local
                            .mark_synced(&self.calendar_href, &import_id, &href, etag.as_deref())
                            .await?;
                        if let Some(etag) = etag {
                            state.etags.insert(href, etag);
                        }
                        outcome.pushed_creates += 1;
                        Ok(())
                    }
                    Err(e) if e.status() == Some(412) => {
                        // Someone else owns this UID already; surface the
                        // conflict and let the pull learn the server state.
                        let conflict = Conflict {
                            import_id: import_id.clone(),
                            local: entry.event.clone(),
                            remote: None,
                        };
                        self.local
                            .record_conflict(&self.calendar_href, &conflict)
                            .await?;
                        outcome.conflicts.push(conflict);
                        outcome.push_failures += 1;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            // Known on the server: guarded update.
            Some(href) => {
                let etag = entry
                    .etag
                    .clone()
                    .ok_or_else(|| DavError::parse("dirty event with href but no etag"))?;
                match self
                    .client
                    .put_event(href, &body, PutPrecondition::IfMatch(etag))
                    .await
                {
                    Ok(etag) => {
                        let etag = self.ensure_etag(href, etag).await;
                        self.local
                            .mark_synced(&self.calendar_href, &import_id, href, etag.as_deref())
                            .await?;
                        if let Some(etag) = etag {
                            state.etags.insert(href.clone(), etag);
                        }
                        outcome.pushed_updates += 1;
                        Ok(())
                    }
                    Err(e) if e.status() == Some(412) => {
                        self.resolve_push_conflict(entry, href, state, outcome).await
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Server rejected our etag: both sides changed. Default policy is
    /// server-wins; the local revision survives as a conflict record.
    async fn resolve_push_conflict(
        &self,
        entry: &DirtyEvent,
        href: &str,
        state: &mut SyncState,
        outcome: &mut SyncOutcome,
    ) -> DavResult<()> {
        let import_id = entry.event.import_id();
        let (body, etag) = self.client.get_event(href).await?;
        let remote = parse_calendar(&body)
            .ok()
            .and_then(|cal| cal.events.into_iter().next());

        let conflict = Conflict {
            import_id: import_id.clone(),
            local: entry.event.clone(),
            remote: remote.clone(),
        };
        self.local
            .record_conflict(&self.calendar_href, &conflict)
            .await?;
        outcome.conflicts.push(conflict);

        if let Some(remote) = remote {
            self.local
                .upsert_server_event(&self.calendar_href, &remote, href, etag.as_deref())
                .await?;
            outcome.pulled_upserts += 1;
        }
        if let Some(etag) = etag {
            state.etags.insert(href.to_string(), etag);
        }
        Ok(())
    }

    /// New events land at `<calendar>/<sanitized-uid>.ics`.
    fn event_href(&self, event: &ICalEvent) -> DavResult<String> {
        let sanitized = sanitize_uid(&event.uid)?;
        Ok(format!(
            "{}/{}.ics",
            self.calendar_href.trim_end_matches('/'),
            sanitized
        ))
    }

    /// Some servers answer PUT without an ETag header; refresh it then.
    async fn ensure_etag(&self, href: &str, etag: Option<String>) -> Option<String> {
        if etag.is_some() {
            return etag;
        }
        match self.client.fetch_etag(href).await {
            Ok(etag) => etag,
            Err(e) => {
                tracing::debug!(href, error = %e, "etag refresh failed");
                None
            }
        }
    }

    // ----------- Pull phase -----------

    async fn pull(&mut self, state: &mut SyncState, outcome: &mut SyncOutcome) -> DavResult<()> {
        let capabilities = match self.client.capabilities(&self.calendar_href).await {
            Ok(capabilities) => capabilities,
            Err(e) => {
                tracing::debug!(error = %e, "OPTIONS failed, assuming no sync-collection");
                Capabilities::unknown()
            }
        };

        if capabilities.supports_sync_collection() {
            self.pull_sync_collection(state, outcome).await
        } else {
            self.pull_ctag_diff(state, outcome, false).await
        }
    }

    /// RFC 6578 incremental pull.
    async fn pull_sync_collection(
        &mut self,
        state: &mut SyncState,
        outcome: &mut SyncOutcome,
    ) -> DavResult<()> {
        let response = self
            .client
            .sync_collection_raw(&self.calendar_href, state.sync_token.as_deref())
            .await?;

        if !response.status.is_success() {
            let body = String::from_utf8_lossy(&response.body);
            if self
                .provider
                .is_invalid_sync_token(response.status.as_u16(), &body)
            {
                tracing::info!(
                    calendar = self.calendar_href.as_str(),
                    "sync token invalidated by server, resyncing via ctag diff"
                );
                self.state = EngineState::Resyncing;
                state.sync_token = None;
                return self.pull_ctag_diff(state, outcome, true).await;
            }
            return Err(DavError::http(
                response.status.as_u16(),
                response.status.canonical_reason().unwrap_or("sync-collection failed"),
            ));
        }

        let multistatus = parse_multistatus(&response.body)?;
        let calendar_path = self.calendar_path();
        let mut pending_fetch: Vec<String> = Vec::new();

        for entry in &multistatus.responses {
            if entry.href.is_empty()
                || entry.href.trim_end_matches('/') == calendar_path
                || entry.is_collection
            {
                continue;
            }
            if entry.is_deleted() {
                self.apply_remote_delete(&entry.href, state, outcome).await?;
            } else if let Some(data) = &entry.calendar_data {
                self.state = EngineState::Syncing;
                self.apply_remote_data(&entry.href, entry.etag.as_deref(), data, state, outcome)
                    .await?;
            } else {
                // Data-less entry; some servers only confirm the href here.
                pending_fetch.push(entry.href.clone());
            }
        }

        self.fetch_and_apply(&pending_fetch, state, outcome).await?;

        if let Some(token) = multistatus.sync_token {
            state.sync_token = Some(token);
        }
        Ok(())
    }

    /// Fallback pull: compare the server's etag map against ours.
    async fn pull_ctag_diff(
        &mut self,
        state: &mut SyncState,
        outcome: &mut SyncOutcome,
        forced: bool,
    ) -> DavResult<()> {
        let (ctag, token) = self.client.fetch_change_tags(&self.calendar_href).await?;

        if !forced && ctag.is_some() && ctag == state.ctag {
            tracing::debug!(calendar = self.calendar_href.as_str(), "ctag unchanged");
            return Ok(());
        }
        self.state = if forced {
            EngineState::Resyncing
        } else {
            EngineState::Syncing
        };

        let window = self.time_window();
        let server_etags = self
            .client
            .query_etags(&self.calendar_href, Some((&window.0, &window.1)))
            .await?;

        let deleted: Vec<String> = state
            .etags
            .keys()
            .filter(|href| !server_etags.contains_key(*href))
            .cloned()
            .collect();
        for href in deleted {
            self.apply_remote_delete(&href, state, outcome).await?;
        }

        let to_fetch: Vec<String> = server_etags
            .iter()
            .filter(|(href, etag)| state.etags.get(*href) != Some(*etag))
            .map(|(href, _)| href.clone())
            .collect();
        self.fetch_and_apply(&to_fetch, state, outcome).await?;

        state.ctag = ctag;
        if token.is_some() {
            state.sync_token = token;
        }
        Ok(())
    }

    async fn fetch_and_apply(
        &mut self,
        hrefs: &[String],
        state: &mut SyncState,
        outcome: &mut SyncOutcome,
    ) -> DavResult<()> {
        if hrefs.is_empty() {
            return Ok(());
        }
        self.state = EngineState::Syncing;

        let objects = self
            .client
            .multiget_batched(
                &self.calendar_href,
                hrefs,
                self.config.multiget_batch_size,
                self.config.multiget_concurrency,
            )
            .await?;
        for object in objects {
            match object.calendar_data {
                Some(data) => {
                    self.apply_remote_data(
                        &object.href,
                        object.etag.as_deref(),
                        &data,
                        state,
                        outcome,
                    )
                    .await?;
                }
                None => {
                    tracing::warn!(href = object.href.as_str(), "multiget returned no data");
                }
            }
        }
        Ok(())
    }

    async fn apply_remote_delete(
        &self,
        href: &str,
        state: &mut SyncState,
        outcome: &mut SyncOutcome,
    ) -> DavResult<()> {
        if let Some(import_id) = self
            .local
            .import_id_for_href(&self.calendar_href, href)
            .await?
        {
            self.local
                .remove_by_import_id(&self.calendar_href, &import_id)
                .await?;
            outcome.pulled_deletes += 1;
        }
        state.etags.remove(href);
        Ok(())
    }

    async fn apply_remote_data(
        &self,
        href: &str,
        etag: Option<&str>,
        data: &str,
        state: &mut SyncState,
        outcome: &mut SyncOutcome,
    ) -> DavResult<()> {
        let calendar = match parse_calendar(data) {
            Ok(calendar) => calendar,
            // One broken resource must not collapse the whole pass.
            Err(e) => {
                tracing::warn!(href, error = %e, "skipping undecodable calendar object");
                return Ok(());
            }
        };

        for event in &calendar.events {
            let import_id = event.import_id();
            let local = self
                .local
                .local_event(&self.calendar_href, &import_id)
                .await?;
            if let Some(local) = &local
                && !server_wins(local, event)
            {
                tracing::debug!(
                    import_id = import_id.as_str(),
                    "local revision is newer, keeping it"
                );
                continue;
            }
            self.local
                .upsert_server_event(&self.calendar_href, event, href, etag)
                .await?;
            outcome.pulled_upserts += 1;
        }

        if let Some(etag) = etag {
            state.etags.insert(href.to_string(), etag.to_string());
        }
        Ok(())
    }

    fn calendar_path(&self) -> String {
        self.calendar_href
            .parse::<hyper::Uri>()
            .map(|u| u.path().trim_end_matches('/').to_string())
            .unwrap_or_else(|_| self.calendar_href.trim_end_matches('/').to_string())
    }

    fn time_window(&self) -> (String, String) {
        let now = self.clock.now_utc();
        let start = now - TimeDelta::days(self.config.range_back_days);
        let end = now + TimeDelta::days(self.config.range_forward_days);
        (format_utc(start), format_utc(end))
    }
}

/// SEQUENCE merge rule: higher sequence wins; on a tie the later
/// LAST-MODIFIED wins; a full tie lets the server copy through so both
/// sides converge.
fn server_wins(local: &ICalEvent, server: &ICalEvent) -> bool {
    if server.sequence != local.sequence {
        return server.sequence > local.sequence;
    }
    match (&server.last_modified, &local.last_modified) {
        (Some(s), Some(l)) if s.timestamp_utc_ms != l.timestamp_utc_ms => {
            s.timestamp_utc_ms > l.timestamp_utc_ms
        }
        _ => true,
    }
}

/// Keep `[A-Za-z0-9@._-]`, replace the rest, refuse names that would not be
/// a real path segment.
pub fn sanitize_uid(uid: &str) -> DavResult<String> {
    let sanitized: String = uid
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        return Err(DavError::parse("uid sanitizes to an unusable filename"));
    }
    Ok(sanitized)
}
