//! Typed CalDAV operations layered over [`WebDavTransport`].
//!
//! Thin wrappers: compose a request body, issue the verb, map the
//! multistatus into calendar-domain values.

use futures::{StreamExt, stream::FuturesOrdered};
use hyper::Uri;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::common::http::HttpResponse;
use crate::error::{DavError, DavResult};
use crate::webdav::acl::{Ace, acl_request_body};
use crate::webdav::transport::{PutPrecondition, WebDavTransport, resolve_location};
use crate::webdav::types::{Capabilities, DavResponse, Depth, MultiStatus};
use crate::webdav::xml;
use crate::caldav::types::{Calendar, FetchedObject};

#[derive(Clone)]
pub struct CalDavClient {
    transport: Arc<WebDavTransport>,
    base: Uri,
}

impl CalDavClient {
    pub fn new(transport: Arc<WebDavTransport>, base_url: &str) -> DavResult<Self> {
        let base: Uri = base_url.parse()?;
        if base.scheme().is_none() || base.authority().is_none() {
            return Err(DavError::parse(format!("base url is not absolute: {base_url}")));
        }
        Ok(Self { transport, base })
    }

    pub fn transport(&self) -> &WebDavTransport {
        &self.transport
    }

    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// Resolve a server-supplied href against this client's origin.
    pub fn build_uri(&self, href: &str) -> DavResult<Uri> {
        resolve_location(&self.base, href)
    }

    pub async fn capabilities(&self, href: &str) -> DavResult<Capabilities> {
        let url = self.build_uri(href)?;
        self.transport.options(&url).await
    }

    /// Depth:1 enumeration of the collections under a calendar home.
    pub async fn list_calendars(&self, home_href: &str) -> DavResult<Vec<Calendar>> {
        let url = self.build_uri(home_href)?;
        let multistatus = self
            .transport
            .propfind(&url, &xml::propfind_calendars(), Depth::One, false)
            .await?;

        let mut calendars: Vec<Calendar> = multistatus
            .responses
            .into_iter()
            .filter(|r| r.is_calendar)
            .map(map_calendar)
            .collect();
        calendars.sort_by(|a, b| a.href.cmp(&b.href));
        Ok(calendars)
    }

    /// Current change indicators of one collection.
    pub async fn fetch_change_tags(
        &self,
        calendar_href: &str,
    ) -> DavResult<(Option<String>, Option<String>)> {
        let url = self.build_uri(calendar_href)?;
        let multistatus = self
            .transport
            .propfind(&url, &xml::propfind_ctag_and_sync_token(), Depth::Zero, false)
            .await?;
        let first = multistatus.responses.into_iter().next().unwrap_or_default();
        Ok((first.ctag, first.sync_token))
    }

    /// Etag-only calendar-query over a time window; the fallback sync path
    /// diffs this map against the stored one.
    pub async fn query_etags(
        &self,
        calendar_href: &str,
        time_range: Option<(&str, &str)>,
    ) -> DavResult<HashMap<String, String>> {
        let url = self.build_uri(calendar_href)?;
        let body = xml::calendar_query_etag_only("VEVENT", time_range);
        let multistatus = self.transport.report(&url, &body, Depth::One, true).await?;

        let mut etags = HashMap::new();
        for response in multistatus.responses {
            if let Some(etag) = response.etag
                && !response.href.is_empty()
            {
                etags.insert(response.href, etag);
            }
        }
        Ok(etags)
    }

    /// Full calendar-query with data.
    pub async fn calendar_query(
        &self,
        calendar_href: &str,
        time_range: Option<(&str, &str)>,
    ) -> DavResult<Vec<FetchedObject>> {
        let url = self.build_uri(calendar_href)?;
        let body = xml::calendar_query("VEVENT", time_range);
        let multistatus = self.transport.report(&url, &body, Depth::One, false).await?;
        Ok(map_objects(multistatus))
    }

    /// Fetch a batch of objects by href.
    pub async fn multiget(
        &self,
        calendar_href: &str,
        hrefs: &[String],
    ) -> DavResult<Vec<FetchedObject>> {
        let Some(body) = xml::calendar_multiget(hrefs.iter().map(String::as_str)) else {
            return Ok(Vec::new());
        };
        let url = self.build_uri(calendar_href)?;
        let multistatus = self.transport.report(&url, &body, Depth::One, false).await?;
        Ok(map_objects(multistatus))
    }

    /// Multiget a large href list as multiple REPORTs with a
    /// semaphore-bound concurrency limit. Results keep input-chunk order.
    pub async fn multiget_batched(
        &self,
        calendar_href: &str,
        hrefs: &[String],
        batch_size: usize,
        max_concurrency: usize,
    ) -> DavResult<Vec<FetchedObject>> {
        let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let mut tasks = FuturesOrdered::new();

        for chunk in hrefs.chunks(batch_size.max(1)) {
            let this = self.clone();
            let calendar = calendar_href.to_string();
            let chunk: Vec<String> = chunk.to_vec();
            let sem = sem.clone();
            tasks.push_back(async move {
                let _permit: OwnedSemaphorePermit =
                    sem.acquire_owned().await.expect("semaphore closed");
                this.multiget(&calendar, &chunk).await
            });
        }

        let mut out = Vec::new();
        while let Some(result) = tasks.next().await {
            out.extend(result?);
        }
        Ok(out)
    }

    /// `sync-collection` REPORT, returned raw: the engine needs the status
    /// code and body to recognize an invalidated token.
    pub async fn sync_collection_raw(
        &self,
        calendar_href: &str,
        sync_token: Option<&str>,
    ) -> DavResult<HttpResponse> {
        let url = self.build_uri(calendar_href)?;
        let body = xml::sync_collection(sync_token, None);
        self.transport.report_raw(&url, &body, Depth::One, true).await
    }

    /// `PUT` an event body at an href inside the calendar collection.
    pub async fn put_event(
        &self,
        event_href: &str,
        ical_body: &str,
        precondition: PutPrecondition,
    ) -> DavResult<Option<String>> {
        let url = self.build_uri(event_href)?;
        self.transport.put(&url, ical_body, precondition).await
    }

    /// Etag refresh for servers whose `PUT` response omits one.
    pub async fn fetch_etag(&self, event_href: &str) -> DavResult<Option<String>> {
        let url = self.build_uri(event_href)?;
        self.transport.head(&url).await
    }

    /// Fetch one event resource.
    pub async fn get_event(&self, event_href: &str) -> DavResult<(String, Option<String>)> {
        let url = self.build_uri(event_href)?;
        self.transport.get(&url).await
    }

    pub async fn delete_event(&self, event_href: &str, etag: Option<&str>) -> DavResult<()> {
        let url = self.build_uri(event_href)?;
        self.transport.delete(&url, etag).await
    }

    pub async fn mkcalendar(
        &self,
        calendar_href: &str,
        props: &xml::MkCalendarProps,
    ) -> DavResult<()> {
        let url = self.build_uri(calendar_href)?;
        self.transport.mkcalendar(&url, &xml::mkcalendar(props)).await
    }

    pub async fn set_acl(&self, href: &str, aces: &[Ace]) -> DavResult<()> {
        let url = self.build_uri(href)?;
        self.transport.acl(&url, &acl_request_body(aces)).await
    }

    /// Post an iTIP message to the schedule outbox (RFC 6638).
    pub async fn schedule_post(
        &self,
        outbox_href: &str,
        itip_body: &str,
        recipients: &[String],
        originator: &str,
    ) -> DavResult<String> {
        let url = self.build_uri(outbox_href)?;
        self.transport
            .post(&url, itip_body, recipients, originator)
            .await
    }

    /// `free-busy-query` REPORT over a window; returns the raw VFREEBUSY
    /// payloads.
    pub async fn free_busy(
        &self,
        calendar_href: &str,
        start: &str,
        end: &str,
    ) -> DavResult<Vec<FetchedObject>> {
        let url = self.build_uri(calendar_href)?;
        let body = xml::free_busy_query(start, end);
        let multistatus = self.transport.report(&url, &body, Depth::One, false).await?;
        Ok(map_objects(multistatus))
    }
}

fn map_calendar(response: DavResponse) -> Calendar {
    Calendar {
        href: response.href,
        display_name: response.displayname,
        description: response.calendar_description,
        color: response.calendar_color,
        ctag: response.ctag,
        sync_token: response.sync_token,
        read_only: response.read_only,
        supported_components: response.supported_components,
    }
}

fn map_objects(multistatus: MultiStatus) -> Vec<FetchedObject> {
    multistatus
        .responses
        .into_iter()
        .filter(|r| !r.href.is_empty() && !r.is_collection)
        .map(|r| FetchedObject {
            href: r.href,
            etag: r.etag,
            calendar_data: r.calendar_data,
        })
        .collect()
}
