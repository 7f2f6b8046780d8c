//! Account bootstrapping: server URL or email address → principal →
//! calendar home → calendar list.
//!
//! The walk is the standard one (RFC 6764): optional DNS SRV to find the
//! host, `current-user-principal`, `calendar-home-set`, then a Depth:1
//! enumeration with the non-event collections filtered out. A failing first
//! PROPFIND falls back to `/.well-known/caldav` once.

use hyper::Uri;
use std::sync::Arc;

use crate::error::{DavError, DavResult};
use crate::webdav::transport::{WebDavTransport, resolve_location};
use crate::webdav::types::Depth;
use crate::webdav::xml;
use crate::caldav::provider::Provider;
use crate::caldav::stores::{DnsResolver, SrvRecord};
use crate::caldav::types::{CalDavAccount, Calendar};

pub struct Discovery {
    transport: Arc<WebDavTransport>,
    dns: Option<Arc<dyn DnsResolver>>,
    well_known_enabled: bool,
}

impl Discovery {
    pub fn new(transport: Arc<WebDavTransport>) -> Self {
        Self {
            transport,
            dns: None,
            well_known_enabled: true,
        }
    }

    pub fn with_dns(mut self, dns: Arc<dyn DnsResolver>) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn well_known_enabled(mut self, enabled: bool) -> Self {
        self.well_known_enabled = enabled;
        self
    }

    /// Bootstrap from an email address: SRV records pick the host when a
    /// resolver is wired in, `https://<domain>` otherwise.
    pub async fn discover_from_email(&self, email: &str) -> DavResult<CalDavAccount> {
        let domain = email
            .rsplit_once('@')
            .map(|(_, d)| d.trim())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| DavError::parse(format!("not an email address: {email}")))?;

        let base_url = match self.srv_base_url(domain).await {
            Some(url) => url,
            None => format!("https://{domain}"),
        };
        tracing::debug!(domain, base_url = base_url.as_str(), "discovery starting point");
        self.discover(&base_url).await
    }

    /// Bootstrap from a known server URL.
    pub async fn discover(&self, base_url: &str) -> DavResult<CalDavAccount> {
        let base: Uri = base_url.parse()?;
        let (principal_url, effective_base) = self.find_principal(&base).await?;

        let home_url = self.find_calendar_home(&principal_url).await?;
        let (schedule_inbox_url, schedule_outbox_url) =
            self.find_schedule_urls(&principal_url).await;

        let provider = Provider::detect(base_url);
        let calendars = self.list_calendars(&home_url, &provider).await?;

        let origin = origin_of(&effective_base);
        Ok(CalDavAccount {
            server_url: origin,
            principal_url: principal_url.to_string(),
            calendar_home_url: home_url.to_string(),
            schedule_inbox_url,
            schedule_outbox_url,
            calendars,
        })
    }

    /// SRV lookup: secure label first, plain fallback, best record by
    /// priority ascending then weight descending.
    async fn srv_base_url(&self, domain: &str) -> Option<String> {
        let dns = self.dns.as_ref()?;

        for (service, scheme, default_port) in
            [("_caldavs._tcp.", "https", 443u16), ("_caldav._tcp.", "http", 80u16)]
        {
            let name = format!("{service}{domain}");
            let mut records = match dns.resolve_srv(&name).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::debug!(name = name.as_str(), error = %e, "srv lookup failed");
                    continue;
                }
            };
            if records.is_empty() {
                continue;
            }
            records.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.weight.cmp(&a.weight))
            });
            let SrvRecord { target, port, .. } = records.remove(0);
            let target = target.trim_end_matches('.');
            if target.is_empty() {
                continue;
            }
            let url = if port == default_port || port == 0 {
                format!("{scheme}://{target}")
            } else {
                format!("{scheme}://{target}:{port}")
            };
            return Some(url);
        }
        None
    }

    /// `current-user-principal`, with a single `/.well-known/caldav` retry
    /// when the direct probe fails.
    async fn find_principal(&self, base: &Uri) -> DavResult<(Uri, Uri)> {
        match self.query_principal(base).await {
            Ok(href) => Ok((resolve_location(base, &href)?, base.clone())),
            Err(err) => {
                if !self.well_known_enabled {
                    return Err(err);
                }
                let well_known = well_known_url(base)?;
                if well_known == *base {
                    return Err(err);
                }
                tracing::debug!(url = %well_known, "retrying principal discovery via well-known");
                let href = self.query_principal(&well_known).await.map_err(|_| err)?;
                Ok((resolve_location(&well_known, &href)?, well_known))
            }
        }
    }

    async fn query_principal(&self, url: &Uri) -> DavResult<String> {
        let multistatus = self
            .transport
            .propfind(url, &xml::propfind_principal(), Depth::Zero, false)
            .await?;
        multistatus
            .responses
            .into_iter()
            .find_map(|r| r.current_user_principal.filter(|h| !h.is_empty()))
            .ok_or_else(|| DavError::parse("server did not report current-user-principal"))
    }

    async fn find_calendar_home(&self, principal_url: &Uri) -> DavResult<Uri> {
        let multistatus = self
            .transport
            .propfind(principal_url, &xml::propfind_calendar_home(), Depth::Zero, false)
            .await?;
        let href = multistatus
            .responses
            .into_iter()
            .flat_map(|r| r.calendar_home_set)
            .find(|h| !h.is_empty())
            .ok_or_else(|| DavError::parse("principal has no calendar-home-set"))?;
        resolve_location(principal_url, &href)
    }

    /// Schedule inbox/outbox discovery is best-effort; servers without
    /// scheduling support simply leave both unset.
    async fn find_schedule_urls(&self, principal_url: &Uri) -> (Option<String>, Option<String>) {
        let result = self
            .transport
            .propfind(principal_url, &xml::propfind_schedule_urls(), Depth::Zero, false)
            .await;
        match result {
            Ok(multistatus) => {
                let mut inbox = None;
                let mut outbox = None;
                for response in multistatus.responses {
                    if inbox.is_none() {
                        inbox = response
                            .schedule_inbox
                            .and_then(|h| absolute(principal_url, &h));
                    }
                    if outbox.is_none() {
                        outbox = response
                            .schedule_outbox
                            .and_then(|h| absolute(principal_url, &h));
                    }
                }
                (inbox, outbox)
            }
            Err(e) => {
                tracing::debug!(error = %e, "schedule url discovery failed, continuing without");
                (None, None)
            }
        }
    }

    async fn list_calendars(&self, home_url: &Uri, provider: &Provider) -> DavResult<Vec<Calendar>> {
        let multistatus = self
            .transport
            .propfind(home_url, &xml::propfind_calendars(), Depth::One, false)
            .await?;

        let home_path = home_url.path().trim_end_matches('/');
        let mut calendars = Vec::new();
        for response in multistatus.responses {
            if !response.is_calendar {
                continue;
            }
            // The home collection reports itself at Depth:1.
            if response.href.trim_end_matches('/') == home_path {
                continue;
            }
            if provider.should_skip_collection(&response.href, response.displayname.as_deref()) {
                tracing::debug!(href = response.href.as_str(), "skipping non-event collection");
                continue;
            }
            let href = match absolute(home_url, &response.href) {
                Some(href) => href,
                None => continue,
            };
            calendars.push(Calendar {
                href,
                display_name: response.displayname,
                description: response.calendar_description,
                color: response.calendar_color,
                ctag: response.ctag,
                sync_token: response.sync_token,
                read_only: response.read_only,
                supported_components: response.supported_components,
            });
        }
        calendars.sort_by(|a, b| a.href.cmp(&b.href));
        Ok(calendars)
    }
}

fn absolute(base: &Uri, href: &str) -> Option<String> {
    resolve_location(base, href).ok().map(|u| u.to_string())
}

fn origin_of(url: &Uri) -> String {
    match (url.scheme_str(), url.authority()) {
        (Some(scheme), Some(authority)) => format!("{scheme}://{authority}"),
        _ => url.to_string(),
    }
}

/// `<scheme>://<host>/.well-known/caldav`, dropping any path of the input.
fn well_known_url(base: &Uri) -> DavResult<Uri> {
    let mut parts = base.clone().into_parts();
    parts.path_and_query = Some("/.well-known/caldav".parse()?);
    Ok(Uri::from_parts(parts)?)
}
