//! CalDAV synchronization library for Rust.
//!
//! This crate keeps a local calendar store in step with one or more CalDAV
//! servers (RFC 4791) over WebDAV (RFC 4918), speaking iCalendar (RFC 5545)
//! on the wire. It bundles:
//!
//! - an iCalendar codec: parser and generator with line folding, parameter
//!   handling, recurrence rules, and `RECURRENCE-ID` exception resolution
//! - a WebDAV transport with retry/backoff, redirect-preserving
//!   authentication, conditional-update etag discipline, and a capability
//!   cache
//! - a namespace-agnostic multistatus parser and request-body builders
//! - account discovery (DNS SRV, `/.well-known/caldav`, principal and
//!   calendar-home walk)
//! - an incremental sync engine (`sync-collection`, ctag/etag-diff
//!   fallback, three-way reconciliation, SEQUENCE conflict handling)
//! - an iTIP builder for scheduling messages (RFC 5546)
//! - a WebDAV ACL codec (RFC 3744)
//!
//! Storage, DNS, and (optionally) HTTP are injected: the engine talks to
//! [`LocalStore`], [`StateStore`], and [`DnsResolver`] traits, and any
//! [`HttpClient`] can replace the bundled hyper implementation.
//!
//! # Discovering an account
//!
//! ```no_run
//! use std::sync::Arc;
//! use caldav_sync_rs::{Credentials, Discovery, TransportConfig, WebDavTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(WebDavTransport::with_hyper(
//!         Credentials::basic("jane", "app-password"),
//!         TransportConfig::default(),
//!     ));
//!
//!     let account = Discovery::new(transport)
//!         .discover("https://cal.example.com/")
//!         .await?;
//!     for calendar in &account.calendars {
//!         println!(
//!             "{} ({})",
//!             calendar.display_name.as_deref().unwrap_or("unnamed"),
//!             calendar.href
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Synchronizing a calendar
//!
//! ```no_run
//! use std::sync::Arc;
//! use caldav_sync_rs::{
//!     CalDavClient, Credentials, LocalStore, StateStore, SyncEngine, TransportConfig,
//!     WebDavTransport,
//! };
//!
//! async fn run(
//!     local: Arc<dyn LocalStore>,
//!     state: Arc<dyn StateStore>,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(WebDavTransport::with_hyper(
//!         Credentials::basic("jane", "app-password"),
//!         TransportConfig::default(),
//!     ));
//!     let client = CalDavClient::new(transport, "https://cal.example.com/")?;
//!
//!     let mut engine = SyncEngine::new(
//!         client,
//!         "https://cal.example.com/calendars/jane/work/",
//!         local,
//!         state,
//!     );
//!     let outcome = engine.sync().await?;
//!     println!(
//!         "pulled {} changes, pushed {}, {} conflicts",
//!         outcome.pulled_upserts + outcome.pulled_deletes,
//!         outcome.pushed_creates + outcome.pushed_updates + outcome.pushed_deletes,
//!         outcome.conflicts.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Parsing and generating iCalendar
//!
//! ```
//! use caldav_sync_rs::ical::{generate_calendar, parse_calendar};
//!
//! let text = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240101T100000Z\r\nSUMMARY:New year planning\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
//! let calendar = parse_calendar(text).unwrap();
//! assert_eq!(calendar.events[0].summary.as_deref(), Some("New year planning"));
//!
//! let regenerated = generate_calendar(&calendar);
//! assert_eq!(parse_calendar(&regenerated).unwrap().events, calendar.events);
//! ```

pub mod caldav;
pub mod common;
pub mod error;
pub mod ical;
pub mod webdav;

pub use caldav::{
    CalDavAccount, CalDavClient, Calendar, Conflict, DirtyEvent, Discovery, DnsResolver,
    EngineState, FetchedObject, LocalStore, Provider, SrvRecord, StateStore, SyncConfig,
    SyncEngine, SyncOutcome, SyncState,
};
pub use common::{Clock, HttpClient, HttpRequest, HttpResponse, HyperHttpClient, SystemClock};
pub use error::{DavError, DavResult, NetworkErrorKind};
pub use ical::{
    Attendee, ICalDateTime, ICalEvent, ICalendar, ITipBuilder, Organizer, RecurrenceRule,
    generate_calendar, generate_event, parse_calendar, parse_single_event,
};
pub use webdav::{
    Ace, AclPrincipal, Capabilities, Credentials, DavResponse, Depth, MultiStatus, Privilege,
    PutPrecondition, TransportConfig, WebDavTransport, parse_multistatus,
};
