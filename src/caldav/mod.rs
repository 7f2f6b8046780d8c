pub mod client;
pub mod discovery;
pub mod provider;
pub mod stores;
pub mod sync;
pub mod types;

pub use client::CalDavClient;
pub use discovery::Discovery;
pub use provider::Provider;
pub use stores::{DirtyEvent, DnsResolver, LocalStore, SrvRecord, StateStore};
pub use sync::{SyncConfig, SyncEngine, sanitize_uid};
pub use types::{
    CalDavAccount, Calendar, Conflict, EngineState, FetchedObject, SyncOutcome, SyncState,
};
