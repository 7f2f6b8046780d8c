//! Server-specific behavior as data.
//!
//! Quirks live on a plain record so new providers are added by table entry,
//! not by subclassing. [`Provider::detect`] inspects the host name.

/// Collection href fragments that never hold user events.
const SKIP_HREF_FRAGMENTS: &[&str] = &["inbox", "outbox", "notification", "freebusy", "dropbox"];

/// Display-name fragments marking task and reminder collections.
const SKIP_NAME_FRAGMENTS: &[&str] = &["tasks", "reminders", "todo"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub name: &'static str,
    /// HTTP statuses this server uses to report an invalidated sync token.
    /// The RFC does not pin these down; the union below matches observed
    /// behavior (iCloud answers 403, others 410 or 412).
    pub invalid_sync_token_statuses: &'static [u16],
    /// Whether the server omits `calendar-data` in sync-collection
    /// responses, forcing a follow-up multiget.
    pub sync_omits_data: bool,
}

pub const GENERIC: Provider = Provider {
    name: "generic",
    invalid_sync_token_statuses: &[403, 410, 412],
    sync_omits_data: false,
};

pub const ICLOUD: Provider = Provider {
    name: "icloud",
    invalid_sync_token_statuses: &[403],
    sync_omits_data: true,
};

pub const GOOGLE: Provider = Provider {
    name: "google",
    invalid_sync_token_statuses: &[410, 412],
    sync_omits_data: false,
};

pub const FASTMAIL: Provider = Provider {
    name: "fastmail",
    invalid_sync_token_statuses: &[403, 410, 412],
    sync_omits_data: false,
};

impl Provider {
    /// Pick the provider record for a server URL by host substring.
    pub fn detect(server_url: &str) -> Provider {
        let host = server_url.to_ascii_lowercase();
        if host.contains("icloud.com") {
            ICLOUD
        } else if host.contains("google.com") || host.contains("googleusercontent.com") {
            GOOGLE
        } else if host.contains("fastmail.com") || host.contains("messagingengine.com") {
            FASTMAIL
        } else {
            GENERIC
        }
    }

    /// The pragmatic invalid-token test: a known status, or any error body
    /// naming the `valid-sync-token` precondition.
    pub fn is_invalid_sync_token(&self, status: u16, body: &str) -> bool {
        if (200..300).contains(&status) {
            return false;
        }
        self.invalid_sync_token_statuses.contains(&status)
            || body.contains("valid-sync-token")
    }

    /// Skip collections that cannot hold events: scheduling inboxes,
    /// notification drops, free-busy URLs, and task/reminder lists.
    pub fn should_skip_collection(&self, href: &str, display_name: Option<&str>) -> bool {
        let href = href.to_ascii_lowercase();
        if SKIP_HREF_FRAGMENTS.iter().any(|f| href.contains(f)) {
            return true;
        }
        if let Some(name) = display_name {
            let name = name.to_ascii_lowercase();
            if SKIP_NAME_FRAGMENTS.iter().any(|f| name.contains(f)) {
                return true;
            }
        }
        false
    }
}
