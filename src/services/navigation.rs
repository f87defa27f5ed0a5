use crate::services::identity_domains::{is_identity_suffix, matching_public_suffix};
use url::Url;

/// Origin of the hosted player.
pub const PLAYER_HOST: &str = "music.youtube.com";
pub const PLAYER_HOME_URL: &str = "https://music.youtube.com/";

/// Hosts the page may always navigate to: the player itself and the identity
/// and consent flows it depends on.
pub const ALLOWED_HOSTS: [&str; 5] = [
    "music.youtube.com",
    "accounts.google.com",
    "accounts.youtube.com",
    "consent.youtube.com",
    "consent.google.com",
];

/// Marketing hosts, allowed only for [`MARKETING_PATHS`].
pub const MARKETING_HOSTS: [&str; 2] = ["www.youtube.com", "youtube.com"];

pub const MARKETING_PATHS: [&str; 3] = ["/signin", "/premium", "/signin_prompt"];

/// Prefix of the region-localized identity hosts, `accounts.google.<suffix>`.
pub const IDENTITY_HOST_PREFIX: &str = "accounts.google.";

/// Registrable domains whose denied top-level navigations open in the OS browser.
pub const EXTERNAL_OPEN_DOMAINS: [&str; 2] = ["youtube.com", "google.com"];

/// Redirect target the player uses when the service is unavailable without a
/// paid upgrade in the user's region.
pub const UPGRADE_REQUIRED_HOST: &str = PLAYER_HOST;
pub const UPGRADE_REQUIRED_PATH_PREFIX: &str = "/coming-soon";

/// Sign-in URL that continues back into the player.
pub const LOGIN_CONTINUATION_URL: &str = "https://accounts.google.com/ServiceLogin?ltmpl=music&service=youtube&passive=true&continue=https%3A%2F%2Fwww.youtube.com%2Fsignin%3Faction_handle_signin%3Dtrue%26next%3Dhttps%253A%252F%252Fmusic.youtube.com%252F";

/// How the page is trying to leave its current location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Top-level navigation (link click, `location` assignment).
    Navigate,
    /// Server or in-page redirect.
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Deny,
    /// Block in the hosted page, open in the default browser instead.
    DenyThenExternalOpen,
    RewriteTo(String),
}

impl NavigationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny | Self::DenyThenExternalOpen)
    }
}

/// Stateless allow/deny/rewrite classifier for URLs leaving the hosted page.
///
/// Fails closed: anything that does not parse, is not `https`, carries an
/// explicit port or matches no rule is denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationGate;

impl NavigationGate {
    pub fn classify(destination: &str, kind: NavigationKind) -> NavigationDecision {
        match Url::parse(destination) {
            Ok(url) => Self::classify_url(&url, kind),
            Err(e) => {
                tracing::debug!("Unparsable navigation target {:?}: {}", destination, e);
                NavigationDecision::Deny
            }
        }
    }

    pub fn classify_url(url: &Url, kind: NavigationKind) -> NavigationDecision {
        let Some(host) = url.host_str() else {
            return NavigationDecision::Deny;
        };
        let path = url.path();

        if kind == NavigationKind::Redirect && is_upgrade_required(host, path) {
            return NavigationDecision::RewriteTo(LOGIN_CONTINUATION_URL.to_string());
        }

        if url.scheme() == "https" && url.port().is_none() && is_allowed_destination(host, path) {
            return NavigationDecision::Allow;
        }

        let web_scheme = matches!(url.scheme(), "https" | "http");
        if kind == NavigationKind::Navigate && web_scheme && opens_externally(host) {
            NavigationDecision::DenyThenExternalOpen
        } else {
            NavigationDecision::Deny
        }
    }
}

/// Whether `url` is a page of the player itself, fit to be restored on start.
pub fn is_player_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| {
        u.scheme() == "https" && u.port().is_none() && u.host_str() == Some(PLAYER_HOST)
    })
}

fn is_upgrade_required(host: &str, path: &str) -> bool {
    host == UPGRADE_REQUIRED_HOST && path.starts_with(UPGRADE_REQUIRED_PATH_PREFIX)
}

fn is_allowed_destination(host: &str, path: &str) -> bool {
    if ALLOWED_HOSTS.contains(&host) {
        return true;
    }

    if MARKETING_HOSTS.contains(&host) {
        return MARKETING_PATHS.contains(&path);
    }

    host.strip_prefix(IDENTITY_HOST_PREFIX)
        .is_some_and(is_identity_suffix)
}

/// `example` + public suffix, e.g. `youtube.com` for `www.youtube.com`.
pub fn registrable_domain(host: &str) -> Option<&str> {
    let suffix = matching_public_suffix(host)?;
    let rest = &host[..host.len() - suffix.len() - 1];
    let label_start = rest.rfind('.').map_or(0, |i| i + 1);
    if label_start >= rest.len() {
        return None;
    }
    Some(&host[label_start..])
}

fn opens_externally(host: &str) -> bool {
    registrable_domain(host).is_some_and(|domain| EXTERNAL_OPEN_DOMAINS.contains(&domain))
}
