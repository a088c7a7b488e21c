//! Environment-sourced configuration for the monitor.
//!
//! Loaded once at startup. Validation collects every violated constraint and
//! reports them together so the operator can fix everything in one pass.

use std::env;
use std::time::Duration;

use anyhow::Result;
use url::{Host, Url};

use crate::fetch::FetchConfig;
use crate::notify::NotifyConfig;
use crate::types::{SearchTerm, Target};

/// Maximum number of monitored URLs.
pub const MAX_TARGETS: usize = 10;
/// Maximum number of search terms.
pub const MAX_SEARCH_TERMS: usize = 20;
/// Minimum check interval in seconds.
pub const MIN_CHECK_INTERVAL_SECS: u64 = 10;

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
const DEFAULT_SEARCH_TERM: &str = "DJI Mini 5 Pro";
const DEFAULT_NOTIFICATION_TITLE: &str = "Content Found!";
const DEFAULT_NOTIFICATION_SOUND: &str = "magic";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const HEADER_KEY_LIMIT: usize = 100;
const HEADER_VALUE_LIMIT: usize = 500;

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<Target>,
    pub terms: Vec<SearchTerm>,
    pub check_interval: Duration,
    pub pushover_token: String,
    pub pushover_user: String,
    pub notification_title: String,
    pub notification_priority: i8,
    pub notification_sound: String,
    pub auto_stop_on_found: bool,
    pub user_agent: String,
    pub custom_headers: Vec<(String, String)>,
}

impl Config {
    /// Load and validate configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup. Collects all
    /// validation errors before failing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut errors: Vec<String> = Vec::new();

        let targets = parse_targets(lookup("MONITOR_URL").as_deref().unwrap_or(""));
        if targets.is_empty() {
            errors.push(
                "MONITOR_URL must contain at least one valid public http/https URL".to_string(),
            );
        }

        let terms = parse_terms(lookup("SEARCH_TEXT").as_deref());
        if terms.is_empty() {
            errors.push("SEARCH_TEXT cannot be empty".to_string());
        }

        let check_interval_secs = match lookup("CHECK_INTERVAL") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => {
                    if secs < MIN_CHECK_INTERVAL_SECS {
                        errors.push(format!(
                            "CHECK_INTERVAL must be at least {} seconds",
                            MIN_CHECK_INTERVAL_SECS
                        ));
                    }
                    secs
                }
                Err(_) => {
                    errors.push(format!(
                        "CHECK_INTERVAL must be an integer number of seconds, got '{}'",
                        raw
                    ));
                    DEFAULT_CHECK_INTERVAL_SECS
                }
            },
            None => DEFAULT_CHECK_INTERVAL_SECS,
        };

        let pushover_token = lookup("PUSHOVER_TOKEN").unwrap_or_default();
        if pushover_token.trim().is_empty() {
            errors.push("PUSHOVER_TOKEN environment variable is required".to_string());
        }

        let pushover_user = lookup("PUSHOVER_USER").unwrap_or_default();
        if pushover_user.trim().is_empty() {
            errors.push("PUSHOVER_USER environment variable is required".to_string());
        }

        let notification_priority = match lookup("NOTIFICATION_PRIORITY") {
            Some(raw) => match raw.trim().parse::<i8>() {
                Ok(priority) => priority,
                Err(_) => {
                    errors.push(format!(
                        "NOTIFICATION_PRIORITY must be a small integer, got '{}'",
                        raw
                    ));
                    1
                }
            },
            None => 1,
        };

        let custom_headers = match lookup("CUSTOM_HEADERS") {
            Some(raw) => parse_custom_headers(&raw),
            None => Vec::new(),
        };

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(Self {
            targets,
            terms,
            check_interval: Duration::from_secs(check_interval_secs),
            pushover_token,
            pushover_user,
            notification_title: lookup("NOTIFICATION_TITLE")
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_string()),
            notification_priority,
            notification_sound: lookup("NOTIFICATION_SOUND")
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_SOUND.to_string()),
            auto_stop_on_found: lookup("AUTO_STOP_ON_FOUND")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            user_agent: lookup("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            custom_headers,
        })
    }

    /// Fetcher settings derived from this configuration.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            custom_headers: self.custom_headers.clone(),
            ..FetchConfig::default()
        }
    }

    /// Notifier settings derived from this configuration.
    pub fn notify_config(&self) -> NotifyConfig {
        NotifyConfig {
            token: self.pushover_token.clone(),
            user: self.pushover_user.clone(),
            default_title: self.notification_title.clone(),
            priority: self.notification_priority,
            sound: self.notification_sound.clone(),
            ..NotifyConfig::default()
        }
    }
}

/// Parse the comma-separated target list, dropping invalid or unsafe URLs
/// with a warning. At most `MAX_TARGETS` are kept.
fn parse_targets(raw: &str) -> Vec<Target> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(MAX_TARGETS)
        .filter_map(|s| match Url::parse(s) {
            Ok(url) if is_safe_url(&url) => Some(Target::new(url)),
            Ok(_) | Err(_) => {
                tracing::warn!(url = s, "ignoring invalid or unsafe URL");
                None
            }
        })
        .collect()
}

/// Parse the comma-separated term list; absent falls back to the default
/// term. At most `MAX_SEARCH_TERMS` are kept.
fn parse_terms(raw: Option<&str>) -> Vec<SearchTerm> {
    match raw {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(MAX_SEARCH_TERMS)
            .map(SearchTerm::new)
            .collect(),
        None => vec![SearchTerm::new(DEFAULT_SEARCH_TERM)],
    }
}

/// Basic SSRF guard: http/https only, and no loopback or private-range hosts.
pub(crate) fn is_safe_url(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    match url.host() {
        Some(Host::Domain(domain)) => !domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => {
            let [a, b, _, _] = ip.octets();
            !(a == 127 || a == 10 || (a == 192 && b == 168) || (a == 172 && (16..=31).contains(&b)))
        }
        Some(Host::Ipv6(ip)) => !ip.is_loopback(),
        None => false,
    }
}

/// Parse the `CUSTOM_HEADERS` JSON object into sanitized (name, value)
/// pairs. Invalid JSON or a non-object yields no headers, with a warning.
pub(crate) fn parse_custom_headers(raw: &str) -> Vec<(String, String)> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "invalid JSON in CUSTOM_HEADERS, ignoring");
            return Vec::new();
        }
    };

    let Some(object) = value.as_object() else {
        tracing::warn!("CUSTOM_HEADERS must be a JSON object, ignoring");
        return Vec::new();
    };

    let mut headers = Vec::new();
    for (key, value) in object {
        let Some(value) = value.as_str() else {
            tracing::warn!(header = %key, "skipping non-string CUSTOM_HEADERS value");
            continue;
        };

        let key: String = key.trim().chars().take(HEADER_KEY_LIMIT).collect();
        let value: String = value.trim().chars().take(HEADER_VALUE_LIMIT).collect();
        if key.is_empty() || key.chars().any(|c| matches!(c, '\n' | '\r' | '\0')) {
            tracing::warn!("skipping CUSTOM_HEADERS entry with unsafe name");
            continue;
        }

        headers.push((key, value));
    }

    if !headers.is_empty() {
        tracing::debug!(count = headers.len(), "loaded custom headers");
    }
    headers
}
