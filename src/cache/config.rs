//! Cache configuration.
//!
//! Built from the `[cache]` section of the application settings.

use std::num::NonZeroUsize;
use std::time::Duration;

use axum::http::HeaderName;

const DEFAULT_SITE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_SITE_SWEEP: Duration = Duration::from_secs(60);
const DEFAULT_SITE_CAPACITY: NonZeroUsize = non_zero(1000);
const DEFAULT_TEMPLATE_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_TEMPLATE_SWEEP: Duration = Duration::from_secs(600);
const DEFAULT_TEMPLATE_CAPACITY: NonZeroUsize = non_zero(100);
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_STATUS_HEADER: &str = "x-cache";

const fn non_zero(value: usize) -> NonZeroUsize {
    match NonZeroUsize::new(value) {
        Some(value) => value,
        None => NonZeroUsize::MIN,
    }
}

/// Runtime cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Install the site cache middleware at all.
    pub enabled: bool,
    /// Freshness window for rendered client-site pages.
    pub site_ttl: Duration,
    /// Interval of the page-region expiry sweep.
    pub site_sweep_interval: Duration,
    /// Maximum stored pages before LRU eviction.
    pub site_capacity: NonZeroUsize,
    /// Freshness window for template fragments.
    pub template_ttl: Duration,
    /// Interval of the template-region expiry sweep.
    pub template_sweep_interval: Duration,
    /// Maximum stored template fragments before LRU eviction.
    pub template_capacity: NonZeroUsize,
    /// Larger responses are served but never stored.
    pub max_body_bytes: usize,
    /// Path prefixes that are never cached, even for client sites.
    pub bypass_prefixes: Vec<String>,
    /// Response header carrying `HIT` / `MISS`.
    pub status_header: HeaderName,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            site_ttl: DEFAULT_SITE_TTL,
            site_sweep_interval: DEFAULT_SITE_SWEEP,
            site_capacity: DEFAULT_SITE_CAPACITY,
            template_ttl: DEFAULT_TEMPLATE_TTL,
            template_sweep_interval: DEFAULT_TEMPLATE_SWEEP,
            template_capacity: DEFAULT_TEMPLATE_CAPACITY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            bypass_prefixes: vec!["/api/".to_string(), "/uploads/".to_string()],
            status_header: HeaderName::from_static(DEFAULT_STATUS_HEADER),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            site_ttl: Duration::from_secs(settings.site_ttl_seconds.get().into()),
            site_sweep_interval: Duration::from_secs(settings.site_sweep_seconds.get().into()),
            site_capacity: settings.site_capacity,
            template_ttl: Duration::from_secs(settings.template_ttl_seconds.get().into()),
            template_sweep_interval: Duration::from_secs(
                settings.template_sweep_seconds.get().into(),
            ),
            template_capacity: settings.template_capacity,
            max_body_bytes: settings.max_body_bytes.get(),
            bypass_prefixes: settings.bypass_prefixes.clone(),
            status_header: settings.status_header.clone(),
        }
    }
}

impl CacheConfig {
    /// Whether `path` lives under a namespace that is never cached.
    pub fn is_bypassed(&self, path: &str) -> bool {
        is_under_prefixes(&self.bypass_prefixes, path)
    }
}

/// Whether `path` falls under any of `prefixes`.
///
/// `/api/` matches `/api` itself as well as everything below it.
pub fn is_under_prefixes(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| {
        let bare = prefix.trim_end_matches('/');
        path.starts_with(prefix.as_str()) || (!bare.is_empty() && path == bare)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.site_ttl, Duration::from_secs(300));
        assert_eq!(config.site_sweep_interval, Duration::from_secs(60));
        assert_eq!(config.template_ttl, Duration::from_secs(3600));
        assert_eq!(config.template_sweep_interval, Duration::from_secs(600));
        assert_eq!(config.status_header.as_str(), "x-cache");
    }

    #[test]
    fn bypass_covers_namespace_roots_and_children() {
        let config = CacheConfig::default();
        assert!(config.is_bypassed("/api/projects"));
        assert!(config.is_bypassed("/api"));
        assert!(config.is_bypassed("/uploads/photo.png"));
        assert!(!config.is_bypassed("/"));
        assert!(!config.is_bypassed("/apiary"));
        assert!(!config.is_bypassed("/galeria"));
    }
}
