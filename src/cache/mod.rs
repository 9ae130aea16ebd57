//! Site cache.
//!
//! Two independent in-memory regions:
//!
//! - **site**: rendered client-site pages keyed by `site:<slug>:<path>`,
//!   short TTL, populated by [`site_cache_layer`] on successful renders
//! - **template**: template fragments keyed by name, long TTL, written and
//!   read explicitly by the renderer
//!
//! Expired entries read as misses and are reclaimed by per-region sweepers.
//! Invalidation is local to the process.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! site_ttl_seconds = 300
//! site_sweep_seconds = 60
//! template_ttl_seconds = 3600
//! # ... see config.rs for all options
//! ```

mod capture;
mod clock;
mod config;
mod keys;
mod lock;
mod middleware;
mod site;
mod store;
mod sweeper;

pub use capture::{CaptureError, ResponseObserver, capture_response, is_storable};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, DEFAULT_STATUS_HEADER, is_under_prefixes};
pub use keys::{site_key, site_prefix, template_key};
pub use middleware::site_cache_layer;
pub use site::{CacheStats, SiteCache};
pub use store::{CacheRegion, CachedPage, RegionStats};
pub use sweeper::spawn_sweepers;

use crate::application::projects::CachePurger;

impl CachePurger for SiteCache {
    fn purge(&self, slug: &str) {
        self.purge_by_slug(slug);
    }
}
