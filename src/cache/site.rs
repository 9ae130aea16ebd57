//! Process-wide site cache service.
//!
//! Holds the two regions (rendered pages and template fragments) and is shared
//! by cloning. Each instance is independent, so tests build their own.
//!
//! Every slug carries a purge generation. A render records the generation it
//! started under and its page is dropped if the slug was purged meanwhile, so
//! an edit can never be undone by a render that read the old content.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::keys::{site_key, site_prefix, template_key};
use super::lock::mutex_lock;
use super::store::{CacheRegion, CachedPage, RegionStats};

/// Snapshot of both regions plus page lookup counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub site: RegionStats,
    pub template: RegionStats,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Clone)]
pub struct SiteCache {
    inner: Arc<Inner>,
}

struct Inner {
    config: CacheConfig,
    pages: CacheRegion<CachedPage>,
    templates: CacheRegion<serde_json::Value>,
    hits: AtomicU64,
    misses: AtomicU64,
    generations: Mutex<HashMap<String, u64>>,
}

impl SiteCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let pages = CacheRegion::pages(&config, Arc::clone(&clock));
        let templates = CacheRegion::templates(&config, clock);
        Self {
            inner: Arc::new(Inner {
                config,
                pages,
                templates,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                generations: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Fresh page of `slug` at `path`. Counts the lookup as a hit or miss.
    pub fn get_page(&self, slug: &str, path: &str) -> Option<CachedPage> {
        let page = self.inner.pages.get(&site_key(slug, path));
        if page.is_some() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            counter!("amora_site_cache_hit_total").increment(1);
        } else {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            counter!("amora_site_cache_miss_total").increment(1);
        }
        page
    }

    /// Purge generation of `slug`. Read it before rendering and hand it to
    /// [`Self::store_page`].
    pub fn generation(&self, slug: &str) -> u64 {
        mutex_lock(&self.inner.generations, "site", "generation")
            .get(slug)
            .copied()
            .unwrap_or(0)
    }

    /// Store a page of `slug` rendered under `generation`. Returns `false`, and
    /// stores nothing, when the slug has been purged since.
    pub fn store_page(&self, slug: &str, path: &str, generation: u64, page: CachedPage) -> bool {
        let key = site_key(slug, path);
        let bytes = page.body.len();
        let stored = self
            .inner
            .pages
            .set_if(key.clone(), page, || self.generation(slug) == generation);

        if stored {
            debug!(target = "amora::cache", key = %key, bytes, "storing rendered page");
            counter!("amora_site_cache_store_total").increment(1);
        } else {
            debug!(
                target = "amora::cache",
                key = %key,
                "slug purged during render; page not stored"
            );
        }
        stored
    }

    /// Drop every stored page of `slug`. Returns the number of pages removed.
    ///
    /// Renders already in flight for `slug` will not store their pages.
    pub fn purge_by_slug(&self, slug: &str) -> usize {
        *mutex_lock(&self.inner.generations, "site", "purge")
            .entry(slug.to_string())
            .or_insert(0) += 1;
        let removed = self.inner.pages.purge_prefix(&site_prefix(slug));
        counter!("amora_site_cache_purge_total").increment(1);
        info!(
            target = "amora::cache",
            slug,
            removed,
            "purged site cache for tenant"
        );
        removed
    }

    pub fn get_template(&self, name: &str) -> Option<serde_json::Value> {
        self.inner.templates.get(&template_key(name))
    }

    pub fn set_template(&self, name: &str, value: serde_json::Value) {
        self.inner.templates.set(template_key(name), value);
    }

    /// Flush both regions.
    pub fn clear_all(&self) {
        let pages = self.inner.pages.clear();
        let templates = self.inner.templates.clear();
        info!(
            target = "amora::cache",
            pages, templates, "cleared all cache regions"
        );
    }

    pub fn sweep_pages(&self) -> usize {
        self.inner.pages.sweep()
    }

    pub fn sweep_templates(&self) -> usize {
        self.inner.templates.sweep()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.inner.config.enabled,
            site: self.inner.pages.stats(),
            template: self.inner.templates.stats(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use serde_json::json;

    use super::*;
    use crate::cache::clock::ManualClock;

    fn page(body: &'static str) -> CachedPage {
        CachedPage {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn cache_with_clock() -> (SiteCache, ManualClock) {
        let clock = ManualClock::default();
        let cache = SiteCache::with_clock(CacheConfig::default(), Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn stored_page_reads_back_identically() {
        let (cache, _) = cache_with_clock();
        assert!(cache.store_page("joao-maria", "/", 0, page("<h1>Oi</h1>")));

        assert_eq!(cache.get_page("joao-maria", "/"), Some(page("<h1>Oi</h1>")));
    }

    #[test]
    fn page_read_after_ttl_is_a_miss() {
        let (cache, clock) = cache_with_clock();
        cache.store_page("joao-maria", "/", 0, page("x"));

        clock.advance(Duration::from_secs(301));

        assert_eq!(cache.get_page("joao-maria", "/"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.site.expired, 1);
    }

    #[test]
    fn purge_by_slug_is_scoped_to_that_tenant() {
        let (cache, _) = cache_with_clock();
        cache.store_page("ana", "/", 0, page("a"));
        cache.store_page("ana", "/fotos", 0, page("b"));
        cache.store_page("joao", "/", 0, page("c"));

        assert_eq!(cache.purge_by_slug("ana"), 2);

        assert_eq!(cache.get_page("ana", "/"), None);
        assert_eq!(cache.get_page("ana", "/fotos"), None);
        assert_eq!(cache.get_page("joao", "/"), Some(page("c")));
    }

    #[test]
    fn render_started_before_a_purge_is_not_stored() {
        let (cache, _) = cache_with_clock();
        let before = cache.generation("ana");

        cache.purge_by_slug("ana");

        assert!(!cache.store_page("ana", "/", before, page("old")));
        assert_eq!(cache.get_page("ana", "/"), None);

        let after = cache.generation("ana");
        assert_ne!(after, before);
        assert!(cache.store_page("ana", "/", after, page("new")));
        assert_eq!(cache.get_page("ana", "/"), Some(page("new")));
    }

    #[test]
    fn purge_of_one_slug_leaves_other_renders_current() {
        let (cache, _) = cache_with_clock();
        let joao = cache.generation("joao");

        cache.purge_by_slug("ana");

        assert!(cache.store_page("joao", "/", joao, page("j")));
    }

    #[test]
    fn template_region_is_independent_and_long_lived() {
        let (cache, clock) = cache_with_clock();
        cache.set_template("default", json!({"name": "Amor Clássico"}));
        cache.store_page("ana", "/", 0, page("a"));

        clock.advance(Duration::from_secs(600));

        assert_eq!(cache.get_page("ana", "/"), None);
        assert_eq!(
            cache.get_template("default"),
            Some(json!({"name": "Amor Clássico"}))
        );
        assert_eq!(cache.purge_by_slug("default"), 0);
        assert!(cache.get_template("default").is_some());
    }

    #[test]
    fn clear_all_flushes_both_regions() {
        let (cache, _) = cache_with_clock();
        cache.set_template("default", json!({}));
        cache.store_page("ana", "/", 0, page("a"));

        cache.clear_all();

        let stats = cache.stats();
        assert_eq!(stats.site.entries, 0);
        assert_eq!(stats.template.entries, 0);
    }

    #[test]
    fn lookups_emit_hit_and_miss_counters() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let (cache, _) = cache_with_clock();

        metrics::with_local_recorder(&recorder, || {
            assert!(cache.get_page("ana", "/").is_none());
            cache.store_page("ana", "/", 0, page("a"));
            assert!(cache.get_page("ana", "/").is_some());
            cache.purge_by_slug("ana");
        });

        let counters: Vec<(String, u64)> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count) => Some((key.key().name().to_string(), count)),
                _ => None,
            })
            .collect();

        for name in [
            "amora_site_cache_hit_total",
            "amora_site_cache_miss_total",
            "amora_site_cache_store_total",
            "amora_site_cache_purge_total",
        ] {
            assert!(
                counters.contains(&(name.to_string(), 1)),
                "missing {name} in {counters:?}"
            );
        }
    }
}
