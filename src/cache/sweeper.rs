use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use super::site::SiteCache;

/// Spawn one expiry sweeper per region. Abort the handles on shutdown.
pub fn spawn_sweepers(cache: &SiteCache) -> Vec<JoinHandle<()>> {
    let config = cache.config();
    vec![
        spawn_sweeper(
            "site",
            config.site_sweep_interval,
            cache.clone(),
            SiteCache::sweep_pages,
        ),
        spawn_sweeper(
            "template",
            config.template_sweep_interval,
            cache.clone(),
            SiteCache::sweep_templates,
        ),
    ]
}

fn spawn_sweeper(
    region: &'static str,
    period: Duration,
    cache: SiteCache,
    sweep: fn(&SiteCache) -> usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can have expired yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = sweep(&cache);
            if removed > 0 {
                debug!(
                    target = "amora::cache",
                    region,
                    removed,
                    "swept expired cache entries"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::CachedPage;

    #[tokio::test(start_paused = true)]
    async fn sweeper_reclaims_expired_pages_on_its_interval() {
        let clock = ManualClock::default();
        let cache = SiteCache::with_clock(CacheConfig::default(), Arc::new(clock.clone()));
        cache.store_page(
            "ana",
            "/",
            0,
            CachedPage {
                status: 200,
                content_type: "text/html".to_string(),
                body: Bytes::from_static(b"a"),
            },
        );
        clock.advance(Duration::from_secs(301));
        assert_eq!(cache.stats().site.entries, 1);

        let handles = spawn_sweepers(&cache);
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(cache.stats().site.entries, 0);
        for handle in handles {
            handle.abort();
        }
    }
}
