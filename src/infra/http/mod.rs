mod api;
mod health;
mod middleware;
mod public;

pub use api::{OwnerId, USER_ID_HEADER};
pub use middleware::RequestContext;

use std::{sync::Arc, time::Instant};

use axum::{Router, middleware as axum_middleware};

use crate::application::{projects::ProjectService, site::SiteService};
use crate::cache::{SiteCache, site_cache_layer};
use crate::tenancy::{TenancyConfig, resolve_tenant};

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<ProjectService>,
    pub sites: Arc<SiteService>,
    /// `None` when caching is disabled.
    pub cache: Option<SiteCache>,
    /// Namespaces that never render a site page, cached or not.
    pub bypass_prefixes: Arc<[String]>,
    pub started_at: Instant,
}

/// Full application router.
///
/// Outermost to innermost: request context, tenant resolution, response
/// logging, site cache (only when enabled), routes.
pub fn build_router(state: AppState, tenancy: Arc<TenancyConfig>) -> Router {
    let cache = state
        .cache
        .clone()
        .filter(|cache| cache.config().enabled);

    let routes = Router::new()
        .merge(health::routes())
        .merge(api::routes())
        .merge(public::routes())
        .fallback(public::fallback)
        .with_state(state);

    let routes = match cache {
        Some(cache) => routes.layer(axum_middleware::from_fn_with_state(
            cache,
            site_cache_layer,
        )),
        None => routes,
    };

    routes
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn_with_state(tenancy, resolve_tenant))
        .layer(axum_middleware::from_fn(set_request_context))
}
