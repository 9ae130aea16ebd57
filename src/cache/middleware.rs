//! Site cache middleware.
//!
//! Serves client-site pages from the page region and records fresh `200 OK`
//! renders for reuse. Requests for the system application, and client-site
//! requests under a bypass prefix, pass through untouched.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{debug, instrument, warn};

use crate::domain::tenant::TenantClassification;

use super::capture::{ResponseObserver, capture_response, is_storable};
use super::site::SiteCache;
use super::store::CachedPage;

const HIT: &str = "HIT";
const MISS: &str = "MISS";

/// Middleware for client-site response caching.
///
/// Expects the tenant resolver to have run first; without a classification in
/// the request extensions the request is treated as system traffic.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn site_cache_layer(
    State(cache): State<SiteCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(slug) = request
        .extensions()
        .get::<TenantClassification>()
        .and_then(TenantClassification::slug)
        .map(str::to_owned)
    else {
        return next.run(request).await;
    };

    let path = request.uri().path().to_owned();
    if cache.config().is_bypassed(&path) {
        return next.run(request).await;
    }

    let status_header = cache.config().status_header.clone();
    let method = request.method().clone();

    if method != Method::GET && method != Method::HEAD {
        let response = next.run(request).await;
        return mark(response, status_header, MISS);
    }

    if let Some(page) = cache.get_page(&slug, &path) {
        debug!(
            target = "amora::cache",
            slug = %slug,
            outcome = "hit",
            "serving cached page"
        );
        return mark(page_response(page), status_header, HIT);
    }

    debug!(
        target = "amora::cache",
        slug = %slug,
        outcome = "miss",
        "cache miss, rendering page"
    );
    // Read before the renderer loads the project; a purge after this point wins.
    let generation = cache.generation(&slug);
    let response = next.run(request).await;

    // HEAD responses carry no body, so only GET renders are recorded.
    if method != Method::GET || !is_storable(&response) {
        return mark(response, status_header, MISS);
    }

    let recorder = PageRecorder {
        cache: &cache,
        slug: &slug,
        path: &path,
        generation,
    };
    let response = match capture_response(response, cache.config().max_body_bytes, &recorder)
        .await
    {
        Ok(response) => response,
        Err((response, error)) => {
            warn!(
                target = "amora::cache",
                slug = %slug,
                error = %error,
                "failed to capture rendered page; not storing"
            );
            response
        }
    };

    mark(response, status_header, MISS)
}

struct PageRecorder<'a> {
    cache: &'a SiteCache,
    slug: &'a str,
    path: &'a str,
    generation: u64,
}

impl ResponseObserver for PageRecorder<'_> {
    fn observe(&self, status: StatusCode, content_type: &str, body: &Bytes) {
        self.cache.store_page(
            self.slug,
            self.path,
            self.generation,
            CachedPage {
                status: status.as_u16(),
                content_type: content_type.to_owned(),
                body: body.clone(),
            },
        );
    }
}

fn page_response(page: CachedPage) -> Response {
    let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::OK);
    let mut response = (status, page.body).into_response();
    if let Ok(content_type) = HeaderValue::from_str(&page.content_type) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    response
}

fn mark(mut response: Response, name: HeaderName, value: &'static str) -> Response {
    response
        .headers_mut()
        .insert(name, HeaderValue::from_static(value));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_page_keeps_status_and_content_type() {
        let response = page_response(CachedPage {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: Bytes::from_static(b"<p>oi</p>"),
        });

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }
}
