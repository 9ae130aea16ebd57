use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, Method, Request, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::info;

use crate::application::error::{ErrorReport, HttpError};
use crate::cache::is_under_prefixes;
use crate::domain::tenant::TenantClassification;
use crate::presentation::views::{
    SITE_NOT_FOUND_MESSAGE, render_error_response, render_not_found_response,
    render_site_response,
};

use super::AppState;

const PAGE_NOT_FOUND_MESSAGE: &str = "Página não encontrada.";

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/site/{slug}", get(site_by_path))
}

/// Catch-all: client-site hosts get their published page on every path outside
/// the bypass namespaces, system hosts have nothing outside the API.
pub(super) async fn fallback(State(state): State<AppState>, request: Request<Body>) -> Response {
    let slug = tenant_slug(&request);
    let method = request.method().clone();
    let reserved_path = is_under_prefixes(&state.bypass_prefixes, request.uri().path());

    match slug {
        Some(_) if reserved_path => render_not_found_response(PAGE_NOT_FOUND_MESSAGE),
        Some(slug) if method == Method::GET || method == Method::HEAD => {
            render_published(&state, &slug).await
        }
        Some(_) => HttpError::new(
            "infra::http::public::fallback",
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            format!("{method} is not served on client sites"),
        )
        .into_response(),
        None => render_not_found_response(PAGE_NOT_FOUND_MESSAGE),
    }
}

/// `/site/{slug}`: direct access to a published site without its own host.
///
/// On a client-site host the tenant's own page wins over the path.
async fn site_by_path(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    request: Request<Body>,
) -> Response {
    if let Some(tenant) = tenant_slug(&request) {
        return render_published(&state, &tenant).await;
    }

    let slug = slug.trim().to_ascii_lowercase();
    info!(
        target = "amora::http::public",
        slug = %slug,
        "development site access"
    );
    let mut response = render_published(&state, &slug).await;
    set_no_store(&mut response);
    response
}

fn tenant_slug(request: &Request<Body>) -> Option<String> {
    request
        .extensions()
        .get::<TenantClassification>()
        .and_then(|classification| classification.slug())
        .map(str::to_string)
}

async fn render_published(state: &AppState, slug: &str) -> Response {
    match state.sites.render(slug).await {
        Ok(Some(view)) => render_site_response(view),
        Ok(None) => render_not_found_response(SITE_NOT_FOUND_MESSAGE),
        Err(err) => render_error_response(ErrorReport::from_error(
            "infra::http::public::render_published",
            StatusCode::INTERNAL_SERVER_ERROR,
            &err,
        )),
    }
}

fn set_no_store(response: &mut Response) {
    let value = HeaderValue::from_static("no-store");
    response.headers_mut().insert(CACHE_CONTROL, value);
}
