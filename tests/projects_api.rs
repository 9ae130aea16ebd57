use std::sync::Arc;
use std::time::Instant;

use amora::application::projects::ProjectService;
use amora::application::repos::ProjectsRepo;
use amora::application::site::SiteService;
use amora::cache::{CacheConfig, SiteCache};
use amora::infra::http::{AppState, USER_ID_HEADER, build_router};
use amora::infra::memory::InMemoryProjects;
use amora::tenancy::TenancyConfig;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::CONTENT_TYPE, header::HOST},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn router() -> (Router, SiteCache) {
    let repo: Arc<dyn ProjectsRepo> = Arc::new(InMemoryProjects::new());
    let cache = SiteCache::new(CacheConfig::default());
    let tenancy = TenancyConfig::default();

    let projects = ProjectService::new(
        Arc::clone(&repo),
        tenancy.reserved_subdomains.clone(),
        "seudominio.com",
    )
    .with_cache_purger(Arc::new(cache.clone()));
    let sites =
        SiteService::new(repo, "seudominio.com").with_template_cache_opt(Some(cache.clone()));

    let state = AppState {
        projects: Arc::new(projects),
        sites: Arc::new(sites),
        cache: Some(cache.clone()),
        bypass_prefixes: CacheConfig::default().bypass_prefixes.into(),
        started_at: Instant::now(),
    };
    (build_router(state, Arc::new(tenancy)), cache)
}

async fn call(
    router: &Router,
    method: Method,
    path: &str,
    owner: Option<Uuid>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, "localhost:5000");
    if let Some(owner) = owner {
        builder = builder.header(USER_ID_HEADER, owner.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be json")
}

async fn create(router: &Router, owner: Uuid, name: &str) -> String {
    let response = call(
        router,
        Method::POST,
        "/api/projects",
        Some(owner),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["project"]["id"]
        .as_str()
        .expect("project id")
        .to_string()
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let (router, _) = router();

    let missing = call(&router, Method::GET, "/api/projects", None, None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/projects")
        .header(HOST, "localhost:5000")
        .header(USER_ID_HEADER, "not-a-uuid")
        .body(Body::empty())
        .expect("request should build");
    let invalid = router.oneshot(request).await.expect("router should respond");
    assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn publish_derives_slug_and_returns_site_url() {
    let (router, _) = router();
    let owner = Uuid::new_v4();
    let id = create(&router, owner, "João & Maria").await;

    let response = call(
        &router,
        Method::POST,
        &format!("/api/projects/{id}/publish"),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["project"]["slug"], "joao-maria");
    assert_eq!(body["project"]["status"], "published");
    assert_eq!(body["siteUrl"], "https://joao-maria.seudominio.com");
}

#[tokio::test]
async fn colliding_names_get_numbered_slugs() {
    let (router, _) = router();
    let owner = Uuid::new_v4();

    let mut slugs = Vec::new();
    for _ in 0..3 {
        let id = create(&router, owner, "Nosso Amor").await;
        let response = call(
            &router,
            Method::POST,
            &format!("/api/projects/{id}/publish"),
            Some(owner),
            None,
        )
        .await;
        let body = json_body(response).await;
        slugs.push(body["project"]["slug"].as_str().unwrap_or("").to_string());
    }

    assert_eq!(slugs, vec!["nosso-amor", "nosso-amor-1", "nosso-amor-2"]);
}

#[tokio::test]
async fn long_colliding_names_still_publish() {
    let (router, _) = router();
    let owner = Uuid::new_v4();
    let name = "Nossa historia de amor comecou numa tarde de primavera em Lisboa junto ao rio";

    let mut slugs = Vec::new();
    for _ in 0..2 {
        let id = create(&router, owner, name).await;
        let response = call(
            &router,
            Method::POST,
            &format!("/api/projects/{id}/publish"),
            Some(owner),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        slugs.push(body["project"]["slug"].as_str().unwrap_or("").to_string());
    }

    assert_ne!(slugs[0], slugs[1]);
    assert!(slugs.iter().all(|slug| slug.len() <= 63), "{slugs:?}");
    assert!(slugs[1].ends_with("-1"), "{slugs:?}");
}

#[tokio::test]
async fn projects_are_scoped_to_their_owner() {
    let (router, _) = router();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let id = create(&router, owner, "Nosso Amor").await;

    let foreign = call(
        &router,
        Method::GET,
        &format!("/api/projects/{id}"),
        Some(stranger),
        None,
    )
    .await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

    let listed = call(&router, Method::GET, "/api/projects", Some(stranger), None).await;
    let listed = json_body(listed).await;
    assert_eq!(listed["count"], 0);

    let listed = call(&router, Method::GET, "/api/projects", Some(owner), None).await;
    let listed = json_body(listed).await;
    assert_eq!(listed["count"], 1);
}

#[tokio::test]
async fn invalid_input_is_reported_as_bad_request() {
    let (router, _) = router();
    let owner = Uuid::new_v4();

    let short_name = call(
        &router,
        Method::POST,
        "/api/projects",
        Some(owner),
        Some(json!({ "name": "A" })),
    )
    .await;
    assert_eq!(short_name.status(), StatusCode::BAD_REQUEST);

    let id = create(&router, owner, "Nosso Amor").await;
    let bad_color = call(
        &router,
        Method::PUT,
        &format!("/api/projects/{id}/colors"),
        Some(owner),
        Some(json!({ "primaryColor": "pink" })),
    )
    .await;
    assert_eq!(bad_color.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(bad_color).await["error"].is_string());

    let bad_id = call(&router, Method::GET, "/api/projects/42", Some(owner), None).await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn slug_changes_reject_reserved_and_taken_slugs() {
    let (router, _) = router();
    let owner = Uuid::new_v4();
    let first = create(&router, owner, "Nosso Amor").await;
    let second = create(&router, owner, "Outro Amor").await;

    let claimed = call(
        &router,
        Method::PUT,
        &format!("/api/projects/{first}/slug"),
        Some(owner),
        Some(json!({ "slug": "nosso-amor" })),
    )
    .await;
    assert_eq!(claimed.status(), StatusCode::OK);

    let conflict = call(
        &router,
        Method::PUT,
        &format!("/api/projects/{second}/slug"),
        Some(owner),
        Some(json!({ "slug": "nosso-amor" })),
    )
    .await;
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    let reserved = call(
        &router,
        Method::PUT,
        &format!("/api/projects/{second}/slug"),
        Some(owner),
        Some(json!({ "slug": "www" })),
    )
    .await;
    assert_eq!(reserved.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preview_applies_theme_defaults() {
    let (router, _) = router();
    let owner = Uuid::new_v4();
    let id = create(&router, owner, "Nosso Amor").await;

    let response = call(
        &router,
        Method::GET,
        &format!("/api/projects/{id}/preview"),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["project"]["status"], "draft");
    assert_eq!(body["preview"]["mainTitle"], "Nossa História");
    assert_eq!(body["preview"]["colors"]["primary"], "#ff6b9d");
}

#[tokio::test]
async fn color_update_purges_the_published_site() {
    let (router, cache) = router();
    let owner = Uuid::new_v4();
    let id = create(&router, owner, "Nosso Amor").await;
    call(
        &router,
        Method::POST,
        &format!("/api/projects/{id}/publish"),
        Some(owner),
        None,
    )
    .await;

    let site = Request::builder()
        .uri("/")
        .header(HOST, "nosso-amor.seudominio.com")
        .body(Body::empty())
        .expect("request should build");
    let response = router
        .clone()
        .oneshot(site)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache.stats().site.entries, 1);

    let update = call(
        &router,
        Method::PUT,
        &format!("/api/projects/{id}/colors"),
        Some(owner),
        Some(json!({ "primaryColor": "#aa0033" })),
    )
    .await;
    assert_eq!(update.status(), StatusCode::OK);
    assert_eq!(cache.stats().site.entries, 0);
}

#[tokio::test]
async fn delete_removes_the_project() {
    let (router, _) = router();
    let owner = Uuid::new_v4();
    let id = create(&router, owner, "Nosso Amor").await;

    let deleted = call(
        &router,
        Method::DELETE,
        &format!("/api/projects/{id}"),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = call(
        &router,
        Method::GET,
        &format!("/api/projects/{id}"),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_template_endpoints_report_state() {
    let (router, cache) = router();

    let health = json_body(call(&router, Method::GET, "/api/health", None, None).await).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["cache"]["enabled"], true);

    let template = call(&router, Method::GET, "/api/template", None, None).await;
    assert_eq!(template.status(), StatusCode::OK);
    assert_eq!(json_body(template).await["name"], "Amor Clássico");
    assert_eq!(cache.stats().template.entries, 1);
}
