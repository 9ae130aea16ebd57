use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::HOST},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{debug, warn};

use crate::domain::tenant::{ResolutionSource, TenantClassification};

use super::resolver::{TenancyConfig, classify};

const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";

/// Classify the request host and attach the [`TenantClassification`] to the
/// request extensions for every later stage.
pub async fn resolve_tenant(
    State(config): State<Arc<TenancyConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let classification = match effective_host(request.headers(), &config.default_host) {
        Ok(host) => classify(&host, &config),
        Err(raw) => TenantClassification::system(raw, ResolutionSource::Malformed),
    };

    if classification.source == ResolutionSource::Malformed {
        warn!(
            target = "amora::tenancy",
            host = %classification.raw_host,
            path = %request.uri().path(),
            "malformed host header; treating request as system"
        );
    } else {
        debug!(
            target = "amora::tenancy",
            host = %classification.raw_host,
            kind = classification.kind_label(),
            slug = classification.slug().unwrap_or(""),
            source = classification.source.as_str(),
            "classified request host"
        );
    }
    counter!("amora_tenant_classified_total", "kind" => classification.kind_label()).increment(1);

    request.extensions_mut().insert(classification);
    next.run(request).await
}

/// Host header, then the first `X-Forwarded-Host` entry, then the configured
/// default. A header that is present but not valid text is returned as `Err`
/// with its lossy rendering.
fn effective_host(headers: &HeaderMap, default_host: &str) -> Result<String, String> {
    if let Some(value) = headers.get(HOST) {
        return value
            .to_str()
            .map(str::to_string)
            .map_err(|_| String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    if let Some(value) = headers.get(FORWARDED_HOST_HEADER) {
        return match value.to_str() {
            Ok(forwarded) => Ok(forwarded
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()),
            Err(_) => Err(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        };
    }

    Ok(default_host.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn host_header_wins_over_forwarded_host() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("ana.example.com"));
        headers.insert(FORWARDED_HOST_HEADER, HeaderValue::from_static("joao.example.com"));

        assert_eq!(
            effective_host(&headers, "localhost:5000"),
            Ok("ana.example.com".to_string())
        );
    }

    #[test]
    fn forwarded_host_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_HOST_HEADER,
            HeaderValue::from_static("joao.example.com, proxy.internal"),
        );

        assert_eq!(
            effective_host(&headers, "localhost:5000"),
            Ok("joao.example.com".to_string())
        );
    }

    #[test]
    fn falls_back_to_default_host() {
        assert_eq!(
            effective_host(&HeaderMap::new(), "localhost:5000"),
            Ok("localhost:5000".to_string())
        );
    }

    #[test]
    fn opaque_header_bytes_are_reported() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HOST,
            HeaderValue::from_bytes(b"ana\xffexample.com").expect("opaque header value"),
        );

        assert!(effective_host(&headers, "localhost:5000").is_err());
    }
}
