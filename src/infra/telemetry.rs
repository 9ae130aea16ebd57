use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "amora_site_cache_hit_total",
            Unit::Count,
            "Client-site requests answered from the page region."
        );
        describe_counter!(
            "amora_site_cache_miss_total",
            Unit::Count,
            "Client-site requests that reached the renderer."
        );
        describe_counter!(
            "amora_site_cache_store_total",
            Unit::Count,
            "Rendered client-site pages written to the page region."
        );
        describe_counter!(
            "amora_site_cache_purge_total",
            Unit::Count,
            "Slug invalidations applied to the page region."
        );
        describe_counter!(
            "amora_cache_expired_swept_total",
            Unit::Count,
            "Expired entries removed by the periodic sweep, per region."
        );
        describe_counter!(
            "amora_cache_evict_total",
            Unit::Count,
            "Entries evicted because a region reached capacity."
        );
        describe_counter!(
            "amora_tenant_classified_total",
            Unit::Count,
            "Requests classified by the tenant resolver, per kind."
        );
    });
}
