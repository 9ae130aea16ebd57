use std::{future::IntoFuture, process, sync::Arc, time::Instant};

use amora::{
    application::{
        error::AppError,
        projects::{CachePurger, ProjectService},
        repos::ProjectsRepo,
        site::SiteService,
    },
    cache::{CacheConfig, SiteCache, spawn_sweepers},
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        memory::InMemoryProjects,
        telemetry,
    },
    tenancy::{TenancyConfig, classify},
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_serve(settings).await
        }
        config::Command::ResolveHost(args) => run_resolve_host(&settings, &args.host),
    }
}

fn run_resolve_host(settings: &config::Settings, host: &str) -> Result<(), AppError> {
    let tenancy = TenancyConfig::from(&settings.tenancy);
    let classification = classify(host, &tenancy);
    let rendered = serde_json::to_string_pretty(&classification)
        .map_err(|err| AppError::unexpected(format!("failed to encode classification: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let tenancy = Arc::new(TenancyConfig::from(&settings.tenancy));
    let cache = settings
        .cache
        .enabled
        .then(|| SiteCache::new(CacheConfig::from(&settings.cache)));

    let repo: Arc<dyn ProjectsRepo> = Arc::new(InMemoryProjects::new());
    let purger = cache
        .clone()
        .map(|cache| Arc::new(cache) as Arc<dyn CachePurger>);
    let projects = ProjectService::new(
        Arc::clone(&repo),
        settings.tenancy.reserved_subdomains.clone(),
        settings.site.base_domain.clone(),
    )
    .with_cache_purger_opt(purger);
    let sites = SiteService::new(Arc::clone(&repo), settings.site.base_domain.clone())
        .with_template_cache_opt(cache.clone());

    let sweepers = cache.as_ref().map(spawn_sweepers).unwrap_or_default();

    let state = AppState {
        projects: Arc::new(projects),
        sites: Arc::new(sites),
        cache: cache.clone(),
        bypass_prefixes: settings.cache.bypass_prefixes.clone().into(),
        started_at: Instant::now(),
    };

    let result = serve_http(&settings, state, tenancy).await;

    for handle in sweepers {
        handle.abort();
        let _ = handle.await;
    }
    if let Some(cache) = &cache {
        cache.clear_all();
    }

    result
}

async fn serve_http(
    settings: &config::Settings,
    state: AppState,
    tenancy: Arc<TenancyConfig>,
) -> Result<(), AppError> {
    let router = http::build_router(state, tenancy);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        addr = %settings.server.addr,
        cache_enabled = settings.cache.enabled,
        "listening"
    );

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = Arc::clone(&stopping);
        async move {
            shutdown_signal().await;
            stopping.notify_one();
        }
    };

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
