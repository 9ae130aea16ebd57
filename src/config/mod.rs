//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use axum::http::HeaderName;
use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;
use crate::tenancy;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "amora";
const ENV_PREFIX: &str = "AMORA";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_BASE_DOMAIN: &str = "seudominio.com";

const LIST_KEYS: &[&str] = &[
    "cache.bypass_prefixes",
    "tenancy.reserved_subdomains",
    "tenancy.local_hosts",
    "tenancy.preview_suffixes",
    "tenancy.platform_suffixes",
];

/// Command-line arguments for the Amora binary.
#[derive(Debug, Parser)]
#[command(name = "amora", version, about = "Amora romantic sites server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "AMORA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Amora HTTP service.
    Serve(Box<ServeArgs>),
    /// Print how a host would be classified, as JSON.
    #[command(name = "resolve-host")]
    ResolveHost(ResolveHostArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveHostArgs {
    /// Host header value to classify, port included if any.
    #[arg(value_name = "HOST")]
    pub host: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the client-site page freshness window.
    #[arg(long = "cache-site-ttl-seconds", value_name = "SECONDS")]
    pub cache_site_ttl_seconds: Option<u64>,

    /// Toggle the client-site response cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub tenancy: TenancySettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub site_ttl_seconds: NonZeroU32,
    pub site_sweep_seconds: NonZeroU32,
    pub site_capacity: NonZeroUsize,
    pub template_ttl_seconds: NonZeroU32,
    pub template_sweep_seconds: NonZeroU32,
    pub template_capacity: NonZeroUsize,
    pub max_body_bytes: NonZeroUsize,
    pub bypass_prefixes: Vec<String>,
    pub status_header: HeaderName,
}

#[derive(Debug, Clone)]
pub struct TenancySettings {
    pub default_host: String,
    pub reserved_subdomains: Vec<String>,
    pub local_hosts: Vec<String>,
    pub preview_suffixes: Vec<String>,
    pub preview_separator: String,
    pub platform_suffixes: Vec<String>,
    pub opaque_id_min_len: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Domain published sites live under, as `<slug>.<base_domain>`.
    pub base_domain: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    let mut environment = Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .list_separator(",");
    for key in LIST_KEYS {
        environment = environment.with_list_parse_key(key);
    }
    builder = builder.add_source(environment);

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::ResolveHost(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    tenancy: RawTenancySettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(ttl) = overrides.cache_site_ttl_seconds {
            self.cache.site_ttl_seconds = Some(ttl);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            tenancy,
            site,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let tenancy = build_tenancy_settings(tenancy)?;
        let site = build_site_settings(site)?;

        Ok(Self {
            server,
            logging,
            cache,
            tenancy,
            site,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let site_ttl = cache
        .site_ttl_seconds
        .unwrap_or(defaults.site_ttl.as_secs());
    let site_sweep = cache
        .site_sweep_seconds
        .unwrap_or(defaults.site_sweep_interval.as_secs());
    let template_ttl = cache
        .template_ttl_seconds
        .unwrap_or(defaults.template_ttl.as_secs());
    let template_sweep = cache
        .template_sweep_seconds
        .unwrap_or(defaults.template_sweep_interval.as_secs());

    let site_capacity = match cache.site_capacity {
        Some(value) => non_zero_usize(value, "cache.site_capacity")?,
        None => defaults.site_capacity,
    };
    let template_capacity = match cache.template_capacity {
        Some(value) => non_zero_usize(value, "cache.template_capacity")?,
        None => defaults.template_capacity,
    };
    let max_body_bytes = non_zero_usize(
        cache
            .max_body_bytes
            .unwrap_or(defaults.max_body_bytes as u64),
        "cache.max_body_bytes",
    )?;

    let bypass_prefixes = match cache.bypass_prefixes {
        Some(prefixes) => {
            let prefixes = trimmed_paths(prefixes);
            if let Some(bad) = prefixes.iter().find(|prefix| !prefix.starts_with('/')) {
                return Err(LoadError::invalid(
                    "cache.bypass_prefixes",
                    format!("prefix `{bad}` must start with `/`"),
                ));
            }
            prefixes
        }
        None => defaults.bypass_prefixes,
    };

    let status_header = match cache.status_header {
        Some(name) => HeaderName::from_bytes(name.trim().to_ascii_lowercase().as_bytes())
            .map_err(|err| LoadError::invalid("cache.status_header", err.to_string()))?,
        None => defaults.status_header,
    };

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        site_ttl_seconds: non_zero_u32(site_ttl, "cache.site_ttl_seconds")?,
        site_sweep_seconds: non_zero_u32(site_sweep, "cache.site_sweep_seconds")?,
        site_capacity,
        template_ttl_seconds: non_zero_u32(template_ttl, "cache.template_ttl_seconds")?,
        template_sweep_seconds: non_zero_u32(template_sweep, "cache.template_sweep_seconds")?,
        template_capacity,
        max_body_bytes,
        bypass_prefixes,
        status_header,
    })
}

fn build_tenancy_settings(tenancy: RawTenancySettings) -> Result<TenancySettings, LoadError> {
    let default_host = tenancy
        .default_host
        .map(|host| host.trim().to_ascii_lowercase())
        .unwrap_or_else(|| tenancy::DEFAULT_HOST.to_string());
    if default_host.is_empty() {
        return Err(LoadError::invalid(
            "tenancy.default_host",
            "host must not be empty",
        ));
    }

    let preview_separator = tenancy
        .preview_separator
        .unwrap_or_else(|| tenancy::DEFAULT_PREVIEW_SEPARATOR.to_string());
    if preview_separator.is_empty() {
        return Err(LoadError::invalid(
            "tenancy.preview_separator",
            "separator must not be empty",
        ));
    }

    let opaque_id_min_len = non_zero_usize(
        tenancy
            .opaque_id_min_len
            .unwrap_or(tenancy::DEFAULT_OPAQUE_ID_MIN_LEN as u64),
        "tenancy.opaque_id_min_len",
    )?;

    Ok(TenancySettings {
        default_host,
        reserved_subdomains: list_or_default(
            tenancy.reserved_subdomains,
            tenancy::DEFAULT_RESERVED_SUBDOMAINS,
        ),
        local_hosts: list_or_default(tenancy.local_hosts, tenancy::DEFAULT_LOCAL_HOSTS),
        preview_suffixes: list_or_default(
            tenancy.preview_suffixes,
            tenancy::DEFAULT_PREVIEW_SUFFIXES,
        ),
        preview_separator,
        platform_suffixes: list_or_default(
            tenancy.platform_suffixes,
            tenancy::DEFAULT_PLATFORM_SUFFIXES,
        ),
        opaque_id_min_len,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let base_domain = site
        .base_domain
        .map(|domain| domain.trim().trim_matches('.').to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_BASE_DOMAIN.to_string());
    if base_domain.is_empty() {
        return Err(LoadError::invalid(
            "site.base_domain",
            "domain must not be empty",
        ));
    }

    Ok(SiteSettings { base_domain })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    site_ttl_seconds: Option<u64>,
    site_sweep_seconds: Option<u64>,
    site_capacity: Option<u64>,
    template_ttl_seconds: Option<u64>,
    template_sweep_seconds: Option<u64>,
    template_capacity: Option<u64>,
    max_body_bytes: Option<u64>,
    bypass_prefixes: Option<Vec<String>>,
    status_header: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTenancySettings {
    default_host: Option<String>,
    reserved_subdomains: Option<Vec<String>>,
    local_hosts: Option<Vec<String>>,
    preview_suffixes: Option<Vec<String>>,
    preview_separator: Option<String>,
    platform_suffixes: Option<Vec<String>>,
    opaque_id_min_len: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    base_domain: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn trimmed_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Paths are case-sensitive, so only surrounding whitespace is dropped.
fn trimmed_paths(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn list_or_default(values: Option<Vec<String>>, defaults: &[&str]) -> Vec<String> {
    match values {
        Some(values) => trimmed_list(values),
        None => defaults.iter().map(|value| (*value).to_string()).collect(),
    }
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.cache.site_ttl_seconds = Some(600);

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            cache_site_ttl_seconds: Some(120),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(settings.cache.site_ttl_seconds.get(), 120);
    }

    #[test]
    fn defaults_match_cache_and_tenancy_defaults() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.site_ttl_seconds.get(), 300);
        assert_eq!(settings.cache.template_ttl_seconds.get(), 3600);
        assert_eq!(settings.cache.site_capacity.get(), 1000);
        assert_eq!(settings.cache.max_body_bytes.get(), 1024 * 1024);
        assert_eq!(settings.cache.status_header.as_str(), "x-cache");
        assert_eq!(settings.cache.bypass_prefixes, vec!["/api/", "/uploads/"]);
        assert_eq!(settings.tenancy.default_host, "localhost:5000");
        assert_eq!(settings.tenancy.preview_separator, "--");
        assert_eq!(settings.tenancy.opaque_id_min_len.get(), 8);
        assert!(
            settings
                .tenancy
                .reserved_subdomains
                .iter()
                .any(|word| word == "www")
        );
        assert_eq!(settings.site.base_domain, "seudominio.com");
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.site_ttl_seconds = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero ttl must fail");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "cache.site_ttl_seconds",
                ..
            }
        ));
    }

    #[test]
    fn invalid_status_header_is_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.status_header = Some("x cache".to_string());

        let err = Settings::from_raw(raw).expect_err("header with space must fail");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "cache.status_header",
                ..
            }
        ));
    }

    #[test]
    fn bypass_prefixes_must_be_absolute() {
        let mut raw = RawSettings::default();
        raw.cache.bypass_prefixes = Some(vec!["api/".to_string()]);

        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn bypass_prefixes_keep_their_case() {
        let mut raw = RawSettings::default();
        raw.cache.bypass_prefixes = Some(vec![" /Uploads/ ".to_string(), "/api/".to_string()]);

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.cache.bypass_prefixes, vec!["/Uploads/", "/api/"]);
        assert!(CacheConfig::from(&settings.cache).is_bypassed("/Uploads/casal.jpg"));
    }

    #[test]
    fn tenancy_lists_are_normalised() {
        let mut raw = RawSettings::default();
        raw.tenancy.reserved_subdomains = Some(vec![" WWW ".to_string(), String::new()]);
        raw.site.base_domain = Some(".Amora.Love.".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.tenancy.reserved_subdomains, vec!["www"]);
        assert_eq!(settings.site.base_domain, "amora.love");
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            cache_enabled: Some(false),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
        assert!(!settings.cache.enabled);
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["amora"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "amora",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--cache-enabled",
            "false",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(serve.overrides.cache_enabled, Some(false));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_resolve_host_arguments() {
        let args = CliArgs::parse_from(["amora", "resolve-host", "joao.seudominio.com"]);

        match args.command.expect("resolve-host command") {
            Command::ResolveHost(resolve) => assert_eq!(resolve.host, "joao.seudominio.com"),
            _ => panic!("wrong command parsed"),
        }
    }
}
