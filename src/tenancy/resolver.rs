//! Host classification.
//!
//! [`classify`] is a pure function of the host string and the configured rules:
//! the same input always yields the same classification. Anything ambiguous or
//! unparsable resolves to `System`, so a tenant page is never exposed by accident.

use std::net::Ipv4Addr;

use tracing::debug;

use crate::domain::tenant::{ResolutionSource, TenantClassification};

use super::rules::{HostRule, RuleOutcome};

pub const DEFAULT_HOST: &str = "localhost:5000";
pub const DEFAULT_RESERVED_SUBDOMAINS: &[&str] = &[
    "app",
    "api",
    "www",
    "mail",
    "ftp",
    "admin",
    "system",
    "localhost",
    "localhost:5000",
];
pub const DEFAULT_LOCAL_HOSTS: &[&str] = &["localhost", "localhost:5000"];
pub const DEFAULT_PREVIEW_SUFFIXES: &[&str] = &["replit.dev", "replit.app"];
pub const DEFAULT_PREVIEW_SEPARATOR: &str = "--";
pub const DEFAULT_PLATFORM_SUFFIXES: &[&str] = &["vercel.app"];
pub const DEFAULT_OPAQUE_ID_MIN_LEN: usize = 8;

/// Resolver configuration: reserved words, local hosts and the hosting rules in
/// priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenancyConfig {
    pub default_host: String,
    pub reserved_subdomains: Vec<String>,
    pub local_hosts: Vec<String>,
    pub rules: Vec<HostRule>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self::from_parts(
            DEFAULT_HOST.to_string(),
            owned(DEFAULT_RESERVED_SUBDOMAINS),
            owned(DEFAULT_LOCAL_HOSTS),
            owned(DEFAULT_PREVIEW_SUFFIXES),
            DEFAULT_PREVIEW_SEPARATOR.to_string(),
            owned(DEFAULT_PLATFORM_SUFFIXES),
            DEFAULT_OPAQUE_ID_MIN_LEN,
        )
    }
}

impl From<&crate::config::TenancySettings> for TenancyConfig {
    fn from(settings: &crate::config::TenancySettings) -> Self {
        Self::from_parts(
            settings.default_host.clone(),
            settings.reserved_subdomains.clone(),
            settings.local_hosts.clone(),
            settings.preview_suffixes.clone(),
            settings.preview_separator.clone(),
            settings.platform_suffixes.clone(),
            settings.opaque_id_min_len.get(),
        )
    }
}

impl TenancyConfig {
    /// Build the rule list in its fixed priority order: preview hosting first,
    /// then one platform rule per suffix.
    pub fn from_parts(
        default_host: String,
        reserved_subdomains: Vec<String>,
        local_hosts: Vec<String>,
        preview_suffixes: Vec<String>,
        preview_separator: String,
        platform_suffixes: Vec<String>,
        opaque_id_min_len: usize,
    ) -> Self {
        let mut rules = vec![HostRule::Preview {
            suffixes: lowercase(preview_suffixes),
            separator: preview_separator,
        }];
        rules.extend(
            lowercase(platform_suffixes)
                .into_iter()
                .map(|suffix| HostRule::Platform {
                    suffix,
                    opaque_id_min_len,
                }),
        );

        Self {
            default_host,
            reserved_subdomains: lowercase(reserved_subdomains),
            local_hosts: lowercase(local_hosts),
            rules,
        }
    }

    fn is_reserved(&self, label: &str) -> bool {
        self.reserved_subdomains.iter().any(|word| word == label)
    }

    fn is_local(&self, host: &str) -> bool {
        self.local_hosts.iter().any(|local| local == host)
    }
}

/// Classify a request host.
pub fn classify(raw_host: &str, config: &TenancyConfig) -> TenantClassification {
    let lowered = raw_host.trim().to_ascii_lowercase();

    if config.is_local(&lowered) {
        return TenantClassification::system(raw_host, ResolutionSource::LocalHost);
    }

    let host = match normalize_host(&lowered) {
        Ok(NormalizedHost::Name(host)) => host,
        Ok(NormalizedHost::IpLiteral) => {
            return TenantClassification::system(raw_host, ResolutionSource::Fallback);
        }
        Err(()) => return TenantClassification::system(raw_host, ResolutionSource::Malformed),
    };

    if config.is_local(host) {
        return TenantClassification::system(raw_host, ResolutionSource::LocalHost);
    }

    let labels: Vec<&str> = host.split('.').collect();

    let (candidate, source) = match first_matching_rule(host, &labels, config) {
        Some((RuleOutcome::Tenant(label), source)) => (label, source),
        Some((RuleOutcome::System, source)) => {
            return TenantClassification::system(raw_host, source);
        }
        None if labels.len() > 2 => (labels[0].to_string(), ResolutionSource::Subdomain),
        None => return TenantClassification::system(raw_host, ResolutionSource::Fallback),
    };

    if config.is_reserved(&candidate) {
        return TenantClassification::system(raw_host, ResolutionSource::Reserved);
    }

    if !is_valid_label(&candidate) {
        return TenantClassification::system(raw_host, ResolutionSource::Malformed);
    }

    TenantClassification::client_site(raw_host, candidate, source)
}

fn first_matching_rule(
    host: &str,
    labels: &[&str],
    config: &TenancyConfig,
) -> Option<(RuleOutcome, ResolutionSource)> {
    let mut matched: Option<(RuleOutcome, ResolutionSource, &'static str)> = None;

    for rule in &config.rules {
        let Some(outcome) = rule.evaluate(host, labels) else {
            continue;
        };
        match &matched {
            None => {
                let source = match rule {
                    HostRule::Preview { .. } => ResolutionSource::Preview,
                    HostRule::Platform { .. } => ResolutionSource::Platform,
                };
                matched = Some((outcome, source, rule.name()));
            }
            Some((_, _, winner)) => {
                debug!(
                    target = "amora::tenancy",
                    host,
                    winner = *winner,
                    shadowed = rule.name(),
                    "host matches more than one hosting rule; first rule wins"
                );
            }
        }
    }

    matched.map(|(outcome, source, _)| (outcome, source))
}

enum NormalizedHost<'a> {
    Name(&'a str),
    IpLiteral,
}

/// Strip the port and a trailing root dot, then check the remaining characters.
fn normalize_host(host: &str) -> Result<NormalizedHost<'_>, ()> {
    if host.is_empty() {
        return Err(());
    }

    if host.starts_with('[') {
        return if host.contains(']') {
            Ok(NormalizedHost::IpLiteral)
        } else {
            Err(())
        };
    }

    let name = match host.split_once(':') {
        Some((name, port)) => {
            if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                return Err(());
            }
            name
        }
        None => host,
    };
    let name = name.strip_suffix('.').unwrap_or(name);

    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        || name.split('.').any(str::is_empty)
    {
        return Err(());
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return Ok(NormalizedHost::IpLiteral);
    }

    Ok(NormalizedHost::Name(name))
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn lowercase(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
