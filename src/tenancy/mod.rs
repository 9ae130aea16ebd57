//! Tenant resolution.
//!
//! Classifies every request by its hostname into the authoring application
//! (`System`) or a published project's public site (`ClientSite`), based on:
//!
//! - **Preview hosting**: `joao-maria--myapp.replit.dev` → `joao-maria`
//! - **Deployment platforms**: `joao.myapp.vercel.app` → `joao`
//! - **Custom domains**: `joao.seudominio.com` → `joao`
//!
//! Reserved words (`api`, `www`, ...) and local-development hosts are always
//! `System`, as is anything that fails to parse.

mod middleware;
mod resolver;
mod rules;

pub use middleware::resolve_tenant;
pub use resolver::{
    DEFAULT_HOST, DEFAULT_LOCAL_HOSTS, DEFAULT_OPAQUE_ID_MIN_LEN, DEFAULT_PLATFORM_SUFFIXES,
    DEFAULT_PREVIEW_SEPARATOR, DEFAULT_PREVIEW_SUFFIXES, DEFAULT_RESERVED_SUBDOMAINS,
    TenancyConfig, classify,
};
pub use rules::{HostRule, RuleOutcome};
