//! Cache key construction.
//!
//! Page keys are `site:<slug>:<path>`. The query string is deliberately not
//! part of the key, so renderers must not vary output by query parameters.

const SITE_NAMESPACE: &str = "site";
const TEMPLATE_NAMESPACE: &str = "template";

/// Key of a rendered client-site page.
pub fn site_key(slug: &str, path: &str) -> String {
    format!("{SITE_NAMESPACE}:{slug}:{path}")
}

/// Prefix shared by every page key of `slug`.
pub fn site_prefix(slug: &str) -> String {
    format!("{SITE_NAMESPACE}:{slug}:")
}

/// Key of a template fragment.
pub fn template_key(name: &str) -> String {
    format!("{TEMPLATE_NAMESPACE}:{name}")
}
