//! Hosting-environment rules for pulling a tenant slug out of a hostname.
//!
//! Rules are data: new hosting environments of an existing shape are added
//! through configuration, without touching the resolver's control flow.

/// What a rule decided for a host it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The rule extracted a tenant candidate. Reserved-word filtering still applies.
    Tenant(String),
    /// The host belongs to this environment but names no tenant.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRule {
    /// Preview hosting that embeds the tenant before a separator, as in
    /// `joao-maria--myapp.replit.dev`.
    Preview {
        suffixes: Vec<String>,
        separator: String,
    },
    /// Deployment platform where the tenant is the leading label in front of the
    /// application's own label, as in `joao.myapp.vercel.app`. Leading labels that
    /// start with a long run of hex digits are platform-generated deployment ids.
    /// `myapp.vercel.app` on its own is the application, not a tenant.
    Platform {
        suffix: String,
        opaque_id_min_len: usize,
    },
}

impl HostRule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Preview { .. } => "preview",
            Self::Platform { .. } => "platform",
        }
    }

    /// Evaluate the rule for a lower-cased, port-free `host`. `None` means the rule
    /// does not apply to this host.
    pub fn evaluate(&self, host: &str, labels: &[&str]) -> Option<RuleOutcome> {
        match self {
            Self::Preview {
                suffixes,
                separator,
            } => evaluate_preview(host, labels, suffixes, separator),
            Self::Platform {
                suffix,
                opaque_id_min_len,
            } => evaluate_platform(host, labels, suffix, *opaque_id_min_len),
        }
    }
}

fn evaluate_preview(
    host: &str,
    labels: &[&str],
    suffixes: &[String],
    separator: &str,
) -> Option<RuleOutcome> {
    let leading = labels.first()?;
    let has_separator =
        !separator.is_empty() && leading.contains(separator) && !is_idn_label(leading);

    if !has_separator {
        // A preview host without a tenant prefix is the preview of the app itself.
        return suffixes
            .iter()
            .any(|suffix| is_under_suffix(host, suffix))
            .then_some(RuleOutcome::System);
    }

    let slug = leading
        .split_once(separator)
        .map(|(slug, _)| slug)
        .unwrap_or_default();

    if slug.is_empty() || slug.starts_with('-') {
        return Some(RuleOutcome::System);
    }

    Some(RuleOutcome::Tenant(slug.to_string()))
}

fn evaluate_platform(
    host: &str,
    labels: &[&str],
    suffix: &str,
    opaque_id_min_len: usize,
) -> Option<RuleOutcome> {
    if !is_under_suffix(host, suffix) {
        return None;
    }

    let leading = labels.first()?;
    if is_opaque_deployment_id(leading, opaque_id_min_len) {
        return Some(RuleOutcome::System);
    }

    // `<tenant>.<app>.<suffix>`: the app label alone is the application itself.
    let suffix_labels = suffix.trim_start_matches('.').split('.').count();

    if labels.len() >= suffix_labels + 2 {
        Some(RuleOutcome::Tenant((*leading).to_string()))
    } else {
        Some(RuleOutcome::System)
    }
}

/// `host` equals `suffix` or ends with `.suffix`.
pub(crate) fn is_under_suffix(host: &str, suffix: &str) -> bool {
    let suffix = suffix.trim_start_matches('.');
    if suffix.is_empty() {
        return false;
    }
    host == suffix
        || host
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with('.'))
}

fn is_opaque_deployment_id(label: &str, min_len: usize) -> bool {
    let run = label
        .chars()
        .take_while(|c| matches!(c, 'a'..='f' | '0'..='9' | '-'))
        .count();
    min_len > 0 && run >= min_len
}

fn is_idn_label(label: &str) -> bool {
    label.starts_with("xn--")
}
