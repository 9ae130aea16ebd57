//! Per-request tenant classification.
//!
//! Every inbound request is either aimed at the authoring application itself
//! (`System`) or at a published project's public page (`ClientSite`). The slug
//! lives inside the `ClientSite` variant so a system request can never carry one.

use serde::Serialize;

/// Which step of host analysis produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Host matched a configured local-development host.
    LocalHost,
    /// Preview hosting that embeds the tenant before a separator (`<slug>--<rest>`).
    Preview,
    /// Deployment platform suffix with the tenant as the leading label.
    Platform,
    /// Generic `<slug>.<registered-domain>` host.
    Subdomain,
    /// Nothing matched; the bare application host.
    Fallback,
    /// Extracted label is on the reserved list.
    Reserved,
    /// Host could not be parsed.
    Malformed,
}

impl ResolutionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalHost => "local_host",
            Self::Preview => "preview",
            Self::Platform => "platform",
            Self::Subdomain => "subdomain",
            Self::Fallback => "fallback",
            Self::Reserved => "reserved",
            Self::Malformed => "malformed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TenantKind {
    System,
    ClientSite { slug: String },
}

/// Result of classifying one request host. Created once per request and read by
/// every downstream stage through request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantClassification {
    pub raw_host: String,
    #[serde(flatten)]
    pub kind: TenantKind,
    pub source: ResolutionSource,
}

impl TenantClassification {
    pub fn system(raw_host: impl Into<String>, source: ResolutionSource) -> Self {
        Self {
            raw_host: raw_host.into(),
            kind: TenantKind::System,
            source,
        }
    }

    pub fn client_site(
        raw_host: impl Into<String>,
        slug: impl Into<String>,
        source: ResolutionSource,
    ) -> Self {
        Self {
            raw_host: raw_host.into(),
            kind: TenantKind::ClientSite { slug: slug.into() },
            source,
        }
    }

    pub fn is_client_site(&self) -> bool {
        matches!(self.kind, TenantKind::ClientSite { .. })
    }

    /// Project slug for client-site requests, `None` for system requests.
    pub fn slug(&self) -> Option<&str> {
        match &self.kind {
            TenantKind::ClientSite { slug } => Some(slug.as_str()),
            TenantKind::System => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            TenantKind::System => "system",
            TenantKind::ClientSite { .. } => "client_site",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_present_only_for_client_sites() {
        let site = TenantClassification::client_site(
            "ana.example.com",
            "ana",
            ResolutionSource::Subdomain,
        );
        assert!(site.is_client_site());
        assert_eq!(site.slug(), Some("ana"));

        let system = TenantClassification::system("example.com", ResolutionSource::Fallback);
        assert!(!system.is_client_site());
        assert_eq!(system.slug(), None);
    }

    #[test]
    fn serializes_with_flattened_kind() {
        let site = TenantClassification::client_site(
            "ana--x.replit.dev",
            "ana",
            ResolutionSource::Preview,
        );
        let json = serde_json::to_value(&site).expect("serialize classification");
        assert_eq!(json["kind"], "client_site");
        assert_eq!(json["slug"], "ana");
        assert_eq!(json["source"], "preview");
        assert_eq!(json["raw_host"], "ana--x.replit.dev");
    }
}
