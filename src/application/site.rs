//! Public site rendering: the page a visitor sees under a project's slug.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::application::repos::{ProjectsRepo, RepoError};
use crate::cache::SiteCache;
use crate::domain::projects::{
    DEFAULT_BACKGROUND_COLOR, DEFAULT_PRIMARY_COLOR, DEFAULT_RAIN_EMOJI, DEFAULT_SECONDARY_COLOR,
    ProjectRecord,
};

const DEFAULT_TEMPLATE_NAME: &str = "default";
const FAVICON: &str = "💕";
const FALLBACK_MAIN_TITLE: &str = "Nossa História";
const FALLBACK_TITLE_NAMES: &str = "Nosso Amor";
const FALLBACK_SUBTITLE: &str = "Nossa História de Amor";
const FALLBACK_DESCRIPTION: &str = "Conte aqui a história de como vocês se conheceram...";
const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub background: String,
}

/// Everything the site template needs, with theme defaults already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteView {
    pub title: String,
    pub favicon: String,
    pub main_title: String,
    pub subtitle: String,
    pub description: String,
    pub colors: ThemeColors,
    pub image_url: Option<String>,
    pub rain_emoji: String,
    pub slug: Option<String>,
    pub base_domain: String,
}

impl SiteView {
    pub fn from_project(project: &ProjectRecord, base_domain: &str) -> Self {
        let main_title = non_blank(project.main_title.as_deref());
        Self {
            title: format!(
                "{} - Nossa História",
                main_title.unwrap_or(FALLBACK_TITLE_NAMES)
            ),
            favicon: FAVICON.to_string(),
            main_title: main_title.unwrap_or(FALLBACK_MAIN_TITLE).to_string(),
            subtitle: non_blank(project.subtitle.as_deref())
                .unwrap_or(FALLBACK_SUBTITLE)
                .to_string(),
            description: non_blank(project.description.as_deref())
                .unwrap_or(FALLBACK_DESCRIPTION)
                .to_string(),
            colors: ThemeColors {
                primary: non_blank(project.primary_color.as_deref())
                    .unwrap_or(DEFAULT_PRIMARY_COLOR)
                    .to_string(),
                secondary: non_blank(project.secondary_color.as_deref())
                    .unwrap_or(DEFAULT_SECONDARY_COLOR)
                    .to_string(),
                background: non_blank(project.background_color.as_deref())
                    .unwrap_or(DEFAULT_BACKGROUND_COLOR)
                    .to_string(),
            },
            image_url: non_blank(project.image_path.as_deref()).map(image_url),
            rain_emoji: non_blank(project.rain_emoji.as_deref())
                .unwrap_or(DEFAULT_RAIN_EMOJI)
                .to_string(),
            slug: project.slug.clone(),
            base_domain: base_domain.to_string(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Bare file names live under `/uploads/`; absolute paths and URLs are kept.
fn image_url(path: &str) -> String {
    if path.starts_with('/') || path.starts_with("https://") || path.starts_with("http://") {
        path.to_string()
    } else {
        format!("{UPLOADS_PREFIX}{path}")
    }
}

/// Starting configuration offered to new projects.
pub fn default_template() -> serde_json::Value {
    json!({
        "name": "Amor Clássico",
        "config": {
            "page": {
                "title": "{{names}} - Nossa História",
                "favicon": FAVICON,
            },
            "content": {
                "mainTitle": "{{names}}",
                "subtitle": FALLBACK_SUBTITLE,
                "description": FALLBACK_DESCRIPTION,
            },
            "theme": {
                "primaryColor": DEFAULT_PRIMARY_COLOR,
                "secondaryColor": DEFAULT_SECONDARY_COLOR,
                "backgroundColor": DEFAULT_BACKGROUND_COLOR,
            },
            "effects": {
                "rainEmoji": DEFAULT_RAIN_EMOJI,
            },
        },
    })
}

#[derive(Clone)]
pub struct SiteService {
    repo: Arc<dyn ProjectsRepo>,
    base_domain: String,
    templates: Option<SiteCache>,
}

impl SiteService {
    pub fn new(repo: Arc<dyn ProjectsRepo>, base_domain: impl Into<String>) -> Self {
        Self {
            repo,
            base_domain: base_domain.into(),
            templates: None,
        }
    }

    /// Memoize template configuration in the cache's template region.
    pub fn with_template_cache_opt(mut self, cache: Option<SiteCache>) -> Self {
        self.templates = cache;
        self
    }

    /// View of the published project serving `slug`, if any.
    pub async fn render(&self, slug: &str) -> Result<Option<SiteView>, RepoError> {
        let project = self.repo.find_published_by_slug(slug).await?;
        Ok(project.map(|project| SiteView::from_project(&project, &self.base_domain)))
    }

    pub fn template(&self) -> serde_json::Value {
        let Some(cache) = &self.templates else {
            return default_template();
        };

        if let Some(template) = cache.get_template(DEFAULT_TEMPLATE_NAME) {
            return template;
        }

        let template = default_template();
        cache.set_template(DEFAULT_TEMPLATE_NAME, template.clone());
        template
    }
}
