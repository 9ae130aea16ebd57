use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

pub const DEFAULT_PRIMARY_COLOR: &str = "#ff6b9d";
pub const DEFAULT_SECONDARY_COLOR: &str = "#ffc3d8";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#fff5f8";
pub const DEFAULT_RAIN_EMOJI: &str = "❤️";

const NAME_MIN_CHARS: usize = 3;
const NAME_MAX_CHARS: usize = 255;
const MAIN_TITLE_MIN_CHARS: usize = 3;
const SUBTITLE_MAX_CHARS: usize = 255;
const DESCRIPTION_MAX_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub status: ProjectStatus,
    pub main_title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub background_color: Option<String>,
    pub image_path: Option<String>,
    pub rain_emoji: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl ProjectRecord {
    /// Fresh draft owned by `owner_id`. The name is trimmed and must be 3 to 255
    /// characters long.
    pub fn draft(owner_id: Uuid, name: &str, now: OffsetDateTime) -> Result<Self, DomainError> {
        let name = validate_name(name)?;
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            slug: None,
            status: ProjectStatus::Draft,
            main_title: None,
            subtitle: None,
            description: None,
            primary_color: None,
            secondary_color: None,
            background_color: None,
            image_path: None,
            rain_emoji: Some(DEFAULT_RAIN_EMOJI.to_string()),
            created_at: now,
            updated_at: now,
            published_at: None,
        })
    }

    pub fn is_published(&self) -> bool {
        self.status == ProjectStatus::Published
    }

    /// Replace the page text. Omitted fields are stored as empty strings.
    pub fn apply_content(
        &mut self,
        content: ContentUpdate,
        now: OffsetDateTime,
    ) -> Result<(), DomainError> {
        content.validate()?;
        self.main_title = Some(content.main_title.unwrap_or_default());
        self.subtitle = Some(content.subtitle.unwrap_or_default());
        self.description = Some(content.description.unwrap_or_default());
        self.updated_at = now;
        Ok(())
    }

    /// Colors and emoji fall back to the theme defaults when omitted or blank.
    pub fn apply_design(
        &mut self,
        design: DesignUpdate,
        now: OffsetDateTime,
    ) -> Result<(), DomainError> {
        design.validate()?;
        self.primary_color = Some(or_default(design.primary_color, DEFAULT_PRIMARY_COLOR));
        self.secondary_color = Some(or_default(design.secondary_color, DEFAULT_SECONDARY_COLOR));
        self.background_color = Some(or_default(
            design.background_color,
            DEFAULT_BACKGROUND_COLOR,
        ));
        self.rain_emoji = Some(or_default(design.rain_emoji, DEFAULT_RAIN_EMOJI));
        if let Some(path) = design.image_path.filter(|path| !path.trim().is_empty()) {
            self.image_path = Some(path);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn publish(&mut self, slug: String, now: OffsetDateTime) {
        self.slug = Some(slug);
        self.status = ProjectStatus::Published;
        self.published_at = Some(now);
        self.updated_at = now;
    }

    pub fn unpublish(&mut self, now: OffsetDateTime) {
        self.status = ProjectStatus::Draft;
        self.published_at = None;
        self.updated_at = now;
    }

    pub fn rename(&mut self, name: &str, now: OffsetDateTime) -> Result<(), DomainError> {
        self.name = validate_name(name)?;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdate {
    pub main_title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignUpdate {
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub background_color: Option<String>,
    pub image_path: Option<String>,
    pub rain_emoji: Option<String>,
}

impl ContentUpdate {
    fn validate(&self) -> Result<(), DomainError> {
        if self
            .main_title
            .as_ref()
            .is_some_and(|title| title.chars().count() < MAIN_TITLE_MIN_CHARS)
        {
            return Err(DomainError::validation(
                "main title must be at least 3 characters",
            ));
        }
        if self
            .subtitle
            .as_ref()
            .is_some_and(|subtitle| subtitle.chars().count() > SUBTITLE_MAX_CHARS)
        {
            return Err(DomainError::validation(
                "subtitle cannot exceed 255 characters",
            ));
        }
        if self
            .description
            .as_ref()
            .is_some_and(|description| description.chars().count() > DESCRIPTION_MAX_CHARS)
        {
            return Err(DomainError::validation(
                "description cannot exceed 5000 characters",
            ));
        }
        Ok(())
    }
}

impl DesignUpdate {
    fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("primary color", &self.primary_color),
            ("secondary color", &self.secondary_color),
            ("background color", &self.background_color),
        ] {
            let malformed = value
                .as_deref()
                .is_some_and(|value| !value.trim().is_empty() && !is_hex_color(value));
            if malformed {
                return Err(DomainError::validation(format!(
                    "{field} must be a hexadecimal color like #ff6b9d"
                )));
            }
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    let chars = trimmed.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(DomainError::validation(
            "project name must be between 3 and 255 characters",
        ));
    }
    Ok(trimmed.to_string())
}

/// `#rrggbb`, either case.
fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
