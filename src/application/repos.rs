//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::projects::ProjectRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait ProjectsRepo: Send + Sync {
    /// Published project serving `slug`. Drafts are never returned.
    async fn find_published_by_slug(&self, slug: &str)
    -> Result<Option<ProjectRecord>, RepoError>;

    async fn find(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepoError>;

    /// Projects of `owner_id`, most recently updated first.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ProjectRecord>, RepoError>;

    async fn insert(&self, project: &ProjectRecord) -> Result<(), RepoError>;

    /// Replace the stored record with the same id. Fails with `NotFound` if absent
    /// and `Duplicate` if its slug is held by another project.
    async fn update(&self, project: &ProjectRecord) -> Result<(), RepoError>;

    async fn delete(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepoError>;

    /// Whether any project other than `exclude` holds `slug`.
    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError>;
}
