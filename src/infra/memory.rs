//! In-process project store.
//!
//! Keeps every project in a map behind a `tokio::sync::RwLock`. Data lives for
//! the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{ProjectsRepo, RepoError};
use crate::domain::projects::ProjectRecord;

#[derive(Default)]
pub struct InMemoryProjects {
    projects: RwLock<HashMap<Uuid, ProjectRecord>>,
}

impl InMemoryProjects {
    pub fn new() -> Self {
        Self::default()
    }
}

fn slug_held_by_other(
    projects: &HashMap<Uuid, ProjectRecord>,
    slug: &str,
    exclude: Option<Uuid>,
) -> bool {
    projects
        .values()
        .any(|project| Some(project.id) != exclude && project.slug.as_deref() == Some(slug))
}

#[async_trait]
impl ProjectsRepo for InMemoryProjects {
    async fn find_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ProjectRecord>, RepoError> {
        let projects = self.projects.read().await;
        Ok(projects
            .values()
            .find(|project| project.is_published() && project.slug.as_deref() == Some(slug))
            .cloned())
    }

    async fn find(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepoError> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ProjectRecord>, RepoError> {
        let projects = self.projects.read().await;
        let mut owned: Vec<ProjectRecord> = projects
            .values()
            .filter(|project| project.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned)
    }

    async fn insert(&self, project: &ProjectRecord) -> Result<(), RepoError> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id) {
            return Err(RepoError::Duplicate {
                constraint: "projects_pkey".to_string(),
            });
        }
        let slug_taken = project
            .slug
            .as_deref()
            .is_some_and(|slug| slug_held_by_other(&projects, slug, Some(project.id)));
        if slug_taken {
            return Err(RepoError::Duplicate {
                constraint: "projects_slug_key".to_string(),
            });
        }
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn update(&self, project: &ProjectRecord) -> Result<(), RepoError> {
        let mut projects = self.projects.write().await;
        if !projects.contains_key(&project.id) {
            return Err(RepoError::NotFound);
        }
        let slug_taken = project
            .slug
            .as_deref()
            .is_some_and(|slug| slug_held_by_other(&projects, slug, Some(project.id)));
        if slug_taken {
            return Err(RepoError::Duplicate {
                constraint: "projects_slug_key".to_string(),
            });
        }
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepoError> {
        Ok(self.projects.write().await.remove(&id))
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        let projects = self.projects.read().await;
        Ok(slug_held_by_other(&projects, slug, exclude))
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn draft(owner: Uuid, name: &str) -> ProjectRecord {
        ProjectRecord::draft(owner, name, OffsetDateTime::now_utc()).expect("draft")
    }

    #[tokio::test]
    async fn only_published_projects_resolve_by_slug() {
        let repo = InMemoryProjects::new();
        let mut project = draft(Uuid::new_v4(), "Ana Maria");
        project.slug = Some("ana-maria".to_string());
        repo.insert(&project).await.unwrap();

        assert!(repo.find_published_by_slug("ana-maria").await.unwrap().is_none());

        project.publish("ana-maria".to_string(), OffsetDateTime::now_utc());
        repo.update(&project).await.unwrap();

        let found = repo.find_published_by_slug("ana-maria").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(project.id));
    }

    #[tokio::test]
    async fn slug_uniqueness_excludes_the_project_itself() {
        let repo = InMemoryProjects::new();
        let owner = Uuid::new_v4();
        let mut first = draft(owner, "Primeiro");
        first.publish("nosso".to_string(), OffsetDateTime::now_utc());
        repo.insert(&first).await.unwrap();

        assert!(repo.slug_exists("nosso", None).await.unwrap());
        assert!(!repo.slug_exists("nosso", Some(first.id)).await.unwrap());

        let mut second = draft(owner, "Segundo");
        repo.insert(&second).await.unwrap();
        second.publish("nosso".to_string(), OffsetDateTime::now_utc());
        assert!(matches!(
            repo.update(&second).await,
            Err(RepoError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn update_of_missing_project_is_not_found() {
        let repo = InMemoryProjects::new();
        let project = draft(Uuid::new_v4(), "Fantasma");
        assert!(matches!(
            repo.update(&project).await,
            Err(RepoError::NotFound)
        ));
    }
}
