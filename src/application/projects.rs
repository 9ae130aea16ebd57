//! Project lifecycle: drafting, editing, publishing under a slug.
//!
//! Every successful write that can change what a published site shows ends by
//! purging that site's cached pages.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{ProjectsRepo, RepoError};
use crate::application::site::SiteView;
use crate::domain::error::DomainError;
use crate::domain::projects::{ContentUpdate, DesignUpdate, ProjectRecord};
use crate::domain::slug::{SlugAsyncError, generate_unique_slug, validate_slug};

/// Receives the slug of every site whose stored pages went stale.
pub trait CachePurger: Send + Sync {
    fn purge(&self, slug: &str);
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project not found")]
    NotFound,
    #[error("slug `{slug}` is already in use")]
    SlugTaken { slug: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for ProjectError {
    fn from(error: SlugAsyncError<RepoError>) -> Self {
        match error {
            SlugAsyncError::Slug(error) => Self::Domain(DomainError::Slug(error)),
            SlugAsyncError::Predicate(error) => Self::Repo(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedProject {
    pub site_url: String,
    pub project: ProjectRecord,
}

#[derive(Clone)]
pub struct ProjectService {
    repo: Arc<dyn ProjectsRepo>,
    reserved_slugs: Arc<[String]>,
    base_domain: String,
    cache_purger: Option<Arc<dyn CachePurger>>,
}

impl ProjectService {
    pub fn new(
        repo: Arc<dyn ProjectsRepo>,
        reserved_slugs: Vec<String>,
        base_domain: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            reserved_slugs: reserved_slugs.into(),
            base_domain: base_domain.into(),
            cache_purger: None,
        }
    }

    /// Set the cache purger for this service.
    pub fn with_cache_purger(mut self, purger: Arc<dyn CachePurger>) -> Self {
        self.cache_purger = Some(purger);
        self
    }

    /// Set the cache purger for this service (optional).
    pub fn with_cache_purger_opt(mut self, purger: Option<Arc<dyn CachePurger>>) -> Self {
        self.cache_purger = purger;
        self
    }

    pub fn site_url(&self, slug: &str) -> String {
        format!("https://{slug}.{}", self.base_domain)
    }

    pub async fn create(&self, owner_id: Uuid, name: &str) -> Result<ProjectRecord, ProjectError> {
        let project = ProjectRecord::draft(owner_id, name, OffsetDateTime::now_utc())?;
        self.repo.insert(&project).await?;
        info!(
            target = "amora::projects",
            project_id = %project.id,
            "created project"
        );
        Ok(project)
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<ProjectRecord>, ProjectError> {
        Ok(self.repo.list_for_owner(owner_id).await?)
    }

    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<ProjectRecord, ProjectError> {
        self.load_owned(owner_id, id).await
    }

    /// Page as visitors would see it once published, regardless of status.
    pub async fn preview(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<(ProjectRecord, SiteView), ProjectError> {
        let project = self.load_owned(owner_id, id).await?;
        let view = SiteView::from_project(&project, &self.base_domain);
        Ok((project, view))
    }

    pub async fn rename(
        &self,
        owner_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<ProjectRecord, ProjectError> {
        let mut project = self.load_owned(owner_id, id).await?;
        project.rename(name, OffsetDateTime::now_utc())?;
        self.repo.update(&project).await?;
        Ok(project)
    }

    pub async fn update_content(
        &self,
        owner_id: Uuid,
        id: Uuid,
        content: ContentUpdate,
    ) -> Result<ProjectRecord, ProjectError> {
        let mut project = self.load_owned(owner_id, id).await?;
        project.apply_content(content, OffsetDateTime::now_utc())?;
        self.repo.update(&project).await?;
        self.purge(project.slug.as_deref());
        Ok(project)
    }

    pub async fn update_design(
        &self,
        owner_id: Uuid,
        id: Uuid,
        design: DesignUpdate,
    ) -> Result<ProjectRecord, ProjectError> {
        let mut project = self.load_owned(owner_id, id).await?;
        project.apply_design(design, OffsetDateTime::now_utc())?;
        self.repo.update(&project).await?;
        self.purge(project.slug.as_deref());
        Ok(project)
    }

    /// Move the project to `new_slug`. Pages cached under both the old and the
    /// new slug are purged.
    pub async fn change_slug(
        &self,
        owner_id: Uuid,
        id: Uuid,
        new_slug: &str,
    ) -> Result<ProjectRecord, ProjectError> {
        let new_slug = new_slug.trim().to_ascii_lowercase();
        validate_slug(&new_slug, &self.reserved_slugs).map_err(DomainError::from)?;

        let mut project = self.load_owned(owner_id, id).await?;
        if project.slug.as_deref() == Some(new_slug.as_str()) {
            return Ok(project);
        }
        if self.repo.slug_exists(&new_slug, Some(id)).await? {
            return Err(ProjectError::SlugTaken { slug: new_slug });
        }

        let previous = project.slug.replace(new_slug.clone());
        project.updated_at = OffsetDateTime::now_utc();
        self.save_with_slug(&project, &new_slug).await?;

        self.purge(previous.as_deref());
        self.purge(Some(&new_slug));
        Ok(project)
    }

    /// Publish the project, deriving a unique slug from its name on first publish.
    pub async fn publish(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<PublishedProject, ProjectError> {
        let mut project = self.load_owned(owner_id, id).await?;

        let slug = match project.slug.clone() {
            Some(slug) => slug,
            None => {
                let repo = Arc::clone(&self.repo);
                generate_unique_slug(&project.name, &self.reserved_slugs, move |candidate| {
                    let repo = Arc::clone(&repo);
                    async move {
                        repo.slug_exists(&candidate, Some(id))
                            .await
                            .map(|taken| !taken)
                    }
                })
                .await?
            }
        };

        project.publish(slug.clone(), OffsetDateTime::now_utc());
        self.save_with_slug(&project, &slug).await?;
        self.purge(Some(&slug));

        info!(
            target = "amora::projects",
            project_id = %project.id,
            slug = %slug,
            "published project"
        );
        Ok(PublishedProject {
            site_url: self.site_url(&slug),
            project,
        })
    }

    pub async fn unpublish(&self, owner_id: Uuid, id: Uuid) -> Result<ProjectRecord, ProjectError> {
        let mut project = self.load_owned(owner_id, id).await?;
        project.unpublish(OffsetDateTime::now_utc());
        self.repo.update(&project).await?;
        self.purge(project.slug.as_deref());
        info!(
            target = "amora::projects",
            project_id = %project.id,
            "unpublished project"
        );
        Ok(project)
    }

    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<ProjectRecord, ProjectError> {
        let project = self.load_owned(owner_id, id).await?;
        let removed = self.repo.delete(id).await?.ok_or(ProjectError::NotFound)?;
        self.purge(removed.slug.as_deref());
        info!(
            target = "amora::projects",
            project_id = %project.id,
            "deleted project"
        );
        Ok(removed)
    }

    async fn load_owned(&self, owner_id: Uuid, id: Uuid) -> Result<ProjectRecord, ProjectError> {
        match self.repo.find(id).await? {
            Some(project) if project.owner_id == owner_id => Ok(project),
            _ => Err(ProjectError::NotFound),
        }
    }

    /// Persist a project whose slug may collide with a concurrent writer.
    async fn save_with_slug(
        &self,
        project: &ProjectRecord,
        slug: &str,
    ) -> Result<(), ProjectError> {
        match self.repo.update(project).await {
            Err(RepoError::Duplicate { .. }) => Err(ProjectError::SlugTaken {
                slug: slug.to_string(),
            }),
            other => Ok(other?),
        }
    }

    fn purge(&self, slug: Option<&str>) {
        if let (Some(purger), Some(slug)) = (&self.cache_purger, slug) {
            purger.purge(slug);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::projects::ProjectStatus;
    use crate::infra::memory::InMemoryProjects;

    #[derive(Default)]
    struct RecordingPurger {
        purged: Mutex<Vec<String>>,
    }

    impl CachePurger for RecordingPurger {
        fn purge(&self, slug: &str) {
            self.purged.lock().unwrap().push(slug.to_string());
        }
    }

    impl RecordingPurger {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.purged.lock().unwrap())
        }
    }

    fn reserved() -> Vec<String> {
        ["app", "api", "www", "admin", "system"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn service() -> (ProjectService, Arc<RecordingPurger>) {
        let purger = Arc::new(RecordingPurger::default());
        let service = ProjectService::new(
            Arc::new(InMemoryProjects::new()),
            reserved(),
            "seudominio.com",
        )
        .with_cache_purger(purger.clone());
        (service, purger)
    }

    #[tokio::test]
    async fn publish_derives_slug_and_site_url() {
        let (service, purger) = service();
        let owner = Uuid::new_v4();
        let project = service.create(owner, "Ana & João").await.unwrap();

        let published = service.publish(owner, project.id).await.unwrap();

        assert_eq!(published.project.slug.as_deref(), Some("ana-joao"));
        assert_eq!(published.project.status, ProjectStatus::Published);
        assert_eq!(published.site_url, "https://ana-joao.seudominio.com");
        assert_eq!(purger.take(), vec!["ana-joao".to_string()]);
    }

    #[tokio::test]
    async fn publish_suffixes_taken_slugs() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let first = service.create(owner, "Ana & João").await.unwrap();
        let second = service.create(owner, "Ana e João").await.unwrap();
        let third = service.create(Uuid::new_v4(), "Ana João").await.unwrap();

        service.publish(owner, first.id).await.unwrap();
        let second = service.publish(owner, second.id).await.unwrap();
        let third = service.publish(third.owner_id, third.id).await.unwrap();

        assert_eq!(second.project.slug.as_deref(), Some("ana-e-joao"));
        assert_eq!(third.project.slug.as_deref(), Some("ana-joao-1"));
    }

    #[tokio::test]
    async fn republish_keeps_existing_slug() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let project = service.create(owner, "Nosso Amor").await.unwrap();
        service.publish(owner, project.id).await.unwrap();
        service.unpublish(owner, project.id).await.unwrap();

        let again = service.publish(owner, project.id).await.unwrap();
        assert_eq!(again.project.slug.as_deref(), Some("nosso-amor"));
    }

    #[tokio::test]
    async fn writes_to_published_project_purge_its_slug() {
        let (service, purger) = service();
        let owner = Uuid::new_v4();
        let project = service.create(owner, "Joao Maria").await.unwrap();
        service.publish(owner, project.id).await.unwrap();
        purger.take();

        service
            .update_content(
                owner,
                project.id,
                ContentUpdate {
                    main_title: Some("João & Maria".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service
            .update_design(owner, project.id, DesignUpdate::default())
            .await
            .unwrap();
        service.unpublish(owner, project.id).await.unwrap();
        service.delete(owner, project.id).await.unwrap();

        assert_eq!(purger.take(), vec!["joao-maria".to_string(); 4]);
    }

    #[tokio::test]
    async fn drafts_without_slug_purge_nothing() {
        let (service, purger) = service();
        let owner = Uuid::new_v4();
        let project = service.create(owner, "Rascunho").await.unwrap();
        service
            .update_design(owner, project.id, DesignUpdate::default())
            .await
            .unwrap();

        assert!(purger.take().is_empty());
    }

    #[tokio::test]
    async fn change_slug_purges_old_and_new() {
        let (service, purger) = service();
        let owner = Uuid::new_v4();
        let project = service.create(owner, "Ana Maria").await.unwrap();
        service.publish(owner, project.id).await.unwrap();
        purger.take();

        let moved = service
            .change_slug(owner, project.id, "Nosso-Cantinho")
            .await
            .unwrap();

        assert_eq!(moved.slug.as_deref(), Some("nosso-cantinho"));
        assert_eq!(
            purger.take(),
            vec!["ana-maria".to_string(), "nosso-cantinho".to_string()]
        );
    }

    #[tokio::test]
    async fn change_slug_rejects_reserved_malformed_and_taken() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let first = service.create(owner, "Primeiro").await.unwrap();
        let second = service.create(owner, "Segundo").await.unwrap();
        service.publish(owner, first.id).await.unwrap();

        assert!(matches!(
            service.change_slug(owner, second.id, "api").await,
            Err(ProjectError::Domain(DomainError::Slug(_)))
        ));
        assert!(matches!(
            service.change_slug(owner, second.id, "ana--maria").await,
            Err(ProjectError::Domain(DomainError::Slug(_)))
        ));
        assert!(matches!(
            service.change_slug(owner, second.id, "primeiro").await,
            Err(ProjectError::SlugTaken { .. })
        ));
    }

    #[tokio::test]
    async fn other_owners_cannot_see_or_modify_projects() {
        let (service, purger) = service();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let project = service.create(owner, "Segredo").await.unwrap();

        assert!(matches!(
            service.get(intruder, project.id).await,
            Err(ProjectError::NotFound)
        ));
        assert!(matches!(
            service.publish(intruder, project.id).await,
            Err(ProjectError::NotFound)
        ));
        assert!(service.list(intruder).await.unwrap().is_empty());
        assert!(purger.take().is_empty());
    }
}
