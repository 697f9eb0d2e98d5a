//! Confession board service
//!
//! Creating, listing and removing confessions. The board a viewer sees is
//! every confession newest first, minus the ones in that viewer's
//! visibility registry and the ones other authors have hidden.

use crate::config::{MAX_CONFESSION_LENGTH, MIN_CONFESSION_LENGTH};
use crate::database::{
    Confession, ConfessionFilter, ConfessionType, CreateConfessionRequest, Repository,
};
use crate::error::{AppError, Result};
use crate::permalink::Permalink;
use crate::pin::Pin;
use crate::services::VisibilityService;

/// A freshly stored confession and the link to share
#[derive(Debug, Clone)]
pub struct CreatedConfession {
    pub confession: Confession,
    pub permalink: Permalink,
}

/// Service for managing confessions
#[derive(Clone)]
pub struct ConfessionService {
    repo: Repository,
    visibility: VisibilityService,
}

impl ConfessionService {
    pub fn new(repo: Repository, visibility: VisibilityService) -> Self {
        Self { repo, visibility }
    }

    /// Validate and store a new confession
    pub async fn create_confession(
        &self,
        author: Option<&str>,
        content: &str,
        confession_type: ConfessionType,
        pin: &str,
    ) -> Result<CreatedConfession> {
        let author = author.ok_or_else(|| {
            AppError::PermissionDenied("Please sign in to create a confession".to_string())
        })?;

        let content = content.trim();
        let length = content.chars().count();
        if length < MIN_CONFESSION_LENGTH {
            return Err(AppError::Validation(format!(
                "Please write at least {} characters",
                MIN_CONFESSION_LENGTH
            )));
        }
        if length > MAX_CONFESSION_LENGTH {
            return Err(AppError::Validation(format!(
                "Please keep your confession under {} characters",
                MAX_CONFESSION_LENGTH
            )));
        }
        let pin = Pin::parse(pin)?;

        tracing::info!("Creating {} confession for {}", confession_type, author);

        let confession = self
            .repo
            .create_confession(CreateConfessionRequest {
                content: content.to_string(),
                confession_type,
                pin: pin.into(),
                user_id: author.to_string(),
            })
            .await?;

        let permalink = Permalink::Confession(confession.id.clone());
        tracing::info!("Confession created successfully: {}", confession.id);

        Ok(CreatedConfession {
            confession,
            permalink,
        })
    }

    /// The board for `viewer`; signed-out visitors get sample content
    pub async fn list_board(&self, viewer: Option<&str>) -> Result<Vec<Confession>> {
        let Some(viewer_id) = viewer else {
            return Ok(Confession::samples());
        };

        let hidden = self.visibility.list_hidden(viewer).await?;
        let confessions = self.repo.list_confessions(&ConfessionFilter::default()).await?;

        let board: Vec<Confession> = confessions
            .into_iter()
            .filter(|c| !hidden.contains(&c.id))
            .filter(|c| !c.is_hidden || c.user_id == viewer_id)
            .collect();

        tracing::debug!(
            "Board for {}: {} confessions ({} hidden by viewer)",
            viewer_id,
            board.len(),
            hidden.len()
        );
        Ok(board)
    }

    /// Everything `user_id` has written, newest first
    pub async fn list_user_confessions(&self, user_id: &str) -> Result<Vec<Confession>> {
        self.repo
            .list_confessions(&ConfessionFilter {
                author: Some(user_id.to_string()),
                hidden: None,
            })
            .await
    }

    /// Delete a confession; only its author may
    pub async fn delete_confession(&self, caller: Option<&str>, id: &str) -> Result<()> {
        self.require_owner(caller, id, "delete").await?;

        self.repo.delete_confession(id).await?;
        tracing::info!("Confession deleted successfully: {}", id);
        Ok(())
    }

    /// Set the author-level hide flag; only the author may
    pub async fn set_hidden(&self, caller: Option<&str>, id: &str, hidden: bool) -> Result<Confession> {
        let mut confession = self.require_owner(caller, id, "hide").await?;

        self.repo.set_confession_hidden(id, hidden).await?;
        confession.is_hidden = hidden;

        tracing::info!("Confession {} is_hidden = {}", id, hidden);
        Ok(confession)
    }

    /// Flip the author-level hide flag
    pub async fn toggle_hidden(&self, caller: Option<&str>, id: &str) -> Result<Confession> {
        let current = self.repo.get_confession(id).await?;
        self.set_hidden(caller, id, !current.is_hidden).await
    }

    async fn require_owner(&self, caller: Option<&str>, id: &str, action: &str) -> Result<Confession> {
        let confession = self.repo.get_confession(id).await?;

        match caller {
            Some(user_id) if user_id == confession.user_id => Ok(confession),
            _ => {
                tracing::warn!("Refused to {} confession {} for non-owner", action, id);
                Err(AppError::PermissionDenied(format!(
                    "You can only {} your own confessions",
                    action
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_repository;

    async fn create_test_service() -> (ConfessionService, VisibilityService) {
        let repo = test_repository().await;
        let visibility = VisibilityService::new(repo.clone());
        (ConfessionService::new(repo, visibility.clone()), visibility)
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (service, _) = create_test_service().await;

        let short = service
            .create_confession(Some("u1"), "  too short  ", ConfessionType::Note, "1234")
            .await;
        assert!(matches!(short, Err(AppError::Validation(_))));

        let long = "a".repeat(MAX_CONFESSION_LENGTH + 1);
        let long = service
            .create_confession(Some("u1"), &long, ConfessionType::Note, "1234")
            .await;
        assert!(matches!(long, Err(AppError::Validation(_))));

        let bad_pin = service
            .create_confession(Some("u1"), "long enough content", ConfessionType::Note, "12345")
            .await;
        assert!(matches!(bad_pin, Err(AppError::Validation(_))));

        let anonymous = service
            .create_confession(None, "long enough content", ConfessionType::Note, "1234")
            .await;
        assert!(matches!(anonymous, Err(AppError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_create_returns_permalink() {
        let (service, _) = create_test_service().await;

        let created = service
            .create_confession(Some("u1"), "  I like pineapple pizza  ", ConfessionType::Card, "0042")
            .await
            .unwrap();

        assert_eq!(created.confession.content, "I like pineapple pizza");
        assert_eq!(created.confession.views, 0);
        assert!(!created.confession.is_hidden);
        assert_eq!(
            created.permalink.to_string(),
            format!("/confession/{}", created.confession.id)
        );
    }

    #[tokio::test]
    async fn test_signed_out_board_shows_samples() {
        let (service, _) = create_test_service().await;

        let board = service.list_board(None).await.unwrap();
        assert_eq!(board.len(), 3);
        assert!(board.iter().all(|c| c.is_demo()));
    }

    #[tokio::test]
    async fn test_board_filters_registry_and_author_hidden() {
        let (service, visibility) = create_test_service().await;

        let mine = service
            .create_confession(Some("me"), "my own confession text", ConfessionType::Letter, "1111")
            .await
            .unwrap()
            .confession;
        let theirs = service
            .create_confession(Some("them"), "their confession text", ConfessionType::Poem, "2222")
            .await
            .unwrap()
            .confession;
        let secret = service
            .create_confession(Some("them"), "their hidden confession", ConfessionType::Story, "3333")
            .await
            .unwrap()
            .confession;

        service.set_hidden(Some("them"), &secret.id, true).await.unwrap();
        visibility.hide(Some("me"), &theirs.id).await.unwrap();

        let board: Vec<String> = service
            .list_board(Some("me"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(board, vec![mine.id.clone()]);

        // The author still sees their own hidden confession
        let their_board = service.list_board(Some("them")).await.unwrap();
        assert_eq!(their_board.len(), 3);
    }

    #[tokio::test]
    async fn test_only_owner_may_delete_or_hide() {
        let (service, _) = create_test_service().await;

        let c = service
            .create_confession(Some("owner"), "owner confession text", ConfessionType::Note, "1234")
            .await
            .unwrap()
            .confession;

        assert!(matches!(
            service.delete_confession(Some("intruder"), &c.id).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            service.delete_confession(None, &c.id).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            service.toggle_hidden(Some("intruder"), &c.id).await,
            Err(AppError::PermissionDenied(_))
        ));

        let toggled = service.toggle_hidden(Some("owner"), &c.id).await.unwrap();
        assert!(toggled.is_hidden);
        let toggled = service.toggle_hidden(Some("owner"), &c.id).await.unwrap();
        assert!(!toggled.is_hidden);

        service.delete_confession(Some("owner"), &c.id).await.unwrap();
        assert!(service.list_user_confessions("owner").await.unwrap().is_empty());
        assert!(matches!(
            service.delete_confession(Some("owner"), &c.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
