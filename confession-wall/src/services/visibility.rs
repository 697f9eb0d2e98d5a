//! Visibility registry
//!
//! Per-viewer set of confessions hidden from that viewer's board. Hiding is
//! decluttering, not access control: a hidden confession stays reachable
//! through its permalink.

use crate::database::Repository;
use crate::error::{AppError, Result};
use std::collections::HashSet;

/// Service for per-viewer hidden confessions
#[derive(Clone)]
pub struct VisibilityService {
    repo: Repository,
}

impl VisibilityService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Ids hidden by `user`; empty when nobody is signed in
    pub async fn list_hidden(&self, user: Option<&str>) -> Result<HashSet<String>> {
        let Some(user_id) = user else {
            return Ok(HashSet::new());
        };

        let hidden = self
            .repo
            .list_hidden_entries(user_id)
            .await?
            .into_iter()
            .map(|entry| entry.confession_id)
            .collect();

        Ok(hidden)
    }

    pub async fn is_hidden(&self, user: Option<&str>, confession_id: &str) -> Result<bool> {
        match user {
            Some(user_id) => Ok(self.repo.count_hidden_entries(user_id, confession_id).await? > 0),
            None => Ok(false),
        }
    }

    /// Hide a confession for `user`. Hiding twice leaves a single entry.
    pub async fn hide(&self, user: Option<&str>, confession_id: &str) -> Result<()> {
        let user_id = require_user(user, "hide confessions")?;

        if self
            .repo
            .insert_hidden_entry_if_absent(user_id, confession_id)
            .await?
        {
            tracing::info!("User {} hid confession {}", user_id, confession_id);
        } else {
            tracing::debug!("Confession {} already hidden for {}", confession_id, user_id);
        }

        Ok(())
    }

    /// Unhide a confession for `user`, removing every matching entry.
    /// Returns how many entries were removed.
    pub async fn unhide(&self, user: Option<&str>, confession_id: &str) -> Result<u64> {
        let user_id = require_user(user, "unhide confessions")?;

        let removed = self.repo.delete_hidden_entries(user_id, confession_id).await?;
        if removed > 1 {
            tracing::warn!(
                "Removed {} duplicate hidden entries for user {} / confession {}",
                removed,
                user_id,
                confession_id
            );
        }

        tracing::info!("User {} unhid confession {}", user_id, confession_id);
        Ok(removed)
    }

    /// Flip the hidden state, returning whether it is now hidden
    pub async fn toggle(&self, user: Option<&str>, confession_id: &str) -> Result<bool> {
        if self.is_hidden(user, confession_id).await? {
            self.unhide(user, confession_id).await?;
            Ok(false)
        } else {
            self.hide(user, confession_id).await?;
            Ok(true)
        }
    }
}

fn require_user<'a>(user: Option<&'a str>, action: &str) -> Result<&'a str> {
    user.ok_or_else(|| {
        tracing::warn!("Refused to {} without a signed-in user", action);
        AppError::PermissionDenied(format!("Please sign in to {}", action))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_repository;

    async fn create_test_service() -> (VisibilityService, Repository) {
        let repo = test_repository().await;
        (VisibilityService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_hide_then_list() {
        let (service, _repo) = create_test_service().await;

        service.hide(Some("u1"), "c1").await.unwrap();

        let hidden = service.list_hidden(Some("u1")).await.unwrap();
        assert!(hidden.contains("c1"));
        assert!(service.list_hidden(Some("u2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hide_twice_unhide_once() {
        let (service, repo) = create_test_service().await;

        service.hide(Some("u1"), "c1").await.unwrap();
        service.hide(Some("u1"), "c1").await.unwrap();
        assert_eq!(repo.count_hidden_entries("u1", "c1").await.unwrap(), 1);

        service.unhide(Some("u1"), "c1").await.unwrap();
        assert!(!service.list_hidden(Some("u1")).await.unwrap().contains("c1"));
    }

    #[tokio::test]
    async fn test_unhide_heals_duplicates() {
        let (service, repo) = create_test_service().await;

        // Simulate two racing hides that both slipped through
        repo.insert_hidden_entry("u1", "c1").await.unwrap();
        repo.insert_hidden_entry("u1", "c1").await.unwrap();

        assert_eq!(service.unhide(Some("u1"), "c1").await.unwrap(), 2);
        assert!(!service.is_hidden(Some("u1"), "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_unhide_not_hidden_is_noop() {
        let (service, _repo) = create_test_service().await;

        assert_eq!(service.unhide(Some("u1"), "c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_signed_out_viewer() {
        let (service, _repo) = create_test_service().await;

        assert!(service.list_hidden(None).await.unwrap().is_empty());
        assert!(!service.is_hidden(None, "c1").await.unwrap());
        assert!(matches!(
            service.hide(None, "c1").await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            service.unhide(None, "c1").await,
            Err(AppError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle() {
        let (service, _repo) = create_test_service().await;

        assert!(service.toggle(Some("u1"), "c1").await.unwrap());
        assert!(service.is_hidden(Some("u1"), "c1").await.unwrap());
        assert!(!service.toggle(Some("u1"), "c1").await.unwrap());
        assert!(!service.is_hidden(Some("u1"), "c1").await.unwrap());
    }
}
