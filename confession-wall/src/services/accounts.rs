//! Accounts service
//!
//! Email/password accounts and the signed-in session of this client.
//! The rest of the crate only ever sees `current_user_id()`.

use crate::config::{MAX_DISPLAY_NAME_LENGTH, MIN_PASSWORD_LENGTH};
use crate::crypto::{hash_password, verify_password};
use crate::database::{Repository, UserProfile};
use crate::error::{AppError, Result};
use std::sync::{Arc, RwLock};

/// Service for sign-up, sign-in and profiles
#[derive(Clone)]
pub struct AccountService {
    repo: Repository,
    current: Arc<RwLock<Option<UserProfile>>>,
}

impl AccountService {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Register and sign in
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        let display_name = match display_name {
            Some(name) => validate_display_name(name)?,
            None => String::new(),
        };

        let password_hash = hash_password(password)?;
        let user = self
            .repo
            .create_user(&email, &display_name, &password_hash)
            .await?;

        tracing::info!("Account created: {}", user.id);
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile> {
        let email = normalize_email(email).map_err(|_| AppError::InvalidCredentials)?;

        let Some(record) = self.repo.find_user_by_email(&email).await? else {
            tracing::warn!("Sign-in failed: unknown account");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &record.password_hash)? {
            tracing::warn!("Sign-in failed for {}", record.id);
            return Err(AppError::InvalidCredentials);
        }

        let user = UserProfile::from(record);
        tracing::info!("Signed in: {}", user.id);
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    pub fn sign_out(&self) {
        if let Some(user) = self.current_user() {
            tracing::info!("Signed out: {}", user.id);
        }
        self.set_current(None);
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.current_user().map(|user| user.id)
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.repo.get_user(user_id).await
    }

    pub async fn update_display_name(&self, user_id: &str, display_name: &str) -> Result<UserProfile> {
        let display_name = validate_display_name(display_name)?;
        let user = self.repo.update_display_name(user_id, &display_name).await?;

        if self.current_user_id().as_deref() == Some(user_id) {
            self.set_current(Some(user.clone()));
        }

        tracing::info!("Display name updated for {}", user_id);
        Ok(user)
    }

    fn set_current(&self, user: Option<UserProfile>) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = user;
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::Validation("Please enter a valid email address".to_string())),
    }
}

fn validate_display_name(name: &str) -> Result<String> {
    let name = name.trim();
    let length = name.chars().count();
    if length == 0 || length > MAX_DISPLAY_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Display name must be between 1 and {} characters",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_repository;

    async fn create_test_service() -> AccountService {
        AccountService::new(test_repository().await)
    }

    #[tokio::test]
    async fn test_sign_up_signs_in() {
        let service = create_test_service().await;

        let user = service
            .sign_up(" Ann@Example.com ", "secret1", Some("Ann"))
            .await
            .unwrap();

        assert_eq!(user.email, "ann@example.com");
        assert_eq!(user.display_name, "Ann");
        assert_eq!(service.current_user_id(), Some(user.id));
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let service = create_test_service().await;

        assert!(matches!(
            service.sign_up("not-an-email", "secret1", None).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.sign_up("a@b.c", "12345", None).await,
            Err(AppError::Validation(_))
        ));

        service.sign_up("a@b.c", "123456", None).await.unwrap();
        assert!(matches!(
            service.sign_up("A@B.C", "123456", None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let service = create_test_service().await;
        let user = service.sign_up("bo@example.com", "hunter22", None).await.unwrap();
        service.sign_out();
        assert!(service.current_user_id().is_none());

        assert!(matches!(
            service.sign_in("bo@example.com", "wrong-password").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            service.sign_in("nobody@example.com", "hunter22").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(service.current_user_id().is_none());

        let signed_in = service.sign_in("BO@example.com", "hunter22").await.unwrap();
        assert_eq!(signed_in.id, user.id);
        assert_eq!(service.current_user_id(), Some(user.id));
    }

    #[tokio::test]
    async fn test_update_display_name() {
        let service = create_test_service().await;
        let user = service.sign_up("cy@example.com", "hunter22", None).await.unwrap();
        assert_eq!(user.display_name, "");

        let updated = service.update_display_name(&user.id, "  Cy  ").await.unwrap();
        assert_eq!(updated.display_name, "Cy");
        assert_eq!(service.current_user().unwrap().display_name, "Cy");
        assert_eq!(service.get_profile(&user.id).await.unwrap().display_name, "Cy");

        assert!(service.update_display_name(&user.id, "   ").await.is_err());
        assert!(matches!(
            service.update_display_name("ghost", "Ghost").await,
            Err(AppError::NotFound(_))
        ));
    }
}
