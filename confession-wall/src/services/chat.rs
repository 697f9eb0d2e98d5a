//! Global chat
//!
//! One room shared by every signed-in user. New messages are stored and
//! then pushed to live subscribers over a broadcast channel.

use crate::config::{ANONYMOUS_NAME, CHAT_CHANNEL_CAPACITY, MAX_CHAT_MESSAGE_LENGTH};
use crate::database::{ChatMessage, Repository};
use crate::error::{AppError, Result};
use tokio::sync::broadcast;

/// Service for the global chat room
#[derive(Clone)]
pub struct ChatService {
    repo: Repository,
    history_limit: u32,
    sender: broadcast::Sender<ChatMessage>,
}

impl ChatService {
    pub fn new(repo: Repository, history_limit: u32) -> Self {
        let (sender, _) = broadcast::channel(CHAT_CHANNEL_CAPACITY);
        Self {
            repo,
            history_limit: history_limit.max(1),
            sender,
        }
    }

    /// Post a message as `author`
    pub async fn send_message(&self, author: Option<&str>, content: &str) -> Result<ChatMessage> {
        let author = author.ok_or_else(|| {
            AppError::PermissionDenied("You need to be logged in to send messages".to_string())
        })?;

        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Message cannot be empty".to_string()));
        }
        if content.chars().count() > MAX_CHAT_MESSAGE_LENGTH {
            return Err(AppError::Validation(format!(
                "Messages are limited to {} characters",
                MAX_CHAT_MESSAGE_LENGTH
            )));
        }

        let user_name = match self.repo.get_user(author).await {
            Ok(profile) if !profile.display_name.is_empty() => profile.display_name,
            Ok(_) | Err(AppError::NotFound(_)) => ANONYMOUS_NAME.to_string(),
            Err(e) => return Err(e),
        };

        let message = self
            .repo
            .create_chat_message(author, &user_name, content)
            .await?;

        // No receivers is fine: nobody has the chat open
        let delivered = self.sender.send(message.clone()).unwrap_or(0);
        tracing::debug!("Chat message {} delivered to {} subscribers", message.id, delivered);

        Ok(message)
    }

    /// Latest messages, oldest first
    pub async fn recent_messages(&self) -> Result<Vec<ChatMessage>> {
        self.repo.list_recent_chat_messages(self.history_limit).await
    }

    /// Live feed of messages sent after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_repository;

    async fn create_test_service(history_limit: u32) -> (ChatService, Repository) {
        let repo = test_repository().await;
        (ChatService::new(repo.clone(), history_limit), repo)
    }

    #[tokio::test]
    async fn test_send_requires_sign_in_and_content() {
        let (service, _repo) = create_test_service(50).await;

        assert!(matches!(
            service.send_message(None, "hello").await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            service.send_message(Some("u1"), "   ").await,
            Err(AppError::Validation(_))
        ));
        let too_long = "z".repeat(MAX_CHAT_MESSAGE_LENGTH + 1);
        assert!(service.send_message(Some("u1"), &too_long).await.is_err());
        assert!(service.recent_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_author_name_from_profile() {
        let (service, repo) = create_test_service(50).await;
        let user = repo.create_user("dee@example.com", "Dee", "hash").await.unwrap();

        let named = service.send_message(Some(&user.id), " hi all ").await.unwrap();
        assert_eq!(named.user_name, "Dee");
        assert_eq!(named.content, "hi all");

        let unknown = service.send_message(Some("no-profile"), "hello").await.unwrap();
        assert_eq!(unknown.user_name, ANONYMOUS_NAME);
    }

    #[tokio::test]
    async fn test_history_is_limited_and_chronological() {
        let (service, _repo) = create_test_service(3).await;

        for i in 0..5 {
            service
                .send_message(Some("u1"), &format!("msg {}", i))
                .await
                .unwrap();
        }

        let recent: Vec<String> = service
            .recent_messages()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(recent, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn test_subscribers_receive_new_messages() {
        let (service, _repo) = create_test_service(50).await;
        let mut feed = service.subscribe();

        let sent = service.send_message(Some("u1"), "live!").await.unwrap();

        let received = feed.recv().await.unwrap();
        assert_eq!(received, sent);
    }
}
