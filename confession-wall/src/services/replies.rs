//! Reply threads
//!
//! Replies hang off a confession and carry their own PIN. Listing is newest
//! first, either whole or in keyset pages.

use crate::config::{MAX_REPLY_LENGTH, MAX_REPLY_PAGE_SIZE};
use crate::database::{CreateReplyRequest, Reply, Repository};
use crate::error::{AppError, Result};
use crate::pin::Pin;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position after the last reply of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPage {
    pub replies: Vec<Reply>,
    /// Present when older replies remain
    pub next_cursor: Option<ReplyCursor>,
}

/// Service for reading and writing replies
#[derive(Clone)]
pub struct ReplyService {
    repo: Repository,
    page_size: u32,
}

impl ReplyService {
    pub fn new(repo: Repository, page_size: u32) -> Self {
        Self {
            repo,
            page_size: page_size.clamp(1, MAX_REPLY_PAGE_SIZE),
        }
    }

    /// All replies to a confession, newest first
    pub async fn list_replies(&self, parent_id: &str) -> Result<Vec<Reply>> {
        self.repo.list_replies(parent_id).await
    }

    /// One page of replies, newest first, starting after `cursor`
    pub async fn list_replies_page(
        &self,
        parent_id: &str,
        cursor: Option<&ReplyCursor>,
        limit: Option<u32>,
    ) -> Result<ReplyPage> {
        let limit = limit.unwrap_or(self.page_size).clamp(1, MAX_REPLY_PAGE_SIZE);
        let before = cursor.map(|c| (c.created_at, c.id.as_str()));

        // One extra row tells whether another page exists
        let mut replies = self
            .repo
            .list_replies_before(parent_id, before, limit + 1)
            .await?;

        let next_cursor = if replies.len() > limit as usize {
            replies.truncate(limit as usize);
            replies.last().map(|last| ReplyCursor {
                created_at: last.created_at,
                id: last.id.clone(),
            })
        } else {
            None
        };

        Ok(ReplyPage {
            replies,
            next_cursor,
        })
    }

    /// Validate and store a reply to an existing confession
    pub async fn add_reply(
        &self,
        parent_id: &str,
        content: &str,
        pin: &str,
        author: Option<&str>,
    ) -> Result<Reply> {
        let author = author.ok_or_else(|| {
            AppError::PermissionDenied("Please sign in to reply".to_string())
        })?;
        let (content, pin) = validate_reply(content, pin)?;

        // Parent must exist; surfaces NotFound otherwise
        self.repo.get_confession(parent_id).await?;

        let reply = self
            .repo
            .create_reply(CreateReplyRequest {
                parent_id: parent_id.to_string(),
                content,
                pin: pin.into(),
                user_id: author.to_string(),
            })
            .await?;

        tracing::info!("Reply {} added to confession {}", reply.id, parent_id);
        Ok(reply)
    }
}

fn validate_reply(content: &str, pin: &str) -> Result<(String, Pin)> {
    let content = content.trim();

    if content.is_empty() {
        return Err(AppError::Validation("Reply cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_REPLY_LENGTH {
        return Err(AppError::Validation(format!(
            "Please keep your reply under {} characters",
            MAX_REPLY_LENGTH
        )));
    }

    Ok((content.to_string(), Pin::parse(pin)?))
}

/// Replies of one confession as currently shown
#[derive(Debug, Clone)]
pub struct ReplyThread {
    parent_id: String,
    replies: Vec<Reply>,
}

impl ReplyThread {
    pub fn new(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            replies: Vec::new(),
        }
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    /// Replace the local list with the store's
    pub async fn refresh(&mut self, service: &ReplyService) -> Result<()> {
        self.replies = service.list_replies(&self.parent_id).await?;
        Ok(())
    }

    /// Store a reply and put it at the top of the local list without
    /// reloading; the next `refresh` reconciles with the store.
    pub async fn append(
        &mut self,
        service: &ReplyService,
        content: &str,
        pin: &str,
        author: Option<&str>,
    ) -> Result<&Reply> {
        let reply = service
            .add_reply(&self.parent_id, content, pin, author)
            .await?;

        self.replies.insert(0, reply);
        Ok(&self.replies[0])
    }
}
