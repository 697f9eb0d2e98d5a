//! Repository layer for database operations
//!
//! Every collection the services consume goes through here: get by id,
//! filtered and ordered queries, inserts, partial updates (including the
//! atomic view increment) and single or bulk deletes.

use super::models::*;
use crate::error::{AppError, Result};
use crate::pin::StoredPin;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Filters for confession queries. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct ConfessionFilter {
    /// Only confessions written by this user
    pub author: Option<String>,
    /// Only confessions whose author-level hide flag has this value
    pub hidden: Option<bool>,
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool, for shutdown
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Confessions =====

    /// Create a new confession
    pub async fn create_confession(&self, req: CreateConfessionRequest) -> Result<Confession> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut query = sqlx::query_as::<_, Confession>(
            r#"
            INSERT INTO confessions (id, content, confession_type, pin, user_id, created_at, views, is_hidden)
            VALUES (?, ?, ?, ?, ?, ?, 0, 0)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.content)
        .bind(req.confession_type.as_str());

        query = match &req.pin {
            StoredPin::Number(n) => query.bind(*n),
            StoredPin::Text(s) => query.bind(s.clone()),
        };

        let confession = query
            .bind(&req.user_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!("Created confession: {}", id);
        Ok(confession)
    }

    /// Get a confession by ID
    pub async fn get_confession(&self, id: &str) -> Result<Confession> {
        sqlx::query_as::<_, Confession>("SELECT * FROM confessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("confession {}", id)))
    }

    /// List confessions matching the filter, newest first
    pub async fn list_confessions(&self, filter: &ConfessionFilter) -> Result<Vec<Confession>> {
        let mut sql = "SELECT * FROM confessions WHERE 1 = 1".to_string();

        if filter.author.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        if filter.hidden.is_some() {
            sql.push_str(" AND is_hidden = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query_as::<_, Confession>(&sql);
        if let Some(author) = &filter.author {
            query = query.bind(author);
        }
        if let Some(hidden) = filter.hidden {
            query = query.bind(hidden);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Atomically add `by` to the view counter, returning the new count
    pub async fn increment_views(&self, id: &str, by: i64) -> Result<i64> {
        let views: Option<i64> =
            sqlx::query_scalar("UPDATE confessions SET views = views + ? WHERE id = ? RETURNING views")
                .bind(by)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        views.ok_or_else(|| AppError::NotFound(format!("confession {}", id)))
    }

    /// Set the author-level hide flag
    pub async fn set_confession_hidden(&self, id: &str, hidden: bool) -> Result<()> {
        let rows = sqlx::query("UPDATE confessions SET is_hidden = ? WHERE id = ?")
            .bind(hidden)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!("confession {}", id)));
        }

        tracing::debug!("Set confession {} hidden = {}", id, hidden);
        Ok(())
    }

    /// Delete a confession together with its replies and registry entries
    pub async fn delete_confession(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM replies WHERE parent_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM hidden_confessions WHERE confession_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query("DELETE FROM confessions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if rows == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("confession {}", id)));
        }

        tx.commit().await?;

        tracing::debug!("Deleted confession: {}", id);
        Ok(())
    }

    // ===== Hidden confessions =====

    /// All registry entries of one viewer
    pub async fn list_hidden_entries(&self, user_id: &str) -> Result<Vec<HiddenConfessionEntry>> {
        let entries = sqlx::query_as::<_, HiddenConfessionEntry>(
            "SELECT * FROM hidden_confessions WHERE user_id = ? ORDER BY hidden_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Number of entries for one (viewer, confession) pair
    pub async fn count_hidden_entries(&self, user_id: &str, confession_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM hidden_confessions WHERE user_id = ? AND confession_id = ?",
        )
        .bind(user_id)
        .bind(confession_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Insert an entry unconditionally
    pub async fn insert_hidden_entry(
        &self,
        user_id: &str,
        confession_id: &str,
    ) -> Result<HiddenConfessionEntry> {
        let entry = sqlx::query_as::<_, HiddenConfessionEntry>(
            r#"
            INSERT INTO hidden_confessions (id, user_id, confession_id, hidden_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(confession_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Insert an entry unless one already exists for the pair.
    ///
    /// The existence check and the insert are one statement, so two
    /// racing calls cannot both insert. Returns whether a row was added.
    pub async fn insert_hidden_entry_if_absent(
        &self,
        user_id: &str,
        confession_id: &str,
    ) -> Result<bool> {
        let rows = sqlx::query(
            r#"
            INSERT INTO hidden_confessions (id, user_id, confession_id, hidden_at)
            SELECT ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM hidden_confessions WHERE user_id = ? AND confession_id = ?
            )
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(confession_id)
        .bind(Utc::now())
        .bind(user_id)
        .bind(confession_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// Delete every entry for the pair, returning how many were removed
    pub async fn delete_hidden_entries(&self, user_id: &str, confession_id: &str) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM hidden_confessions WHERE user_id = ? AND confession_id = ?")
            .bind(user_id)
            .bind(confession_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!(
            "Removed {} hidden entries for user {} / confession {}",
            rows,
            user_id,
            confession_id
        );
        Ok(rows)
    }

    // ===== Replies =====

    /// Create a reply
    pub async fn create_reply(&self, req: CreateReplyRequest) -> Result<Reply> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut query = sqlx::query_as::<_, Reply>(
            r#"
            INSERT INTO replies (id, content, user_id, pin, created_at, parent_id)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.content)
        .bind(&req.user_id);

        query = match &req.pin {
            StoredPin::Number(n) => query.bind(*n),
            StoredPin::Text(s) => query.bind(s.clone()),
        };

        let reply = query
            .bind(now)
            .bind(&req.parent_id)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!("Created reply: {} on confession: {}", id, req.parent_id);
        Ok(reply)
    }

    /// Get a reply by ID
    pub async fn get_reply(&self, id: &str) -> Result<Reply> {
        sqlx::query_as::<_, Reply>("SELECT * FROM replies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("reply {}", id)))
    }

    /// All replies of a confession, newest first
    pub async fn list_replies(&self, parent_id: &str) -> Result<Vec<Reply>> {
        let replies = sqlx::query_as::<_, Reply>(
            r#"
            SELECT * FROM replies
            WHERE parent_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(replies)
    }

    /// One page of replies strictly older than `before` in the
    /// (created_at, id) descending order
    pub async fn list_replies_before(
        &self,
        parent_id: &str,
        before: Option<(DateTime<Utc>, &str)>,
        limit: u32,
    ) -> Result<Vec<Reply>> {
        let replies = match before {
            Some((created_at, id)) => {
                sqlx::query_as::<_, Reply>(
                    r#"
                    SELECT * FROM replies
                    WHERE parent_id = ?
                      AND (created_at < ? OR (created_at = ? AND id < ?))
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(parent_id)
                .bind(created_at)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Reply>(
                    r#"
                    SELECT * FROM replies
                    WHERE parent_id = ?
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(parent_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(replies)
    }

    // ===== Users =====

    /// Create an account; the email must not be registered yet
    pub async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<UserProfile> {
        let id = Uuid::new_v4().to_string();

        let result = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO users (id, email, display_name, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, email, display_name, created_at
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => {
                tracing::debug!("Created user: {}", id);
                Ok(user)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Validation(
                "An account with this email already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user profile by ID
    pub async fn get_user(&self, id: &str) -> Result<UserProfile> {
        sqlx::query_as::<_, UserProfile>(
            "SELECT id, email, display_name, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    pub async fn update_display_name(&self, id: &str, display_name: &str) -> Result<UserProfile> {
        let rows = sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
            .bind(display_name)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!("user {}", id)));
        }

        self.get_user(id).await
    }

    // ===== Chat =====

    /// Store a chat message
    pub async fn create_chat_message(
        &self,
        user_id: &str,
        user_name: &str,
        content: &str,
    ) -> Result<ChatMessage> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (id, content, user_id, user_name, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(content)
        .bind(user_id)
        .bind(user_name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    /// The latest `limit` chat messages in chronological order
    pub async fn list_recent_chat_messages(&self, limit: u32) -> Result<Vec<ChatMessage>> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT * FROM chat_messages
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_repository;

    fn confession_request(user_id: &str, content: &str) -> CreateConfessionRequest {
        CreateConfessionRequest {
            content: content.to_string(),
            confession_type: ConfessionType::Letter,
            pin: StoredPin::Number(1234),
            user_id: user_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_confession() {
        let repo = test_repository().await;

        let created = repo
            .create_confession(confession_request("u1", "I never returned that book"))
            .await
            .unwrap();

        assert_eq!(created.views, 0);
        assert!(!created.is_hidden);
        assert_eq!(created.pin, StoredPin::Number(1234));

        let fetched = repo.get_confession(&created.id).await.unwrap();
        assert_eq!(fetched.content, "I never returned that book");
        assert_eq!(fetched.confession_type, ConfessionType::Letter);
    }

    #[tokio::test]
    async fn test_get_missing_confession() {
        let repo = test_repository().await;

        let result = repo.get_confession("nope").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_legacy_text_pin_is_read_back_as_text() {
        let repo = test_repository().await;

        let mut req = confession_request("u1", "legacy confession body");
        req.pin = StoredPin::Text("0042".to_string());
        let created = repo.create_confession(req).await.unwrap();

        let fetched = repo.get_confession(&created.id).await.unwrap();
        assert_eq!(fetched.pin, StoredPin::Text("0042".to_string()));
        assert_eq!(fetched.pin.normalized(), Some(42));
    }

    #[tokio::test]
    async fn test_increment_views() {
        let repo = test_repository().await;
        let c = repo
            .create_confession(confession_request("u1", "counting the views here"))
            .await
            .unwrap();

        assert_eq!(repo.increment_views(&c.id, 1).await.unwrap(), 1);
        assert_eq!(repo.increment_views(&c.id, 1).await.unwrap(), 2);

        let missing = repo.increment_views("missing", 1).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_confessions_with_filters() {
        let repo = test_repository().await;

        let a = repo
            .create_confession(confession_request("alice", "alice wrote this one"))
            .await
            .unwrap();
        repo.create_confession(confession_request("bob", "bob wrote this other one"))
            .await
            .unwrap();
        repo.set_confession_hidden(&a.id, true).await.unwrap();

        let all = repo.list_confessions(&ConfessionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let alice = repo
            .list_confessions(&ConfessionFilter {
                author: Some("alice".to_string()),
                hidden: None,
            })
            .await
            .unwrap();
        assert_eq!(alice.len(), 1);
        assert!(alice[0].is_hidden);

        let visible = repo
            .list_confessions(&ConfessionFilter {
                author: None,
                hidden: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].user_id, "bob");
    }

    #[tokio::test]
    async fn test_delete_confession_cascades() {
        let repo = test_repository().await;
        let c = repo
            .create_confession(confession_request("u1", "soon to be deleted"))
            .await
            .unwrap();

        repo.create_reply(CreateReplyRequest {
            parent_id: c.id.clone(),
            content: "reply".to_string(),
            pin: StoredPin::Number(1111),
            user_id: "u2".to_string(),
        })
        .await
        .unwrap();
        repo.insert_hidden_entry("u2", &c.id).await.unwrap();

        repo.delete_confession(&c.id).await.unwrap();

        assert!(repo.list_replies(&c.id).await.unwrap().is_empty());
        assert_eq!(repo.count_hidden_entries("u2", &c.id).await.unwrap(), 0);
        assert!(matches!(
            repo.delete_confession(&c.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hidden_entry_insert_if_absent() {
        let repo = test_repository().await;

        assert!(repo.insert_hidden_entry_if_absent("u1", "c1").await.unwrap());
        assert!(!repo.insert_hidden_entry_if_absent("u1", "c1").await.unwrap());
        assert_eq!(repo.count_hidden_entries("u1", "c1").await.unwrap(), 1);

        // A different viewer gets their own entry
        assert!(repo.insert_hidden_entry_if_absent("u2", "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_hidden_entries_removes_duplicates() {
        let repo = test_repository().await;

        repo.insert_hidden_entry("u1", "c1").await.unwrap();
        repo.insert_hidden_entry("u1", "c1").await.unwrap();
        repo.insert_hidden_entry("u1", "c2").await.unwrap();

        assert_eq!(repo.delete_hidden_entries("u1", "c1").await.unwrap(), 2);
        assert_eq!(repo.count_hidden_entries("u1", "c1").await.unwrap(), 0);
        assert_eq!(repo.list_hidden_entries("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = test_repository().await;

        repo.create_user("a@example.com", "A", "hash").await.unwrap();
        let second = repo.create_user("a@example.com", "B", "hash").await;

        assert!(matches!(second, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_recent_chat_messages_are_chronological() {
        let repo = test_repository().await;

        for i in 0..5 {
            repo.create_chat_message("u1", "Ann", &format!("message {}", i))
                .await
                .unwrap();
        }

        let recent = repo.list_recent_chat_messages(3).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
    }
}
