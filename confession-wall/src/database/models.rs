//! Database models
//!
//! Rust structs representing stored records.
//! All models serialize in camelCase for the presentation layer; PINs and
//! password hashes are never serialized.

use crate::config::DEMO_USER_ID;
use crate::pin::StoredPin;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::fmt;
use std::str::FromStr;

/// Stylistic tag of a confession. Only affects presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfessionType {
    Letter,
    Card,
    Note,
    Poem,
    Story,
}

impl ConfessionType {
    pub const ALL: [ConfessionType; 5] = [
        ConfessionType::Letter,
        ConfessionType::Card,
        ConfessionType::Note,
        ConfessionType::Poem,
        ConfessionType::Story,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfessionType::Letter => "letter",
            ConfessionType::Card => "card",
            ConfessionType::Note => "note",
            ConfessionType::Poem => "poem",
            ConfessionType::Story => "story",
        }
    }
}

impl fmt::Display for ConfessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfessionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown confession type: {}", s))
    }
}

/// A PIN-protected confession
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confession {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub confession_type: ConfessionType,
    #[serde(skip_serializing)]
    pub pin: StoredPin,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub views: i64,
    /// Author-level hide flag, independent of per-viewer hiding
    #[serde(default)]
    pub is_hidden: bool,
}

impl Confession {
    /// Placeholder confessions shown to signed-out visitors
    pub fn samples() -> Vec<Confession> {
        let now = Utc::now();
        [
            (
                "1",
                "This is a sample confession. Sign in to view real confessions.",
                ConfessionType::Letter,
            ),
            (
                "2",
                "Another sample confession. All confessions are protected with a PIN.",
                ConfessionType::Note,
            ),
            (
                "3",
                "Share your feelings anonymously. Login to start confessing.",
                ConfessionType::Card,
            ),
        ]
        .into_iter()
        .map(|(id, content, confession_type)| Confession {
            id: id.to_string(),
            content: content.to_string(),
            confession_type,
            pin: StoredPin::Number(0),
            user_id: DEMO_USER_ID.to_string(),
            created_at: now,
            views: 0,
            is_hidden: false,
        })
        .collect()
    }

    pub fn is_demo(&self) -> bool {
        self.user_id == DEMO_USER_ID
    }
}

impl<'r> FromRow<'r, SqliteRow> for Confession {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("confession_type")?;

        Ok(Self {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            confession_type: kind.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            pin: StoredPin::from_column(row, "pin")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            views: row.try_get("views")?,
            is_hidden: row.try_get("is_hidden")?,
        })
    }
}

/// Create confession request
#[derive(Debug)]
pub struct CreateConfessionRequest {
    pub content: String,
    pub confession_type: ConfessionType,
    pub pin: StoredPin,
    pub user_id: String,
}

/// One viewer's decision to hide one confession from their board
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HiddenConfessionEntry {
    pub id: String,
    pub user_id: String,
    pub confession_id: String,
    pub hidden_at: DateTime<Utc>,
}

/// A PIN-protected reply to a confession
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub content: String,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub pin: StoredPin,
    pub created_at: DateTime<Utc>,
    pub parent_id: String,
}

impl<'r> FromRow<'r, SqliteRow> for Reply {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            user_id: row.try_get("user_id")?,
            pin: StoredPin::from_column(row, "pin")?,
            created_at: row.try_get("created_at")?,
            parent_id: row.try_get("parent_id")?,
        })
    }
}

/// Create reply request
#[derive(Debug)]
pub struct CreateReplyRequest {
    pub parent_id: String,
    pub content: String,
    pub pin: StoredPin,
    pub user_id: String,
}

/// Public part of an account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Account row including the password hash; stays inside the crate
#[derive(Debug, Clone, FromRow)]
pub(crate) struct UserRecord {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            display_name: record.display_name,
            created_at: record.created_at,
        }
    }
}

/// Global chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}
