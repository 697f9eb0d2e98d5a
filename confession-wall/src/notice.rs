//! User-facing notices
//!
//! Every failure a service can return maps to a short notice the
//! presentation layer shows as a toast, so nothing escapes to the view
//! unhandled. PIN outcomes map here too; a lock-out carries a redirect.

use crate::error::AppError;
use crate::services::PinOutcome;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// Where the view should go after showing the notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeAction {
    Stay,
    Retry,
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub title: String,
    pub description: Option<String>,
    pub level: NoticeLevel,
    pub action: NoticeAction,
}

/// Safe landing page after a dead link or a lock-out
pub const HOME_PATH: &str = "/";

impl Notice {
    fn new(title: &str, description: Option<String>, level: NoticeLevel, action: NoticeAction) -> Self {
        Self {
            title: title.to_string(),
            description,
            level,
            action,
        }
    }

    /// Notice for a PIN submission, if it needs one
    pub fn for_pin_outcome(outcome: PinOutcome) -> Option<Self> {
        match outcome {
            PinOutcome::Unlocked => None,
            PinOutcome::IncorrectPin { remaining } => Some(Self::new(
                "Incorrect PIN",
                Some(format!("{} attempts remaining", remaining)),
                NoticeLevel::Error,
                NoticeAction::Stay,
            )),
            PinOutcome::LockedOut => Some(Self::new(
                "Too many attempts",
                Some("Please try again later".to_string()),
                NoticeLevel::Error,
                NoticeAction::Redirect(HOME_PATH.to_string()),
            )),
        }
    }
}

impl From<&AppError> for Notice {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::NotFound(_) => Notice::new(
                "Not found",
                Some("This link does not point to anything anymore".to_string()),
                NoticeLevel::Error,
                NoticeAction::Redirect(HOME_PATH.to_string()),
            ),
            AppError::PermissionDenied(reason) => Notice::new(
                "Permission denied",
                Some(reason.clone()),
                NoticeLevel::Warning,
                NoticeAction::Stay,
            ),
            AppError::Validation(reason) => Notice::new(
                "Please check your input",
                Some(reason.clone()),
                NoticeLevel::Error,
                NoticeAction::Stay,
            ),
            AppError::InvalidCredentials => Notice::new(
                "Sign-in failed",
                Some(err.to_string()),
                NoticeLevel::Error,
                NoticeAction::Stay,
            ),
            AppError::TransientStore(_) | AppError::Io(_) => Notice::new(
                "Connection problem",
                Some("Please try again in a moment".to_string()),
                NoticeLevel::Error,
                NoticeAction::Retry,
            ),
            AppError::Database(_) | AppError::Serialization(_) | AppError::Generic(_) => {
                tracing::error!("Unexpected failure surfaced to the user: {}", err);
                Notice::new(
                    "Something went wrong",
                    None,
                    NoticeLevel::Error,
                    NoticeAction::Stay,
                )
            }
        }
    }
}
