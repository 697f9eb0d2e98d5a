//! Application configuration constants
//!
//! Central location for validation boundaries and resource limits used
//! throughout the crate. Values that a deployment may tune live in
//! `services::settings` and default to the constants below.

// ===== Confession Limits =====

/// Minimum confession length in characters, measured after trimming
pub const MIN_CONFESSION_LENGTH: usize = 10;

/// Maximum confession length in characters
pub const MAX_CONFESSION_LENGTH: usize = 2000;

/// Number of decimal digits in a confession or reply PIN
pub const PIN_LENGTH: usize = 4;

/// User id stamped on the sample confessions shown to signed-out visitors
pub const DEMO_USER_ID: &str = "dummy";

// ===== Access Control =====

/// Incorrect PIN submissions allowed before the viewer is sent away.
/// The submission that reaches this count is still evaluated.
pub const MAX_PIN_ATTEMPTS: u32 = 3;

/// Default number of remembered unlocks kept per device
pub const DEFAULT_UNLOCK_CACHE_CAPACITY: usize = 500;

/// Default lifetime of a remembered unlock in days (0 disables expiry)
pub const DEFAULT_UNLOCK_TTL_DAYS: u32 = 30;

// ===== Replies =====

/// Maximum reply length in characters
pub const MAX_REPLY_LENGTH: usize = 2000;

/// Default page size for paginated reply listing
pub const DEFAULT_REPLY_PAGE_SIZE: u32 = 20;

/// Upper bound for a requested reply page size
pub const MAX_REPLY_PAGE_SIZE: u32 = 200;

// ===== Accounts =====

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum display name length in characters
pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;

// ===== Chat =====

/// Maximum chat message length in characters
pub const MAX_CHAT_MESSAGE_LENGTH: usize = 500;

/// Number of chat messages returned as history
pub const DEFAULT_CHAT_HISTORY_LIMIT: u32 = 50;

/// Buffered messages per chat subscriber before it starts lagging
pub const CHAT_CHANNEL_CAPACITY: usize = 128;

/// Name shown for chat authors without a display name
pub const ANONYMOUS_NAME: &str = "Anonymous";
