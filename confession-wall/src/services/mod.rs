//! Services module
//!
//! Business logic services that coordinate between callers and the repository.

pub mod access;
pub mod accounts;
pub mod chat;
pub mod confessions;
pub mod replies;
pub mod settings;
pub mod visibility;

pub use access::{
    AccessController, AccessGate, AccessState, LoadTicket, PinOutcome, Protected, ViewSlot,
    ViewState,
};
pub use accounts::AccountService;
pub use chat::ChatService;
pub use confessions::{ConfessionService, CreatedConfession};
pub use replies::{ReplyCursor, ReplyPage, ReplyService, ReplyThread};
pub use settings::{AppSettings, SettingsService};
pub use visibility::VisibilityService;
