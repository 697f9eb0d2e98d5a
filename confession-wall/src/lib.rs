//! Confession Wall library
//!
//! PIN-protected anonymous confessions: the access controller that gates
//! reading, the per-viewer visibility registry, reply threads, accounts and
//! the global chat, all over an embedded SQLite store.

pub mod app;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod notice;
pub mod permalink;
pub mod pin;
pub mod services;
pub mod storage;

pub use app::AppState;
pub use error::{AppError, Result};
