//! Application state and initialization
//!
//! Opens the data directory, the database and the device unlock memory, and
//! wires every service together. All services are reachable through
//! `AppState`.

use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{
    AccessController, AccountService, AppSettings, ChatService, ConfessionService, ReplyService,
    SettingsService, VisibilityService,
};
use crate::storage::BoundedUnlockCache;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DATABASE_FILE: &str = "confessions.db";
const UNLOCK_CACHE_FILE: &str = "unlocks.json";

/// Install the global tracing subscriber; `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confession_wall=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings: AppSettings,
    pub repo: Repository,
    pub unlock_cache: Arc<BoundedUnlockCache>,
    pub access: AccessController,
    pub accounts: AccountService,
    pub confessions: ConfessionService,
    pub visibility: VisibilityService,
    pub replies: ReplyService,
    pub chat: ChatService,
}

impl AppState {
    /// Open (or create) everything under `app_data_dir`
    pub async fn open(app_data_dir: PathBuf) -> Result<Self> {
        tracing::info!("Initializing application in {:?}", app_data_dir);

        tokio::fs::create_dir_all(&app_data_dir).await?;

        let settings = SettingsService::new(app_data_dir.clone()).load().await?;

        let pool = create_pool(&app_data_dir.join(DATABASE_FILE)).await?;
        let repo = Repository::new(pool);

        let unlock_cache = Arc::new(
            BoundedUnlockCache::load(
                &app_data_dir.join(UNLOCK_CACHE_FILE),
                settings.access.unlock_cache_capacity,
                settings.access.unlock_ttl(),
            )
            .await,
        );

        let visibility = VisibilityService::new(repo.clone());
        let state = Self {
            access: AccessController::new(
                repo.clone(),
                unlock_cache.clone(),
                settings.access.max_pin_attempts,
            ),
            accounts: AccountService::new(repo.clone()),
            confessions: ConfessionService::new(repo.clone(), visibility.clone()),
            replies: ReplyService::new(repo.clone(), settings.replies.page_size),
            chat: ChatService::new(repo.clone(), settings.chat.history_limit),
            visibility,
            unlock_cache,
            repo,
            settings,
            app_data_dir,
        };

        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    /// Identity of the signed-in user, if any
    pub fn current_user_id(&self) -> Option<String> {
        self.accounts.current_user_id()
    }

    /// Close the database. Unlocks are already on disk; the final save
    /// only drops expired entries from the file.
    pub async fn shutdown(&self) -> Result<()> {
        self.unlock_cache
            .save(&self.app_data_dir.join(UNLOCK_CACHE_FILE))?;
        self.repo.pool().close().await;

        tracing::info!("Application shut down");
        Ok(())
    }
}
