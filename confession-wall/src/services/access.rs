//! Confession access controller
//!
//! Loads confessions and replies behind their PIN gate. A gate starts
//! Locked unless this device remembers unlocking it; a correct PIN moves
//! it to Unlocked (and is remembered), while repeated wrong PINs end in
//! LockedOut, which callers turn into a redirect.
//!
//! Loads are raced against the view that asked for them through
//! `ViewSlot`: a result that arrives after the slot moved on is dropped.

use crate::database::{Confession, Reply, Repository};
use crate::error::{AppError, Result};
use crate::pin::StoredPin;
use crate::storage::UnlockCache;
use std::sync::Arc;

/// A record that can only be read after its PIN is supplied
pub trait Protected {
    fn id(&self) -> &str;
    fn pin(&self) -> &StoredPin;
    /// Key under which an unlock of this record is remembered
    fn gate_key(&self) -> String;
}

impl Protected for Confession {
    fn id(&self) -> &str {
        &self.id
    }

    fn pin(&self) -> &StoredPin {
        &self.pin
    }

    fn gate_key(&self) -> String {
        confession_key(&self.id)
    }
}

impl Protected for Reply {
    fn id(&self) -> &str {
        &self.id
    }

    fn pin(&self) -> &StoredPin {
        &self.pin
    }

    fn gate_key(&self) -> String {
        reply_key(&self.id)
    }
}

fn confession_key(id: &str) -> String {
    format!("confession:{}", id)
}

fn reply_key(id: &str) -> String {
    format!("reply:{}", id)
}

/// Where a view of a protected record stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    Loading,
    NotFound,
    Locked { attempts: u32 },
    Unlocked,
    /// Too many wrong PINs; the viewer must be sent away
    LockedOut,
}

/// Result of one PIN submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Unlocked,
    IncorrectPin { remaining: u32 },
    LockedOut,
}

/// PIN gate around one loaded record
pub struct AccessGate<T: Protected> {
    record: T,
    state: AccessState,
    max_attempts: u32,
    cache: Arc<dyn UnlockCache>,
}

impl<T: Protected> AccessGate<T> {
    fn new(record: T, max_attempts: u32, cache: Arc<dyn UnlockCache>) -> Self {
        let state = if cache.is_remembered(&record.gate_key()) {
            tracing::debug!("Unlock remembered for {}", record.gate_key());
            AccessState::Unlocked
        } else {
            AccessState::Locked { attempts: 0 }
        };

        Self {
            record,
            state,
            max_attempts,
            cache,
        }
    }

    pub fn id(&self) -> &str {
        self.record.id()
    }

    pub fn state(&self) -> AccessState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == AccessState::Unlocked
    }

    /// Wrong submissions so far; zero once unlocked
    pub fn attempts(&self) -> u32 {
        match self.state {
            AccessState::Locked { attempts } => attempts,
            AccessState::LockedOut => self.max_attempts,
            _ => 0,
        }
    }

    /// Compare `candidate` with the stored PIN and advance the gate.
    ///
    /// The submission that reaches the attempt limit is still checked, so
    /// a correct PIN on the last allowed try unlocks.
    pub fn verify_pin(&mut self, candidate: &str) -> PinOutcome {
        let attempts = match self.state {
            AccessState::Unlocked => return PinOutcome::Unlocked,
            AccessState::LockedOut => return PinOutcome::LockedOut,
            AccessState::Locked { attempts } => attempts,
            AccessState::Loading | AccessState::NotFound => return PinOutcome::LockedOut,
        };

        if self.record.pin().matches(candidate) {
            self.state = AccessState::Unlocked;
            self.cache.remember(&self.record.gate_key());
            tracing::info!("Unlocked {}", self.record.gate_key());
            return PinOutcome::Unlocked;
        }

        let attempts = attempts + 1;
        if attempts >= self.max_attempts {
            self.state = AccessState::LockedOut;
            tracing::warn!(
                "Locked out of {} after {} incorrect PINs",
                self.record.gate_key(),
                attempts
            );
            PinOutcome::LockedOut
        } else {
            self.state = AccessState::Locked { attempts };
            tracing::debug!("Incorrect PIN for {} ({} so far)", self.record.gate_key(), attempts);
            PinOutcome::IncorrectPin {
                remaining: self.max_attempts - attempts,
            }
        }
    }

    /// The record, only once unlocked
    pub fn revealed(&self) -> Option<&T> {
        self.is_unlocked().then_some(&self.record)
    }

    pub fn into_revealed(self) -> Option<T> {
        if self.is_unlocked() {
            Some(self.record)
        } else {
            None
        }
    }
}

// The record stays out of debug output until it is unlocked
impl<T: Protected> std::fmt::Debug for AccessGate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("id", &self.record.id())
            .field("state", &self.state)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

/// Loads protected records and builds their gates
#[derive(Clone)]
pub struct AccessController {
    repo: Repository,
    cache: Arc<dyn UnlockCache>,
    max_attempts: u32,
}

impl AccessController {
    pub fn new(repo: Repository, cache: Arc<dyn UnlockCache>, max_attempts: u32) -> Self {
        Self {
            repo,
            cache,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Read a confession without counting a view
    pub async fn fetch_confession(&self, id: &str) -> Result<Confession> {
        self.repo.get_confession(id).await
    }

    /// Count one view, returning the new total
    pub async fn record_view(&self, id: &str) -> Result<i64> {
        self.repo.increment_views(id, 1).await
    }

    /// Read a confession and count exactly one view for it
    pub async fn load_confession(&self, id: &str) -> Result<Confession> {
        let mut confession = self.fetch_confession(id).await?;
        confession.views = self.record_view(id).await?;

        tracing::debug!("Loaded confession {} ({} views)", id, confession.views);
        Ok(confession)
    }

    /// Load a confession (counting a view) behind its gate
    pub async fn open_confession(&self, id: &str) -> Result<AccessGate<Confession>> {
        let confession = self.load_confession(id).await?;
        Ok(self.gate(confession))
    }

    /// Load a reply behind its own gate; the parent's PIN plays no part
    pub async fn open_reply(&self, id: &str) -> Result<AccessGate<Reply>> {
        let reply = self.repo.get_reply(id).await?;
        Ok(self.gate(reply))
    }

    /// Wrap an already loaded record
    pub fn gate<T: Protected>(&self, record: T) -> AccessGate<T> {
        AccessGate::new(record, self.max_attempts, Arc::clone(&self.cache))
    }

    pub fn remember_unlock(&self, confession_id: &str) {
        self.cache.remember(&confession_key(confession_id));
    }

    pub fn is_remembered(&self, confession_id: &str) -> bool {
        self.cache.is_remembered(&confession_key(confession_id))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Identifies one load started on a `ViewSlot`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// What a slot currently shows
pub enum ViewState<T: Protected> {
    Idle,
    Loading,
    NotFound,
    Failed(AppError),
    Ready(AccessGate<T>),
}

/// Holder for the gate a view displays.
///
/// Each load takes a ticket; completing with a ticket from before the last
/// `begin` or `reset` is ignored so late results never overwrite newer
/// state.
pub struct ViewSlot<T: Protected> {
    generation: u64,
    state: ViewState<T>,
}

impl<T: Protected> Default for ViewSlot<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            state: ViewState::Idle,
        }
    }
}

impl<T: Protected> ViewSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load, invalidating any load still in flight
    pub fn begin(&mut self) -> LoadTicket {
        self.generation += 1;
        self.state = ViewState::Loading;
        LoadTicket(self.generation)
    }

    /// Apply a load result. Returns false when the result was stale and
    /// has been dropped.
    pub fn complete(&mut self, ticket: LoadTicket, result: Result<AccessGate<T>>) -> bool {
        if ticket.0 != self.generation {
            tracing::debug!(
                "Discarding stale load result (ticket {}, current {})",
                ticket.0,
                self.generation
            );
            return false;
        }

        self.state = match result {
            Ok(gate) => ViewState::Ready(gate),
            Err(AppError::NotFound(what)) => {
                tracing::debug!("Nothing to show: {} not found", what);
                ViewState::NotFound
            }
            Err(e) => ViewState::Failed(e),
        };
        true
    }

    /// Drop whatever is shown; in-flight loads become stale
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = ViewState::Idle;
    }

    pub fn state(&self) -> &ViewState<T> {
        &self.state
    }

    pub fn gate_mut(&mut self) -> Option<&mut AccessGate<T>> {
        match &mut self.state {
            ViewState::Ready(gate) => Some(gate),
            _ => None,
        }
    }

    /// Summary of the slot for display; `None` when idle or failed
    pub fn access_state(&self) -> Option<AccessState> {
        match &self.state {
            ViewState::Loading => Some(AccessState::Loading),
            ViewState::NotFound => Some(AccessState::NotFound),
            ViewState::Ready(gate) => Some(gate.state()),
            ViewState::Idle | ViewState::Failed(_) => None,
        }
    }
}
