//! The blocking-state coordinator: sole owner of the block list, the global
//! timer and the per-domain pass ledger.
//!
//! Commands hold the state lock until their snapshot is persisted, so no two
//! mutations interleave. Queries read the in-memory state only.

use crate::core::timer::{TickOutcome, TimerCheck};
use crate::domain::messages::{
    CoordinatorEvent, DomainAction, DomainUpdate, Justification, Request, Response,
};
use crate::domain::model::{
    BlockedDomain, BlockingTimer, JustificationRecord, LedgerDurability, LedgerEntry,
    PersistedState,
};
use crate::domain::ports::{BlockingService, Clock, Storage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, MutexGuard};

pub const DEFAULT_STORAGE_KEY: &str = "blockingState";
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub check_interval: Duration,
    pub storage_key: String,
    pub ledger_durability: LedgerDurability,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            ledger_durability: LedgerDurability::default(),
        }
    }
}

#[derive(Debug, Default)]
struct BlockingState {
    blocked_domains: HashMap<String, BlockedDomain>,
    justifications: HashMap<String, LedgerEntry>,
    timer: BlockingTimer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub domains: Vec<BlockedDomain>,
    pub timer: BlockingTimer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStatus {
    pub enabled: bool,
    pub remaining_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Consumed { remaining: u32 },
    NoPassAvailable,
}

/// Result of one expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    /// Timer is off; nothing to watch.
    Idle,
    /// Timer is on and still running.
    Running,
    /// Timer lapsed during this check and was switched off.
    Expired,
    /// Timer claimed to be on without a start time and was switched off.
    Collapsed,
}

struct Inner<S: Storage> {
    state: Mutex<BlockingState>,
    storage: S,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    events: broadcast::Sender<CoordinatorEvent>,
    checker: TimerCheck,
}

/// Cheap-to-clone handle; the periodic check only holds a weak reference,
/// so dropping the last handle tears the loop down.
pub struct Coordinator<S: Storage> {
    inner: Arc<Inner<S>>,
}

impl<S: Storage> Clone for Coordinator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Storage> Coordinator<S> {
    /// Loads the persisted snapshot and resumes the timer check when the
    /// restored timer is still running. Time spent offline counts.
    pub async fn start(storage: S, clock: Arc<dyn Clock>, config: CoordinatorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let coordinator = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BlockingState::default()),
                storage,
                clock,
                config,
                events,
                checker: TimerCheck::new(),
            }),
        };

        coordinator.restore().await;

        if coordinator.check_expiry().await == ExpiryCheck::Running {
            coordinator.start_timer_check();
        }

        coordinator
    }

    async fn restore(&self) {
        let key = &self.inner.config.storage_key;
        let persisted = match self.inner.storage.get(key).await {
            Ok(Some(value)) => match serde_json::from_value::<PersistedState>(value) {
                Ok(persisted) => persisted,
                Err(e) => {
                    tracing::error!("Persisted state under '{}' is unreadable: {}", key, e);
                    return;
                }
            },
            Ok(None) => {
                tracing::info!("No persisted state under '{}', starting empty", key);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load persisted state: {}", e);
                return;
            }
        };

        let mut state = self.inner.state.lock().await;
        for domain in persisted.blocked_domains {
            state.blocked_domains.insert(domain.domain.clone(), domain);
        }
        if let Some(timer) = persisted.blocking_timer {
            state.timer = timer;
        }

        if self.inner.config.ledger_durability == LedgerDurability::Full {
            for record in persisted.justifications {
                let remaining = record.remaining_passes.unwrap_or(0);
                if remaining == 0 {
                    continue;
                }
                let entry = LedgerEntry {
                    remaining_passes: remaining,
                    session_id: record
                        .session_id
                        .unwrap_or_else(|| LedgerEntry::fresh().session_id),
                };
                state.justifications.insert(record.domain.to_lowercase(), entry);
            }
        }

        tracing::info!(
            "State restored: {} blocked domains, timer enabled: {}, {} ledger entries",
            state.blocked_domains.len(),
            state.timer.enabled,
            state.justifications.len()
        );
    }

    /// Writes the full snapshot. Failures are logged; memory stays
    /// authoritative.
    async fn persist(&self, state: &BlockingState) {
        let now = self.inner.clock.now_millis();
        let full = self.inner.config.ledger_durability == LedgerDurability::Full;

        let justifications = state
            .justifications
            .iter()
            .map(|(domain, entry)| JustificationRecord {
                domain: domain.clone(),
                reason: String::new(),
                justified: true,
                timestamp: now,
                remaining_passes: full.then_some(entry.remaining_passes),
                session_id: full.then(|| entry.session_id.clone()),
            })
            .collect();

        let persisted = PersistedState {
            blocked_domains: state.blocked_domains.values().cloned().collect(),
            blocking_timer: Some(state.timer.clone()),
            justifications,
        };

        let value = match serde_json::to_value(&persisted) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to encode state: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .inner
            .storage
            .set(&self.inner.config.storage_key, value)
            .await
        {
            tracing::error!("Failed to persist state: {}", e);
        }
    }

    async fn lock(&self) -> MutexGuard<'_, BlockingState> {
        self.inner.state.lock().await
    }

    // ---- commands ----

    pub async fn add_domain(&self, domain: &str) {
        let normalized = domain.to_lowercase();
        let entry = BlockedDomain {
            id: uuid::Uuid::new_v4().to_string(),
            domain: normalized.clone(),
            added_at: self.inner.clock.now_millis(),
        };

        let mut state = self.lock().await;
        state.blocked_domains.insert(normalized.clone(), entry);
        tracing::info!("Blocked domain added: {}", normalized);
        self.persist(&state).await;
    }

    pub async fn remove_domain(&self, domain: &str) {
        let mut state = self.lock().await;
        if state.blocked_domains.remove(domain).is_some() {
            tracing::info!("Blocked domain removed: {}", domain);
        } else {
            tracing::debug!("Remove requested for unlisted domain: {}", domain);
        }
        self.persist(&state).await;
    }

    /// Replaces the timer wholesale. The caller stamps `start_time`.
    pub async fn set_timer(&self, timer: BlockingTimer) {
        let mut state = self.lock().await;
        let enabled = timer.enabled;
        state.timer = timer;

        if enabled {
            self.start_timer_check();
        } else {
            self.inner.checker.stop();
        }

        tracing::info!(
            "Timer updated: enabled={}, duration={}min, start={:?}",
            state.timer.enabled,
            state.timer.duration,
            state.timer.start_time
        );
        self.persist(&state).await;
    }

    /// Grants a fresh batch of passes for the domain, replacing any
    /// earlier entry.
    pub async fn submit_justification(&self, justification: &Justification) {
        let normalized = justification.domain.to_lowercase();
        let entry = LedgerEntry::fresh();

        let mut state = self.lock().await;
        tracing::info!(
            "Justification accepted for {} ({} passes, session {})",
            normalized,
            entry.remaining_passes,
            entry.session_id
        );
        tracing::debug!("Justification reason for {}: {:?}", normalized, justification.reason);
        state.justifications.insert(normalized, entry);
        self.persist(&state).await;
    }

    pub async fn consume_pass(&self, domain: &str) -> PassOutcome {
        let normalized = domain.to_lowercase();
        let mut state = self.lock().await;

        let remaining = match state.justifications.get_mut(&normalized) {
            Some(entry) if entry.remaining_passes > 0 => {
                entry.remaining_passes -= 1;
                entry.remaining_passes
            }
            _ => {
                tracing::debug!("No pass available for {}", normalized);
                return PassOutcome::NoPassAvailable;
            }
        };

        if remaining == 0 {
            state.justifications.remove(&normalized);
            tracing::info!("Passes exhausted for {}, blocking again", normalized);
        } else {
            tracing::info!("Pass used for {}, {} remaining", normalized, remaining);
        }

        self.persist(&state).await;
        PassOutcome::Consumed { remaining }
    }

    // ---- queries ----

    pub async fn is_blocked(&self, domain: &str) -> bool {
        let state = self.lock().await;
        Self::derive_blocked(&state, &domain.to_lowercase())
    }

    fn derive_blocked(state: &BlockingState, normalized: &str) -> bool {
        if !state.timer.enabled {
            tracing::debug!("Timer disabled, {} not blocked", normalized);
            return false;
        }
        if !state.blocked_domains.contains_key(normalized) {
            return false;
        }
        if let Some(entry) = state.justifications.get(normalized) {
            if entry.remaining_passes > 0 {
                tracing::debug!(
                    "{} has {} passes left, not blocked",
                    normalized,
                    entry.remaining_passes
                );
                return false;
            }
        }
        tracing::debug!("{} is blocked", normalized);
        true
    }

    pub async fn remaining_passes(&self, domain: &str) -> u32 {
        let state = self.lock().await;
        state
            .justifications
            .get(&domain.to_lowercase())
            .map_or(0, |entry| entry.remaining_passes)
    }

    pub async fn state(&self) -> StateSnapshot {
        let state = self.lock().await;
        let mut domains: Vec<BlockedDomain> = state.blocked_domains.values().cloned().collect();
        domains.sort_by(|a, b| {
            a.added_at
                .cmp(&b.added_at)
                .then_with(|| a.domain.cmp(&b.domain))
        });
        StateSnapshot {
            domains,
            timer: state.timer.clone(),
        }
    }

    pub async fn check_timer(&self) -> TimerStatus {
        let state = self.lock().await;
        TimerStatus {
            enabled: state.timer.enabled,
            remaining_seconds: state.timer.remaining_seconds(self.inner.clock.now_millis()),
        }
    }

    // ---- timer subsystem ----

    /// One pass of the periodic check. Switches the timer off when it has
    /// lapsed (broadcasting expiry) or when it is on without a start time.
    pub async fn check_expiry(&self) -> ExpiryCheck {
        let mut state = self.lock().await;
        if !state.timer.enabled {
            return ExpiryCheck::Idle;
        }

        if state.timer.start_time.is_none() {
            tracing::warn!("Timer enabled without a start time, switching it off");
            state.timer.enabled = false;
            self.persist(&state).await;
            return ExpiryCheck::Collapsed;
        }

        if !state.timer.has_elapsed(self.inner.clock.now_millis()) {
            return ExpiryCheck::Running;
        }

        state.timer.enabled = false;
        state.timer.start_time = None;
        self.persist(&state).await;
        drop(state);

        tracing::info!("Blocking timer expired");
        if self.inner.events.send(CoordinatorEvent::TimerExpired).is_err() {
            tracing::debug!("Timer expired with no subscribed page contexts");
        }
        ExpiryCheck::Expired
    }

    fn start_timer_check(&self) {
        let weak: Weak<Inner<S>> = Arc::downgrade(&self.inner);
        self.inner
            .checker
            .start(self.inner.config.check_interval, move || {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return TickOutcome::Stop;
                    };
                    match (Coordinator { inner }).check_expiry().await {
                        ExpiryCheck::Running => TickOutcome::Continue,
                        _ => TickOutcome::Stop,
                    }
                }
            });
    }

    pub fn is_timer_check_running(&self) -> bool {
        self.inner.checker.is_running()
    }

    /// Expiry notifications for one page context.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.inner.events.subscribe()
    }

    /// Cancels the periodic check. State is left as is.
    pub fn shutdown(&self) {
        self.inner.checker.stop();
        tracing::info!("Coordinator shut down");
    }

    // ---- dispatch ----

    pub async fn dispatch(&self, request: Request) -> Response {
        tracing::debug!("Handling {}", request.tag());
        match request {
            Request::UpdateDomains(DomainUpdate { domain, action }) => {
                match action {
                    DomainAction::Add => self.add_domain(&domain).await,
                    DomainAction::Remove => self.remove_domain(&domain).await,
                }
                Response::ok()
            }
            Request::UpdateTimer(timer) => {
                self.set_timer(timer).await;
                Response::ok()
            }
            Request::GetBlockingState => {
                let snapshot = self.state().await;
                Response::BlockingState {
                    domains: snapshot.domains,
                    timer: snapshot.timer,
                }
            }
            Request::IsBlocked { url } => {
                let host = extract_host(&url);
                let state = self.lock().await;
                let is_blocked = Self::derive_blocked(&state, &host);
                let remaining_passes = state
                    .justifications
                    .get(&host)
                    .map_or(0, |entry| entry.remaining_passes);
                Response::BlockStatus {
                    is_blocked,
                    remaining_passes,
                }
            }
            Request::SubmitJustification(justification) => {
                self.submit_justification(&justification).await;
                Response::ok()
            }
            Request::CheckTimer => {
                let status = self.check_timer().await;
                Response::TimerStatus {
                    enabled: status.enabled,
                    remaining_time: status.remaining_seconds,
                }
            }
            Request::UsePass { domain } => match self.consume_pass(&domain).await {
                PassOutcome::Consumed { remaining } => Response::PassUsage {
                    success: true,
                    remaining_passes: remaining,
                },
                PassOutcome::NoPassAvailable => Response::PassUsage {
                    success: false,
                    remaining_passes: 0,
                },
            },
        }
    }
}

#[async_trait]
impl<S: Storage> BlockingService for Coordinator<S> {
    async fn handle(&self, request: Request) -> Response {
        self.dispatch(request).await
    }
}

/// Lower-cased host of `url`, or the empty string when it does not parse.
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
        .unwrap_or_default()
}
