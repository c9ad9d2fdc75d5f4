//! Demo/live mode decisions.
//!
//! [`ModeDecisionEngine`] owns the one authoritative [`ModeState`]. Hosts push
//! wallet-connection changes into it; it decides whether the dashboard shows
//! simulated or live data and tells subscribers whenever that decision
//! changes.
//!
//! # Transitions
//!
//! Every transition takes a generation ticket when it starts. A transition
//! commits only if no newer one has committed in the meantime, so a slow
//! probe round can never overwrite a later wallet disconnect or an explicit
//! user choice. States are replaced whole, never patched field by field.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::constants::{
    BANNER_SIMULATED, BANNER_UNAVAILABLE, CTA_CONNECT_WALLET, CTA_RETRY, CTA_SWITCH_TO_LIVE,
};
use crate::observer::{notify_all, ListenerSet, Subscription};
use crate::probe::SourceValidator;
use crate::status::DataSourceStatus;

/// Why the dashboard is in its current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeReason {
    WalletNotConnected,
    DataSourcesUnavailable,
    UserPreference,
    LiveMode,
}

impl ModeReason {
    /// Banner headline for this reason. Empty in live mode.
    pub fn banner_message(&self) -> &'static str {
        match self {
            Self::WalletNotConnected | Self::UserPreference => BANNER_SIMULATED,
            Self::DataSourcesUnavailable => BANNER_UNAVAILABLE,
            Self::LiveMode => "",
        }
    }

    /// Call-to-action label for this reason. Empty in live mode.
    pub fn banner_cta(&self) -> &'static str {
        match self {
            Self::WalletNotConnected => CTA_CONNECT_WALLET,
            Self::DataSourcesUnavailable => CTA_RETRY,
            Self::UserPreference => CTA_SWITCH_TO_LIVE,
            Self::LiveMode => "",
        }
    }
}

impl std::fmt::Display for ModeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WalletNotConnected => write!(f, "wallet_not_connected"),
            Self::DataSourcesUnavailable => write!(f, "data_sources_unavailable"),
            Self::UserPreference => write!(f, "user_preference"),
            Self::LiveMode => write!(f, "live_mode"),
        }
    }
}

/// The dashboard-wide demo/live decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeState {
    pub is_demo: bool,
    pub reason: ModeReason,
    /// Always equal to `is_demo`.
    pub banner_visible: bool,
    pub data_source_status: DataSourceStatus,
}

impl ModeState {
    /// State at startup: demo, waiting for a wallet.
    pub fn initial() -> Self {
        Self::demo(ModeReason::WalletNotConnected, DataSourceStatus::unavailable())
    }

    fn demo(reason: ModeReason, data_source_status: DataSourceStatus) -> Self {
        Self {
            is_demo: true,
            reason,
            banner_visible: true,
            data_source_status,
        }
    }

    fn live(data_source_status: DataSourceStatus) -> Self {
        Self {
            is_demo: false,
            reason: ModeReason::LiveMode,
            banner_visible: false,
            data_source_status,
        }
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Whether a committed transition notifies unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notify {
    IfChanged,
    Always,
}

struct Current {
    state: ModeState,
    generation: u64,
}

/// Owner of the [`ModeState`] and its subscribers.
///
/// Only obtainable as an `Arc` from [`ModeDecisionEngine::new`]; hosts create
/// one per process at their composition root and share that `Arc`.
///
/// Listeners run synchronously on the thread that committed the transition
/// and must not call [`set_demo_mode`](Self::set_demo_mode),
/// [`reset`](Self::reset), [`update_demo_mode`](Self::update_demo_mode) or
/// [`subscribe`](Self::subscribe) from inside the callback.
pub struct ModeDecisionEngine<V> {
    validator: V,
    current: Mutex<Current>,
    tickets: AtomicU64,
    listeners: Arc<ListenerSet<ModeState>>,
    // Held while listeners run so notifications arrive in commit order.
    delivery: Mutex<()>,
}

impl<V: SourceValidator> ModeDecisionEngine<V> {
    pub fn new(validator: V) -> Arc<Self> {
        Arc::new(Self {
            validator,
            current: Mutex::new(Current {
                state: ModeState::initial(),
                generation: 0,
            }),
            tickets: AtomicU64::new(0),
            listeners: Arc::new(ListenerSet::new()),
            delivery: Mutex::new(()),
        })
    }

    /// Register a listener. It is called once right away with the current
    /// state, then again on every change.
    ///
    /// The first call happens before any transition committed afterwards is
    /// delivered. Listeners must not call `subscribe` from inside a callback.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<ModeState>
    where
        F: Fn(&ModeState) + Send + Sync + 'static,
    {
        let listener: Arc<dyn Fn(&ModeState) + Send + Sync> = Arc::new(listener);
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let (id, state) = {
            let current = self.lock_current();
            let id = self.listeners.insert(Arc::clone(&listener));
            (id, current.state.clone())
        };
        notify_all(&[(id, listener)], &state);
        Subscription::new(id, &self.listeners)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Snapshot of the current state.
    pub fn current_state(&self) -> ModeState {
        self.lock_current().state.clone()
    }

    /// Recompute the mode.
    ///
    /// Priority: a forced demo wins, then a missing wallet, then the probes.
    /// Probe failures only ever push the engine into demo mode. Returns the
    /// state current once this call has finished.
    pub async fn update_demo_mode(&self, wallet_connected: bool, force_demo: bool) -> ModeState {
        let ticket = self.ticket();

        if force_demo {
            return self.commit(ticket, Notify::IfChanged, |prev| {
                ModeState::demo(ModeReason::UserPreference, prev.data_source_status)
            });
        }

        if !wallet_connected {
            return self.commit(ticket, Notify::IfChanged, |prev| {
                ModeState::demo(ModeReason::WalletNotConnected, prev.data_source_status)
            });
        }

        let status = self.validator.validate().await;
        self.commit(ticket, Notify::IfChanged, |_| {
            if status.overall() {
                ModeState::live(status)
            } else {
                ModeState::demo(ModeReason::DataSourcesUnavailable, status)
            }
        })
    }

    /// Explicit user override. Always notifies.
    pub fn set_demo_mode(&self, is_demo: bool) -> ModeState {
        let ticket = self.ticket();
        self.commit(ticket, Notify::Always, |prev| {
            if is_demo {
                ModeState::demo(ModeReason::UserPreference, prev.data_source_status)
            } else {
                ModeState::live(prev.data_source_status)
            }
        })
    }

    /// Restore the startup state and notify subscribers.
    pub fn reset(&self) -> ModeState {
        let ticket = self.ticket();
        self.commit(ticket, Notify::Always, |_| ModeState::initial())
    }

    pub fn banner_message(&self) -> &'static str {
        self.lock_current().state.reason.banner_message()
    }

    pub fn banner_cta(&self) -> &'static str {
        self.lock_current().state.reason.banner_cta()
    }

    fn ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn commit<F>(&self, ticket: u64, notify: Notify, next: F) -> ModeState
    where
        F: FnOnce(&ModeState) -> ModeState,
    {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);

        let (state, listeners) = {
            let mut current = self.lock_current();
            if ticket < current.generation {
                tracing::debug!(
                    ticket,
                    committed = current.generation,
                    "Discarding superseded mode transition"
                );
                return current.state.clone();
            }

            let state = next(&current.state);
            let changed = state != current.state;
            current.generation = ticket;
            current.state = state.clone();

            if !changed && notify == Notify::IfChanged {
                return state;
            }
            if changed {
                tracing::info!(
                    is_demo = state.is_demo,
                    reason = %state.reason,
                    overall = state.data_source_status.overall(),
                    "Mode changed"
                );
            }
            (state, self.listeners.snapshot())
        };

        notify_all(&listeners, &state);
        state
    }

    // Only whole-state swaps happen under this lock, so a poisoned guard
    // still holds a complete state.
    fn lock_current(&self) -> MutexGuard<'_, Current> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
