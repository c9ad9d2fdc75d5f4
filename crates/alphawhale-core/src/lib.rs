//! alphawhale: mode and gating decisions for the AlphaWhale dashboard.
//!
//! Two engines make up the core:
//!
//! - [`ModeDecisionEngine`] decides whether the dashboard shows simulated
//!   ("demo") or live data, from the wallet signal and a concurrent probe of
//!   the data sources ([`HttpSourceValidator`]). Subscribers hear about every
//!   change.
//! - [`GatingEvaluator`] decides whether a single user action is enabled,
//!   given wallet, approval, balance, region and time prerequisites.
//!
//! [`DashboardCore`] is the composition root that owns one of each.
//!
//! # Quick example
//!
//! ```no_run
//! use alphawhale::{CoreConfig, DashboardCore, GatingConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), alphawhale::CoreError> {
//! let mut core = DashboardCore::from_config(CoreConfig::from_env()?)?;
//!
//! let _banner = core.mode_engine().subscribe(|state| {
//!     println!("demo={} reason={}", state.is_demo, state.reason);
//! });
//! core.on_wallet_changed(true, Some("0xabc")).await;
//!
//! let gate = core.gating().evaluate_action(&GatingConfig::new().with_wallet());
//! assert!(gate.enabled);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod gating;
pub mod mode;
pub mod observer;
pub mod probe;
pub mod status;

pub use config::{CoreConfig, ProbeTargets};
pub use error::{ConfigError, CoreError, ProbeError};
pub use gating::{
    prerequisite_summary, BalanceRequirement, GatingConfig, GatingEvaluator, GatingState,
    PrerequisiteKind, PrerequisiteResult, TimeWindow,
};
pub use mode::{ModeDecisionEngine, ModeReason, ModeState};
pub use observer::{Subscription, SubscriptionId};
pub use probe::{HttpSourceValidator, ProbeKind, ProbeOutcome, SourceValidator};
pub use status::{DataSourceStatus, ModuleApis};

use std::sync::Arc;

/// Owns the process-wide mode engine and the gating facts.
pub struct DashboardCore<V = HttpSourceValidator> {
    mode: Arc<ModeDecisionEngine<V>>,
    gating: GatingEvaluator,
}

impl DashboardCore<HttpSourceValidator> {
    /// Build a core that probes the configured HTTP endpoints.
    pub fn from_config(config: CoreConfig) -> Result<Self, CoreError> {
        let validator = HttpSourceValidator::new(config)?;
        Ok(Self::with_validator(validator))
    }
}

impl<V: SourceValidator> DashboardCore<V> {
    pub fn with_validator(validator: V) -> Self {
        Self {
            mode: ModeDecisionEngine::new(validator),
            gating: GatingEvaluator::new(),
        }
    }

    /// The shared mode engine. Every call returns the same instance.
    pub fn mode_engine(&self) -> Arc<ModeDecisionEngine<V>> {
        Arc::clone(&self.mode)
    }

    pub fn gating(&self) -> &GatingEvaluator {
        &self.gating
    }

    pub fn gating_mut(&mut self) -> &mut GatingEvaluator {
        &mut self.gating
    }

    /// Feed a wallet-connection change to both engines.
    pub async fn on_wallet_changed(&mut self, connected: bool, address: Option<&str>) -> ModeState {
        self.gating.update_wallet_state(connected, address);
        self.mode.update_demo_mode(connected, false).await
    }
}
