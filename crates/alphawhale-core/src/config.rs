//! Core configuration from environment variables.

use std::env;
use std::time::Duration;

use url::Url;

use crate::constants::{
    CORE_HEALTH_PATH, DEFAULT_CORE_API_URL, DEFAULT_GAS_ORACLE_RPC_URL, GUARDIAN_STATUS_PATH,
    HARVESTPRO_STATUS_PATH, HUNTER_STATUS_PATH, PROBE_TIMEOUT_MS,
};
use crate::error::ConfigError;

/// Endpoints probed to decide whether live data is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTargets {
    /// JSON-RPC endpoint answering `eth_gasPrice`.
    pub gas_oracle_rpc: Url,
    /// Core backend health endpoint.
    pub core_health: Url,
    /// Guardian module status endpoint.
    pub guardian_status: Url,
    /// Hunter module status endpoint.
    pub hunter_status: Url,
    /// HarvestPro module status endpoint.
    pub harvestpro_status: Url,
}

impl ProbeTargets {
    /// Derive every backend probe from one base URL and a gas oracle URL.
    pub fn from_base(gas_oracle_rpc: Url, core_api: &Url) -> Result<Self, ConfigError> {
        Ok(Self {
            gas_oracle_rpc,
            core_health: join(core_api, CORE_HEALTH_PATH)?,
            guardian_status: join(core_api, GUARDIAN_STATUS_PATH)?,
            hunter_status: join(core_api, HUNTER_STATUS_PATH)?,
            harvestpro_status: join(core_api, HARVESTPRO_STATUS_PATH)?,
        })
    }
}

/// Configuration for the decision core.
#[derive(Clone)]
pub struct CoreConfig {
    /// Probe endpoints.
    pub targets: ProbeTargets,
    /// Per-probe hard timeout (env: PROBE_TIMEOUT_MS, default: 3000).
    pub probe_timeout: Duration,
    /// Bearer token sent to backend probes (env: CORE_API_KEY).
    pub api_key: Option<String>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("targets", &self.targets)
            .field("probe_timeout", &self.probe_timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CoreConfig {
    /// Build a config for the given targets with the default timeout.
    pub fn new(targets: ProbeTargets) -> Self {
        Self {
            targets,
            probe_timeout: Duration::from_millis(PROBE_TIMEOUT_MS),
            api_key: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let gas_oracle_rpc = url_var("GAS_ORACLE_RPC_URL", DEFAULT_GAS_ORACLE_RPC_URL)?;
        let core_api = url_var("CORE_API_URL", DEFAULT_CORE_API_URL)?;

        let mut targets = ProbeTargets::from_base(gas_oracle_rpc, &core_api)?;
        if let Some(url) = optional_url_var("GUARDIAN_STATUS_URL")? {
            targets.guardian_status = url;
        }
        if let Some(url) = optional_url_var("HUNTER_STATUS_URL")? {
            targets.hunter_status = url;
        }
        if let Some(url) = optional_url_var("HARVESTPRO_STATUS_URL")? {
            targets.harvestpro_status = url;
        }

        let probe_timeout_ms = match env::var("PROBE_TIMEOUT_MS") {
            Ok(v) => v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                var: "PROBE_TIMEOUT_MS",
                value: v,
            })?,
            Err(_) => PROBE_TIMEOUT_MS,
        };

        let api_key = env::var("CORE_API_KEY").ok().filter(|s| !s.is_empty());

        Ok(Self {
            targets,
            probe_timeout: Duration::from_millis(probe_timeout_ms),
            api_key,
        })
    }
}

fn url_var(var: &'static str, default: &str) -> Result<Url, ConfigError> {
    let value = env::var(var).unwrap_or_else(|_| default.to_string());
    parse_url(var, value)
}

fn optional_url_var(var: &'static str) -> Result<Option<Url>, ConfigError> {
    match env::var(var).ok().filter(|s| !s.is_empty()) {
        Some(value) => parse_url(var, value).map(Some),
        None => Ok(None),
    }
}

fn parse_url(var: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|_| ConfigError::InvalidUrl { var, value })
}

/// Append one path segment to a base URL, keeping the base's own path.
fn join(base: &Url, segment: &str) -> Result<Url, ConfigError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ConfigError::InvalidUrl {
            var: "CORE_API_URL",
            value: base.to_string(),
        })?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}
