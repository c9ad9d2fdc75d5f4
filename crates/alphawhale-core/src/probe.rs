//! Data-source probes.
//!
//! Five bounded reachability checks (gas oracle, core health, and the three
//! module status endpoints) run concurrently and reduce into a
//! [`DataSourceStatus`]. A probe never fails outward: timeouts, transport
//! errors, unexpected statuses and malformed bodies all read as "unavailable".

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::config::CoreConfig;
use crate::constants::GAS_PRICE_RPC_BODY;
use crate::error::{CoreError, ProbeError};
use crate::status::{DataSourceStatus, ModuleApis};

/// The named probes that make up one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    GasOracle,
    CoreApi,
    Guardian,
    Hunter,
    HarvestPro,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 5] = [
        Self::GasOracle,
        Self::CoreApi,
        Self::Guardian,
        Self::Hunter,
        Self::HarvestPro,
    ];
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GasOracle => write!(f, "gas_oracle"),
            Self::CoreApi => write!(f, "core_api"),
            Self::Guardian => write!(f, "guardian"),
            Self::Hunter => write!(f, "hunter"),
            Self::HarvestPro => write!(f, "harvestpro"),
        }
    }
}

/// What a single probe found.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The endpoint answered successfully.
    Available,
    /// The endpoint exists but wants credentials. Counts as available.
    AuthRequired,
    /// Anything else.
    Unavailable(ProbeError),
}

impl ProbeOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available | Self::AuthRequired)
    }

    /// Classify a response by status code alone.
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::AuthRequired
        } else if status.is_success() {
            Self::Available
        } else {
            Self::Unavailable(ProbeError::Status(status.as_u16()))
        }
    }
}

/// Anything that can produce a data-source availability snapshot.
///
/// Implementations must not fail: every problem is folded into the snapshot.
pub trait SourceValidator: Send + Sync + 'static {
    fn validate(&self) -> impl Future<Output = DataSourceStatus> + Send;
}

/// Probes the configured HTTP endpoints.
pub struct HttpSourceValidator {
    client: reqwest::Client,
    config: CoreConfig,
}

impl HttpSourceValidator {
    pub fn new(config: CoreConfig) -> Result<Self, CoreError> {
        // The hard bound is enforced per probe in `probe`, not by the client.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Run one probe, bounded by the configured timeout.
    pub async fn probe(&self, kind: ProbeKind) -> ProbeOutcome {
        let timeout = self.config.probe_timeout;
        match tokio::time::timeout(timeout, self.send(kind)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => ProbeOutcome::Unavailable(e),
            Err(_) => ProbeOutcome::Unavailable(ProbeError::Timeout(millis(timeout))),
        }
    }

    async fn send(&self, kind: ProbeKind) -> Result<ProbeOutcome, ProbeError> {
        match kind {
            ProbeKind::GasOracle => self.gas_price().await,
            ProbeKind::CoreApi => self.status_check(&self.config.targets.core_health).await,
            ProbeKind::Guardian => self.status_check(&self.config.targets.guardian_status).await,
            ProbeKind::Hunter => self.status_check(&self.config.targets.hunter_status).await,
            ProbeKind::HarvestPro => {
                self.status_check(&self.config.targets.harvestpro_status)
                    .await
            }
        }
    }

    /// `eth_gasPrice` must come back as a JSON-RPC result, not just any 2xx.
    async fn gas_price(&self) -> Result<ProbeOutcome, ProbeError> {
        let resp = self
            .client
            .post(self.config.targets.gas_oracle_rpc.clone())
            .header("Content-Type", "application/json")
            .body(GAS_PRICE_RPC_BODY)
            .send()
            .await?;

        let outcome = ProbeOutcome::from_status(resp.status());
        if !matches!(outcome, ProbeOutcome::Available) {
            return Ok(outcome);
        }

        let body = resp.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ProbeError::MalformedBody(e.to_string()))?;
        if matches!(value.get("error"), Some(e) if !e.is_null()) {
            return Err(ProbeError::MalformedBody("JSON-RPC error response".into()));
        }
        if !matches!(value.get("result"), Some(r) if !r.is_null()) {
            return Err(ProbeError::MalformedBody("missing result".into()));
        }
        Ok(ProbeOutcome::Available)
    }

    async fn status_check(&self, url: &Url) -> Result<ProbeOutcome, ProbeError> {
        let mut request = self.client.get(url.clone());
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;
        Ok(ProbeOutcome::from_status(resp.status()))
    }
}

impl SourceValidator for HttpSourceValidator {
    async fn validate(&self) -> DataSourceStatus {
        let (gas, core, guardian, hunter, harvestpro) = tokio::join!(
            self.probe(ProbeKind::GasOracle),
            self.probe(ProbeKind::CoreApi),
            self.probe(ProbeKind::Guardian),
            self.probe(ProbeKind::Hunter),
            self.probe(ProbeKind::HarvestPro),
        );

        let status = DataSourceStatus {
            gas_oracle: available(ProbeKind::GasOracle, &gas),
            core_api: available(ProbeKind::CoreApi, &core),
            module_apis: ModuleApis {
                guardian: available(ProbeKind::Guardian, &guardian),
                hunter: available(ProbeKind::Hunter, &hunter),
                harvestpro: available(ProbeKind::HarvestPro, &harvestpro),
            },
        };

        tracing::info!(
            gas_oracle = status.gas_oracle,
            core_api = status.core_api,
            guardian = status.module_apis.guardian,
            hunter = status.module_apis.hunter,
            harvestpro = status.module_apis.harvestpro,
            overall = status.overall(),
            "Data source validation complete"
        );
        status
    }
}

fn available(kind: ProbeKind, outcome: &ProbeOutcome) -> bool {
    match outcome {
        ProbeOutcome::Unavailable(e) => {
            tracing::debug!(probe = %kind, error = %e, "Probe unavailable");
            false
        }
        ProbeOutcome::AuthRequired => {
            tracing::debug!(probe = %kind, "Probe requires auth, treating as available");
            true
        }
        ProbeOutcome::Available => true,
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
