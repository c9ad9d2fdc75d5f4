/// Hard per-probe timeout in milliseconds.
pub const PROBE_TIMEOUT_MS: u64 = 3_000;

/// Default JSON-RPC endpoint used for the gas price probe.
pub const DEFAULT_GAS_ORACLE_RPC_URL: &str = "https://eth.llamarpc.com";

/// Default base URL of the backend functions.
pub const DEFAULT_CORE_API_URL: &str = "http://localhost:54321/functions/v1";

/// Path appended to the core API base for the health probe.
pub const CORE_HEALTH_PATH: &str = "health";

/// Module status paths appended to the core API base when no explicit URL is set.
pub const GUARDIAN_STATUS_PATH: &str = "guardian-summary";
pub const HUNTER_STATUS_PATH: &str = "hunter-opportunities";
pub const HARVESTPRO_STATUS_PATH: &str = "harvest-recompute-opportunities";

/// JSON-RPC request body sent to the gas oracle.
pub const GAS_PRICE_RPC_BODY: &str =
    r#"{"jsonrpc":"2.0","method":"eth_gasPrice","params":[],"id":1}"#;

/// Regions in which geo-restricted actions are never enabled.
pub const RESTRICTED_REGIONS: &[&str] = &["US", "CN", "KP"];

/// Banner copy shown while the dashboard presents simulated data.
pub const BANNER_SIMULATED: &str = "Demo Mode — Data is simulated";
pub const BANNER_UNAVAILABLE: &str = "Demo Mode — Live data temporarily unavailable";

/// Call-to-action copy paired with the banner.
pub const CTA_CONNECT_WALLET: &str = "Connect Wallet for Live Data";
pub const CTA_RETRY: &str = "Retry Live Data";
pub const CTA_SWITCH_TO_LIVE: &str = "Switch to Live Data";

/// Summary returned for an enabled action.
pub const ALL_PREREQUISITES_MET: &str = "All prerequisites met";
