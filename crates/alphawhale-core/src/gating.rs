//! Action gating.
//!
//! A [`GatingEvaluator`] holds the latest wallet, balance, approval and region
//! facts pushed by the host. [`GatingEvaluator::evaluate_action`] checks those
//! facts against a declarative [`GatingConfig`] and reports whether the action
//! is enabled, listing every prerequisite it checked.
//!
//! Evaluation is a pure function of the facts, the config and the clock
//! reading. Malformed inputs (an amount that does not parse, say) make the
//! prerequisite unmet instead of failing the evaluation.

use std::collections::BTreeMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{ALL_PREREQUISITES_MET, RESTRICTED_REGIONS};

/// Minimum holding of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRequirement {
    pub token: String,
    /// Decimal string, e.g. `"1.5"`.
    pub amount: String,
}

/// Inclusive availability window. A missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| start <= now) && self.end.map_or(true, |end| now <= end)
    }
}

/// What an action needs before it may run. Absent fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatingConfig {
    #[serde(default)]
    pub require_wallet: bool,
    /// Addresses that must be approved, checked in this order.
    #[serde(default)]
    pub require_approvals: Vec<String>,
    #[serde(default)]
    pub minimum_balance: Option<BalanceRequirement>,
    #[serde(default)]
    pub geo_restricted: bool,
    #[serde(default)]
    pub time_constraint: Option<TimeWindow>,
}

impl GatingConfig {
    /// A config with no prerequisites; always enabled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(mut self) -> Self {
        self.require_wallet = true;
        self
    }

    pub fn with_approval(mut self, address: impl Into<String>) -> Self {
        self.require_approvals.push(address.into());
        self
    }

    pub fn with_minimum_balance(mut self, token: impl Into<String>, amount: impl Into<String>) -> Self {
        self.minimum_balance = Some(BalanceRequirement {
            token: token.into(),
            amount: amount.into(),
        });
        self
    }

    pub fn with_geo_restriction(mut self) -> Self {
        self.geo_restricted = true;
        self
    }

    pub fn with_time_window(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.time_constraint = Some(TimeWindow { start, end });
        self
    }
}

/// Prerequisite categories, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrerequisiteKind {
    Wallet,
    Approval,
    Balance,
    Geo,
    Time,
}

impl PrerequisiteKind {
    /// User-facing sentence explaining why an action is blocked by this kind.
    pub fn disabled_reason(&self) -> &'static str {
        match self {
            Self::Wallet => "Connect your wallet to continue",
            Self::Approval => "Token approval required before continuing",
            Self::Balance => "Insufficient token balance for this action",
            Self::Geo => "This action is not available in your region",
            Self::Time => "This action is not available at this time",
        }
    }
}

impl std::fmt::Display for PrerequisiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wallet => write!(f, "wallet"),
            Self::Approval => write!(f, "approval"),
            Self::Balance => write!(f, "balance"),
            Self::Geo => write!(f, "geo"),
            Self::Time => write!(f, "time"),
        }
    }
}

/// One checked prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteResult {
    #[serde(rename = "type")]
    pub kind: PrerequisiteKind,
    pub required: bool,
    pub met: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PrerequisiteResult {
    fn required(kind: PrerequisiteKind, met: bool, detail: Option<String>) -> Self {
        Self {
            kind,
            required: true,
            met,
            detail,
        }
    }

    fn blocks(&self) -> bool {
        self.required && !self.met
    }
}

/// Outcome of one evaluation. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatingState {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    pub prerequisites: Vec<PrerequisiteResult>,
}

impl GatingState {
    fn from_prerequisites(prerequisites: Vec<PrerequisiteResult>) -> Self {
        let first_blocking = prerequisites.iter().find(|p| p.blocks()).map(|p| p.kind);
        Self {
            enabled: first_blocking.is_none(),
            disabled_reason: first_blocking.map(|kind| kind.disabled_reason().to_string()),
            prerequisites,
        }
    }

    /// Prerequisites that are required but not met, in evaluation order.
    pub fn unmet(&self) -> impl Iterator<Item = &PrerequisiteResult> {
        self.prerequisites.iter().filter(|p| p.blocks())
    }

    pub fn summary(&self) -> String {
        prerequisite_summary(self)
    }
}

/// `"All prerequisites met"` for an enabled action, otherwise a count of the
/// unmet prerequisites and their categories.
pub fn prerequisite_summary(state: &GatingState) -> String {
    if state.enabled {
        return ALL_PREREQUISITES_MET.to_string();
    }

    let mut kinds: Vec<PrerequisiteKind> = state.unmet().map(|p| p.kind).collect();
    let unmet = kinds.len();
    kinds.dedup();

    if unmet == 0 {
        // Only reachable for a hand-built state that disagrees with itself.
        return "Action unavailable".to_string();
    }

    let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
    format!(
        "{unmet} of {} prerequisites not met: {}",
        state.prerequisites.len(),
        names.join(", ")
    )
}

/// Latest wallet, balance, approval and region facts for the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatingEvaluator {
    wallet_connected: bool,
    wallet_address: Option<String>,
    balances: BTreeMap<String, String>,
    approvals: BTreeMap<String, bool>,
    region: Option<String>,
}

impl GatingEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_wallet_state(&mut self, connected: bool, address: Option<&str>) {
        self.wallet_connected = connected;
        self.wallet_address = address.map(str::to_string);
    }

    /// Merge balances in; a token seen again overwrites its old amount.
    pub fn update_token_balances<I, K, A>(&mut self, balances: I)
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: Into<String>,
    {
        for (token, amount) in balances {
            self.balances.insert(token.into(), amount.into());
        }
    }

    /// Merge approvals in; an address seen again overwrites its old flag.
    pub fn update_token_approvals<I, K>(&mut self, approvals: I)
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        for (address, approved) in approvals {
            self.approvals
                .insert(normalize_address(address.as_ref()), approved);
        }
    }

    pub fn set_user_region(&mut self, region: &str) {
        self.region = Some(normalize_region(region));
    }

    pub fn wallet_connected(&self) -> bool {
        self.wallet_connected
    }

    pub fn wallet_address(&self) -> Option<&str> {
        self.wallet_address.as_deref()
    }

    pub fn token_balance(&self, token: &str) -> Option<&str> {
        self.balances.get(token).map(String::as_str)
    }

    pub fn is_approved(&self, address: &str) -> bool {
        self.approvals
            .get(&normalize_address(address))
            .copied()
            .unwrap_or(false)
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Evaluate against the current wall clock.
    pub fn evaluate_action(&self, config: &GatingConfig) -> GatingState {
        self.evaluate_action_at(config, Utc::now())
    }

    /// Evaluate with an explicit clock reading.
    ///
    /// Prerequisites come out in a fixed order: wallet, approvals (config
    /// order), balance, geo, time.
    pub fn evaluate_action_at(&self, config: &GatingConfig, now: DateTime<Utc>) -> GatingState {
        let mut prerequisites = Vec::with_capacity(config.require_approvals.len() + 4);

        if config.require_wallet {
            prerequisites.push(PrerequisiteResult::required(
                PrerequisiteKind::Wallet,
                self.wallet_connected,
                (!self.wallet_connected).then(|| "no wallet connected".to_string()),
            ));
        }

        for address in &config.require_approvals {
            let met = self.is_approved(address);
            prerequisites.push(PrerequisiteResult::required(
                PrerequisiteKind::Approval,
                met,
                (!met).then(|| format!("approval missing for {address}")),
            ));
        }

        if let Some(ref requirement) = config.minimum_balance {
            prerequisites.push(self.check_balance(requirement));
        }

        if config.geo_restricted {
            let blocked = self.region.as_deref().filter(|r| is_restricted_region(r));
            prerequisites.push(PrerequisiteResult::required(
                PrerequisiteKind::Geo,
                blocked.is_none(),
                blocked.map(|r| format!("restricted region {r}")),
            ));
        }

        if let Some(window) = config.time_constraint {
            prerequisites.push(check_window(&window, now));
        }

        let state = GatingState::from_prerequisites(prerequisites);
        tracing::debug!(
            enabled = state.enabled,
            checked = state.prerequisites.len(),
            "Action gating evaluated"
        );
        state
    }

    fn check_balance(&self, requirement: &BalanceRequirement) -> PrerequisiteResult {
        let token = requirement.token.as_str();
        let Some(required) = parse_amount(&requirement.amount) else {
            return PrerequisiteResult::required(
                PrerequisiteKind::Balance,
                false,
                Some(format!("required {token} amount is not a number")),
            );
        };

        let held = self.token_balance(token).unwrap_or("0");
        let Some(actual) = parse_amount(held) else {
            return PrerequisiteResult::required(
                PrerequisiteKind::Balance,
                false,
                Some(format!("{token} balance is not a number")),
            );
        };

        let met = actual >= required;
        PrerequisiteResult::required(
            PrerequisiteKind::Balance,
            met,
            (!met).then(|| format!("have {held} {token}, need {}", requirement.amount.trim())),
        )
    }
}

fn check_window(window: &TimeWindow, now: DateTime<Utc>) -> PrerequisiteResult {
    let detail = match (window.start, window.end) {
        (Some(start), _) if now < start => Some(format!("opens at {}", start.to_rfc3339())),
        (_, Some(end)) if now > end => Some(format!("closed at {}", end.to_rfc3339())),
        _ => None,
    };
    PrerequisiteResult::required(PrerequisiteKind::Time, window.contains(now), detail)
}

fn parse_amount(raw: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(raw.trim()).ok()
}

fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

fn normalize_region(region: &str) -> String {
    region.trim().to_ascii_uppercase()
}

/// Whether geo-restricted actions are blocked in `region`.
pub fn is_restricted_region(region: &str) -> bool {
    let region = normalize_region(region);
    RESTRICTED_REGIONS.contains(&region.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn empty_config_is_enabled() {
        let state = GatingEvaluator::new().evaluate_action_at(&GatingConfig::new(), at(0));
        assert!(state.enabled);
        assert!(state.disabled_reason.is_none());
        assert!(state.prerequisites.is_empty());
        assert_eq!(state.summary(), "All prerequisites met");
    }

    #[test]
    fn prerequisites_follow_fixed_order() {
        let config = GatingConfig::new()
            .with_time_window(None, None)
            .with_geo_restriction()
            .with_minimum_balance("ETH", "1")
            .with_approval("0xA")
            .with_approval("0xB")
            .with_wallet();

        let state = GatingEvaluator::new().evaluate_action_at(&config, at(0));
        let kinds: Vec<PrerequisiteKind> = state.prerequisites.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            [
                PrerequisiteKind::Wallet,
                PrerequisiteKind::Approval,
                PrerequisiteKind::Approval,
                PrerequisiteKind::Balance,
                PrerequisiteKind::Geo,
                PrerequisiteKind::Time,
            ]
        );
        assert!(state.prerequisites.iter().all(|p| p.required));
    }

    #[test]
    fn approvals_ignore_address_case() {
        let mut evaluator = GatingEvaluator::new();
        evaluator.update_token_approvals([("0xAbCd", true)]);
        assert!(evaluator.is_approved("0xabcd"));
        assert!(evaluator.is_approved(" 0XABCD "));
        assert!(!evaluator.is_approved("0xother"));
    }

    #[test]
    fn balances_merge_last_write_wins() {
        let mut evaluator = GatingEvaluator::new();
        evaluator.update_token_balances([("ETH", "1.0"), ("USDC", "10")]);
        evaluator.update_token_balances([("ETH", "3.25")]);
        assert_eq!(evaluator.token_balance("ETH"), Some("3.25"));
        assert_eq!(evaluator.token_balance("USDC"), Some("10"));
    }

    #[test]
    fn balance_comparison_is_decimal_not_lexical() {
        let mut evaluator = GatingEvaluator::new();
        evaluator.update_token_balances([("ETH", "10")]);
        let config = GatingConfig::new().with_minimum_balance("ETH", "9.5");
        assert!(evaluator.evaluate_action_at(&config, at(0)).enabled);

        let config = GatingConfig::new().with_minimum_balance("ETH", "10.000000000000000001");
        assert!(!evaluator.evaluate_action_at(&config, at(0)).enabled);
    }

    #[test]
    fn exact_balance_meets_requirement() {
        let mut evaluator = GatingEvaluator::new();
        evaluator.update_token_balances([("ETH", "1.50")]);
        let config = GatingConfig::new().with_minimum_balance("ETH", "1.5");
        assert!(evaluator.evaluate_action_at(&config, at(0)).enabled);
    }

    #[test]
    fn missing_balance_counts_as_zero() {
        let evaluator = GatingEvaluator::new();
        let zero = GatingConfig::new().with_minimum_balance("ETH", "0");
        assert!(evaluator.evaluate_action_at(&zero, at(0)).enabled);

        let some = GatingConfig::new().with_minimum_balance("ETH", "0.01");
        let state = evaluator.evaluate_action_at(&some, at(0));
        assert!(!state.enabled);
        assert_eq!(
            state.prerequisites[0].detail.as_deref(),
            Some("have 0 ETH, need 0.01")
        );
    }

    #[test]
    fn unparsable_amounts_are_unmet_not_fatal() {
        let mut evaluator = GatingEvaluator::new();
        evaluator.update_token_balances([("ETH", "lots")]);

        let bad_actual = GatingConfig::new().with_minimum_balance("ETH", "1");
        let state = evaluator.evaluate_action_at(&bad_actual, at(0));
        assert!(!state.enabled);
        assert!(state.disabled_reason.unwrap().contains("balance"));

        let bad_required = GatingConfig::new().with_minimum_balance("USDC", "abc");
        let state = evaluator.evaluate_action_at(&bad_required, at(0));
        assert!(!state.enabled);
        assert!(!state.prerequisites[0].met);
    }

    #[test]
    fn time_window_bounds_are_inclusive() {
        let evaluator = GatingEvaluator::new();
        let config = GatingConfig::new().with_time_window(Some(at(100)), Some(at(200)));

        assert!(!evaluator.evaluate_action_at(&config, at(99)).enabled);
        assert!(evaluator.evaluate_action_at(&config, at(100)).enabled);
        assert!(evaluator.evaluate_action_at(&config, at(200)).enabled);

        let late = evaluator.evaluate_action_at(&config, at(201));
        assert!(!late.enabled);
        assert!(late.prerequisites[0].detail.as_deref().unwrap().starts_with("closed at"));
    }

    #[test]
    fn open_ended_windows() {
        let evaluator = GatingEvaluator::new();
        let from = GatingConfig::new().with_time_window(Some(at(50)), None);
        assert!(evaluator.evaluate_action_at(&from, at(1_000_000)).enabled);
        assert!(!evaluator.evaluate_action_at(&from, at(49)).enabled);

        let until = GatingConfig::new().with_time_window(None, Some(at(50)));
        assert!(evaluator.evaluate_action_at(&until, at(0)).enabled);
    }

    #[test]
    fn disabled_reason_names_first_unmet_kind() {
        let mut evaluator = GatingEvaluator::new();
        evaluator.update_wallet_state(true, Some("0xme"));
        evaluator.set_user_region("us");
        let config = GatingConfig::new()
            .with_wallet()
            .with_geo_restriction()
            .with_time_window(Some(at(10)), None);

        let state = evaluator.evaluate_action_at(&config, at(0));
        assert!(!state.enabled);
        assert!(state.disabled_reason.as_deref().unwrap().contains("region"));
        assert_eq!(state.summary(), "2 of 3 prerequisites not met: geo, time");
    }

    #[test]
    fn summary_counts_repeated_kinds_once_by_name() {
        let config = GatingConfig::new().with_approval("0x1").with_approval("0x2");
        let state = GatingEvaluator::new().evaluate_action_at(&config, at(0));
        assert_eq!(state.summary(), "2 of 2 prerequisites not met: approval");
    }

    #[test]
    fn unknown_region_passes_geo_check() {
        let evaluator = GatingEvaluator::new();
        let config = GatingConfig::new().with_geo_restriction();
        assert!(evaluator.evaluate_action_at(&config, at(0)).enabled);
    }

    #[test]
    fn config_deserializes_from_dashboard_json() {
        let config: GatingConfig = serde_json::from_value(serde_json::json!({
            "requireWallet": true,
            "requireApprovals": ["0xAAA"],
            "minimumBalance": { "token": "ETH", "amount": "1.5" },
            "timeConstraint": { "start": "2026-01-01T00:00:00Z" }
        }))
        .unwrap();

        assert!(config.require_wallet);
        assert!(!config.geo_restricted);
        assert_eq!(config.require_approvals, ["0xAAA"]);
        assert_eq!(config.time_constraint.unwrap().end, None);
    }

    #[test]
    fn state_serializes_type_field() {
        let state = GatingEvaluator::new()
            .evaluate_action_at(&GatingConfig::new().with_wallet(), at(0));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["enabled"], false);
        assert_eq!(json["prerequisites"][0]["type"], "wallet");
        assert_eq!(json["disabledReason"], "Connect your wallet to continue");
    }
}
