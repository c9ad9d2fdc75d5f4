use std::future::Future;
use std::time::Duration;

use alphawhale::{ConfigError, CoreConfig, DashboardCore, ModeDecisionEngine, SourceValidator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_REVALIDATE_SECS: u64 = 60;

/// Settings that only the monitor process reads.
struct MonitorSettings {
    interval: Duration,
    wallet_address: Option<String>,
    force_demo: bool,
}

impl MonitorSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let interval_secs = match std::env::var("REVALIDATE_INTERVAL_SECS") {
            Ok(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: "REVALIDATE_INTERVAL_SECS",
                        value,
                    })
                }
            },
            Err(_) => DEFAULT_REVALIDATE_SECS,
        };

        let wallet_address = std::env::var("WALLET_ADDRESS")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let force_demo = std::env::var("FORCE_DEMO")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            wallet_address,
            force_demo,
        })
    }
}

/// Re-probe on every tick until `shutdown` resolves. A probe round in flight
/// is abandoned as soon as `shutdown` fires.
async fn revalidate_until<V, S>(
    engine: &ModeDecisionEngine<V>,
    settings: &MonitorSettings,
    connected: bool,
    shutdown: S,
) where
    V: SourceValidator,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(settings.interval);
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = engine.update_demo_mode(connected, settings.force_demo) => {}
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match CoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };
    let settings = match MonitorSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load monitor settings");
            std::process::exit(1);
        }
    };

    tracing::info!("Gas oracle: {}", config.targets.gas_oracle_rpc);
    tracing::info!("Core API health: {}", config.targets.core_health);
    tracing::info!("Probe timeout: {} ms", config.probe_timeout.as_millis());
    tracing::info!("Revalidate every {} s", settings.interval.as_secs());

    let mut core = match DashboardCore::from_config(config) {
        Ok(core) => core,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build dashboard core");
            std::process::exit(1);
        }
    };

    let engine = core.mode_engine();
    let subscription = engine.subscribe(|state| {
        let status = &state.data_source_status;
        tracing::info!(
            is_demo = state.is_demo,
            reason = %state.reason,
            gas_oracle = status.gas_oracle,
            core_api = status.core_api,
            module_apis = status.module_apis.any(),
            banner = state.reason.banner_message(),
            cta = state.reason.banner_cta(),
            "Dashboard mode"
        );
    });

    let wallet = settings.wallet_address.as_deref();
    let connected = wallet.is_some();
    core.gating_mut().update_wallet_state(connected, wallet);
    tracing::info!(
        wallet_connected = connected,
        force_demo = settings.force_demo,
        "Starting alphawhale-monitor"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    revalidate_until(&*engine, &settings, connected, shutdown).await;
    tracing::info!("Received shutdown signal");

    subscription.unsubscribe();
}
