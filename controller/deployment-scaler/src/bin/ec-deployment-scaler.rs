//! Deployment scaler binary - resizes the configured tier once and exits

use anyhow::Context;
use deployment_scaler::{Config, DeploymentScaler};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,deployment_scaler=debug"));

    if log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse_config();
    init_tracing(config.log_json);

    info!("Starting Elastic Cloud deployment scaler");
    info!("Configuration:");
    info!("  API endpoint: {}", config.api_endpoint);
    info!("  Deployment: {}", config.deployment_name);
    info!("  Resource: {}", config.ref_id);
    info!("  Tier: {} ({} = {})", config.tier, config.resource, config.size);
    info!("  Validate only: {}", config.validate_only);

    let scaler = match DeploymentScaler::from_config(&config).await {
        Ok(scaler) => scaler,
        Err(e) => {
            error!("Failed to resolve deployment: {}", e);
            return Err(e).context("Failed to resolve deployment");
        }
    };

    let cancel = scaler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling plan tracking");
            cancel.cancel();
        }
    });

    match scaler
        .update_deployment_spec(config.size, config.validate_only)
        .await
    {
        Ok(()) => {
            info!(
                deployment_id = %scaler.deployment_id(),
                "Deployment scaled successfully"
            );
            Ok(())
        }
        Err(e) => {
            error!(deployment_id = %scaler.deployment_id(), "Deployment update failed: {}", e);
            Err(e).context("Deployment update failed")
        }
    }
}
