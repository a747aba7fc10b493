//! Plan change tracking
//!
//! After an update is accepted the control plane applies it asynchronously.
//! `track_change` polls the deployment until no resource has a pending plan,
//! then checks that the current plans of the resources the change touched are
//! healthy. Siblings the change never touched are not judged.

use crate::cloud::DeploymentApi;
use crate::error::{Result, ScalerError};
use crate::models::{resource_key, DeploymentGetResponse, UpdatedResource};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Poll interval and budget for change tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFrequency {
    pub poll_interval: Duration,
    pub max_retries: u32,
}

impl Default for TrackFrequency {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_retries: 10,
        }
    }
}

/// Wait for every pending plan of `deployment_id` to finish
///
/// `changed` lists the resources reported by the accepted update. Any resource
/// seen with a pending plan while polling is tracked as well, and only tracked
/// resources have their resulting plan checked.
///
/// The deployment is read at most `max_retries` times, sleeping `poll_interval`
/// before each read. Read errors are returned as-is.
pub async fn track_change<A: DeploymentApi + ?Sized>(
    api: &A,
    deployment_id: &str,
    changed: &[UpdatedResource],
    frequency: TrackFrequency,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut tracked: BTreeSet<String> = changed.iter().filter_map(UpdatedResource::key).collect();

    for attempt in 1..=frequency.max_retries {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(deployment_id = %deployment_id, attempt, "Plan tracking cancelled");
                return Err(ScalerError::Cancelled);
            }
            _ = tokio::time::sleep(frequency.poll_interval) => {}
        }

        let deployment = api.get_deployment(deployment_id).await?;
        let pending = pending_resources(&deployment);

        if pending.is_empty() {
            check_current_plans(&deployment, &tracked)?;
            info!(
                deployment_id = %deployment_id,
                attempt,
                "Plan change converged"
            );
            return Ok(());
        }

        debug!(
            deployment_id = %deployment_id,
            attempt,
            max_retries = frequency.max_retries,
            pending = ?pending,
            "Plan change still pending"
        );
        tracked.extend(pending);
    }

    Err(ScalerError::TrackingTimedOut {
        attempts: frequency.max_retries,
    })
}

/// `kind/ref_id` of every resource with a pending plan
fn pending_resources(deployment: &DeploymentGetResponse) -> Vec<String> {
    deployment
        .resources
        .iter()
        .flat_map(|(kind, resources)| {
            resources
                .iter()
                .filter(|resource| resource.info.plan_info.pending.is_some())
                .map(move |resource| resource_key(kind, &resource.ref_id))
        })
        .collect()
}

fn check_current_plans(deployment: &DeploymentGetResponse, tracked: &BTreeSet<String>) -> Result<()> {
    for (kind, resources) in &deployment.resources {
        for resource in resources {
            if !tracked.contains(&resource_key(kind, &resource.ref_id)) {
                continue;
            }
            let Some(current) = &resource.info.plan_info.current else {
                continue;
            };
            if current.is_failed() {
                let failed = current.failed_steps();
                let message = if failed.is_empty() {
                    "current plan is unhealthy".to_string()
                } else {
                    format!("failed steps: {}", failed.join(", "))
                };
                return Err(ScalerError::PlanFailed {
                    kind: kind.clone(),
                    ref_id: resource.ref_id.clone(),
                    message,
                });
            }
        }
    }
    Ok(())
}
