//! Error type shared by the API client, the change tracker and the scaler

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScalerError {
    #[error("deployment not found: {name}")]
    DeploymentNotFound { name: String },

    #[error("topology tier not found: {tier}")]
    TierNotFound { tier: String },

    #[error("Failed to build API client: {message}")]
    Client { message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Elastic Cloud API returned error status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid API response format: {message}")]
    Decode { message: String },

    #[error("plan change failed for {kind} resource {ref_id}: {message}")]
    PlanFailed {
        kind: String,
        ref_id: String,
        message: String,
    },

    #[error("plan change did not converge after {attempts} polls")]
    TrackingTimedOut { attempts: u32 },

    #[error("plan tracking cancelled")]
    Cancelled,
}

pub type Result<T, E = ScalerError> = std::result::Result<T, E>;
