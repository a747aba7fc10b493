//! Deployment Scaler - resizes one topology tier of an Elastic Cloud deployment
//!
//! Resolves a deployment by display name, patches the size of a single tier in
//! the current Elasticsearch plan, submits the whole plan back without pruning
//! sibling resources and waits until the control plane reports the change done.

pub mod cloud;
pub mod config;
pub mod error;
pub mod models;
pub mod scaler;
pub mod tracker;

pub use cloud::{DeploymentApi, HttpDeploymentApi};
pub use config::{Config, ScaleTarget};
pub use error::{Result, ScalerError};
pub use scaler::DeploymentScaler;
pub use tracker::{track_change, TrackFrequency};
