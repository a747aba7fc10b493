//! Elastic Cloud deployment API client
//!
//! `DeploymentApi` is the contract the scaler and the change tracker need from
//! the control plane. `HttpDeploymentApi` implements it against the public
//! REST API v1; tests substitute their own implementations.

use crate::error::{Result, ScalerError};
use crate::models::{
    DeploymentGetResponse, DeploymentUpdateRequest, DeploymentUpdateResponse,
    DeploymentsListResponse, ElasticsearchResourceInfo, ResourceQuery,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.elastic-cloud.com";

/// Deployment operations consumed from the control plane
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    /// List every deployment visible to the credential
    async fn list_deployments(&self) -> Result<DeploymentsListResponse>;

    /// Fetch one Elasticsearch resource of a deployment
    async fn get_elasticsearch(
        &self,
        deployment_id: &str,
        ref_id: &str,
        query: ResourceQuery,
    ) -> Result<ElasticsearchResourceInfo>;

    /// Submit a deployment update; with `validate_only` nothing is applied
    async fn update_deployment(
        &self,
        deployment_id: &str,
        request: &DeploymentUpdateRequest,
        validate_only: bool,
    ) -> Result<DeploymentUpdateResponse>;

    /// Read the deployment with plan info, used to track a submitted change
    async fn get_deployment(&self, deployment_id: &str) -> Result<DeploymentGetResponse>;
}

/// HTTP client for the Elastic Cloud API, authenticated with an API key
pub struct HttpDeploymentApi {
    client: Client,
    base_api: Url,
}

impl HttpDeploymentApi {
    /// Create a new client for `endpoint`
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ScalerError::Client {
                message: "API key is empty".to_string(),
            });
        }

        let base_api = resolve_api_url(endpoint)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let auth_header = format!("ApiKey {}", api_key);
        let mut auth_value =
            HeaderValue::from_str(&auth_header).map_err(|e| ScalerError::Client {
                message: format!("Invalid API key value: {}", e),
            })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ScalerError::Client {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, base_api })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_api
            .join(path)
            .map_err(|e| ScalerError::Client {
                message: format!("Invalid request path {}: {}", path, e),
            })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(ScalerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ScalerError::Decode {
            message: e.to_string(),
        })
    }
}

fn resolve_api_url(endpoint: &str) -> Result<Url> {
    let mut normalized = endpoint.trim().to_string();
    if !normalized.starts_with("http://") && !normalized.starts_with("https://") {
        return Err(ScalerError::Client {
            message: format!(
                "Invalid API endpoint: {}. Must start with http:// or https://",
                endpoint
            ),
        });
    }
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| ScalerError::Client {
        message: format!("Invalid API endpoint {}: {}", endpoint, e),
    })
}

#[async_trait]
impl DeploymentApi for HttpDeploymentApi {
    async fn list_deployments(&self) -> Result<DeploymentsListResponse> {
        let url = self.url("api/v1/deployments")?;
        debug!(url = %url, "Listing deployments");

        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn get_elasticsearch(
        &self,
        deployment_id: &str,
        ref_id: &str,
        query: ResourceQuery,
    ) -> Result<ElasticsearchResourceInfo> {
        let url = self.url(&format!(
            "api/v1/deployments/{}/elasticsearch/{}",
            deployment_id, ref_id
        ))?;
        debug!(url = %url, ?query, "Fetching Elasticsearch resource");

        let response = self.client.get(url).query(&query).send().await?;
        Self::decode(response).await
    }

    async fn update_deployment(
        &self,
        deployment_id: &str,
        request: &DeploymentUpdateRequest,
        validate_only: bool,
    ) -> Result<DeploymentUpdateResponse> {
        let url = self.url(&format!("api/v1/deployments/{}", deployment_id))?;
        debug!(url = %url, validate_only, "Submitting deployment update");

        let response = self
            .client
            .put(url)
            .query(&[("validate_only", validate_only)])
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_deployment(&self, deployment_id: &str) -> Result<DeploymentGetResponse> {
        let url = self.url(&format!("api/v1/deployments/{}", deployment_id))?;

        let response = self
            .client
            .get(url)
            .query(&[("show_plans", true), ("show_plan_logs", true)])
            .send()
            .await?;
        Self::decode(response).await
    }
}
