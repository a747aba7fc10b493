//! Deployment scaler - resizes one topology tier of a named deployment

use crate::cloud::{DeploymentApi, HttpDeploymentApi};
use crate::config::{Config, ScaleTarget};
use crate::error::{Result, ScalerError};
use crate::models::{
    DeploymentUpdateRequest, DeploymentUpdateResources, ElasticsearchPayload,
    ElasticsearchResourceInfo, Plan, ResourceQuery, UpdatedResource,
};
use crate::tracker::{track_change, TrackFrequency};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_REF_ID: &str = "main-elasticsearch";

/// Handle bound to one deployment, resolved by display name
pub struct DeploymentScaler<A: DeploymentApi> {
    api: Arc<A>,
    deployment_id: String,
    deployment_name: String,
    ref_id: String,
    target: ScaleTarget,
    frequency: TrackFrequency,
    cancel: CancellationToken,
}

impl DeploymentScaler<HttpDeploymentApi> {
    /// Build the HTTP client from `config` and resolve the configured deployment
    pub async fn from_config(config: &Config) -> Result<Self> {
        let api = HttpDeploymentApi::new(
            &config.api_endpoint,
            &config.api_key,
            config.request_timeout,
        )?;

        let scaler = Self::connect(Arc::new(api), &config.deployment_name).await?;
        Ok(scaler
            .with_ref_id(config.ref_id.clone())
            .with_target(config.scale_target())
            .with_track_frequency(config.track_frequency()))
    }
}

impl<A: DeploymentApi> DeploymentScaler<A> {
    /// Resolve `deployment_name` to its id
    ///
    /// Names must match exactly. The whole list is scanned and the first match
    /// wins.
    pub async fn connect(api: Arc<A>, deployment_name: &str) -> Result<Self> {
        let list = api.list_deployments().await?;

        let deployment = list
            .deployments
            .into_iter()
            .find(|deployment| deployment.name == deployment_name)
            .ok_or_else(|| ScalerError::DeploymentNotFound {
                name: deployment_name.to_string(),
            })?;

        info!(
            deployment_id = %deployment.id,
            deployment_name = %deployment_name,
            "Resolved deployment"
        );

        Ok(Self {
            api,
            deployment_id: deployment.id,
            deployment_name: deployment_name.to_string(),
            ref_id: DEFAULT_REF_ID.to_string(),
            target: ScaleTarget::default(),
            frequency: TrackFrequency::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = ref_id.into();
        self
    }

    pub fn with_target(mut self, target: ScaleTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_track_frequency(mut self, frequency: TrackFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Use `cancel` to abort plan tracking
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch the Elasticsearch resource with current plan, settings and plan defaults
    pub async fn get_elasticsearch_resource_info(&self) -> Result<ElasticsearchResourceInfo> {
        self.api
            .get_elasticsearch(&self.deployment_id, &self.ref_id, ResourceQuery::full())
            .await
    }

    /// Resize the target tier to `size` and wait for the plan change
    ///
    /// The full current plan is submitted with only the target tier's size
    /// replaced. With `validate_only` the control plane checks the request and
    /// nothing is tracked since nothing is applied.
    pub async fn update_deployment_spec(&self, size: i32, validate_only: bool) -> Result<()> {
        let resource = self.get_elasticsearch_resource_info().await?;
        let request = self.build_update_request(resource, size)?;

        info!(
            deployment_id = %self.deployment_id,
            tier = %self.target.tier,
            resource = %self.target.resource,
            size,
            validate_only,
            "Submitting deployment update"
        );

        let response = self
            .api
            .update_deployment(&self.deployment_id, &request, validate_only)
            .await?;

        if validate_only {
            info!(deployment_id = %response.id, "Deployment update validated");
            return Ok(());
        }

        info!(
            deployment_id = %response.id,
            poll_interval_ms = self.frequency.poll_interval.as_millis() as u64,
            max_retries = self.frequency.max_retries,
            "Deployment update accepted, tracking plan change"
        );

        let mut changed = response.resources;
        changed.extend(request.resources.elasticsearch.iter().map(|payload| UpdatedResource {
            kind: "elasticsearch".to_string(),
            ref_id: payload.ref_id.clone(),
        }));

        track_change(
            self.api.as_ref(),
            &self.deployment_id,
            &changed,
            self.frequency,
            &self.cancel,
        )
        .await
    }

    /// Update request carrying the whole plan with the target tier resized
    pub fn build_update_request(
        &self,
        resource: ElasticsearchResourceInfo,
        size: i32,
    ) -> Result<DeploymentUpdateRequest> {
        let ElasticsearchResourceInfo {
            ref_id,
            region,
            info,
        } = resource;

        let mut plan = info
            .plan_info
            .current
            .and_then(|current| current.plan)
            .ok_or_else(|| ScalerError::Decode {
                message: format!("Elasticsearch resource {} has no current plan", ref_id),
            })?;

        if !self.resize_tier(&mut plan, size) {
            if self.target.require_tier {
                return Err(ScalerError::TierNotFound {
                    tier: self.target.tier.to_string(),
                });
            }
            warn!(
                deployment_id = %self.deployment_id,
                tier = %self.target.tier,
                "Tier not present in current plan, submitting plan unchanged"
            );
        }

        Ok(DeploymentUpdateRequest {
            prune_orphans: false,
            resources: DeploymentUpdateResources {
                elasticsearch: vec![ElasticsearchPayload {
                    plan,
                    ref_id,
                    region,
                    settings: info.settings,
                }],
            },
        })
    }

    /// Returns whether any element matched the target tier
    fn resize_tier(&self, plan: &mut Plan, size: i32) -> bool {
        let mut matched = false;
        for element in plan
            .cluster_topology
            .iter_mut()
            .filter(|element| element.is_tier(self.target.tier))
        {
            element.size = Some(self.target.size(size));
            matched = true;
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DeploymentGetResponse, DeploymentSummary, DeploymentUpdateResponse,
        DeploymentsListResponse, SizeResource, TopologyTier,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory control plane recording every update it receives
    struct FakeApi {
        deployments: Vec<(&'static str, &'static str)>,
        resource: Value,
        pending_forever: bool,
        kibana_healthy: bool,
        submitted: Mutex<Vec<(DeploymentUpdateRequest, bool)>>,
        applied: Mutex<Vec<DeploymentUpdateRequest>>,
        tracking_reads: Mutex<u32>,
    }

    impl FakeApi {
        fn new(topology: Value) -> Self {
            Self {
                deployments: vec![("id-a", "a"), ("id-b", "b"), ("id-c", "c")],
                resource: json!({
                    "ref_id": "main-elasticsearch",
                    "region": "gcp-asia-northeast1",
                    "info": {
                        "settings": { "metadata": { "name": "b" } },
                        "plan_info": {
                            "current": {
                                "plan": {
                                    "cluster_topology": topology,
                                    "elasticsearch": { "version": "8.11.1" }
                                }
                            }
                        }
                    }
                }),
                pending_forever: false,
                kibana_healthy: true,
                submitted: Mutex::new(Vec::new()),
                applied: Mutex::new(Vec::new()),
                tracking_reads: Mutex::new(0),
            }
        }

        fn fetched_plan(&self) -> Plan {
            serde_json::from_value(self.resource["info"]["plan_info"]["current"]["plan"].clone())
                .unwrap()
        }

        fn last_submitted(&self) -> (DeploymentUpdateRequest, bool) {
            self.submitted.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl DeploymentApi for FakeApi {
        async fn list_deployments(&self) -> Result<DeploymentsListResponse> {
            Ok(DeploymentsListResponse {
                deployments: self
                    .deployments
                    .iter()
                    .map(|(id, name)| DeploymentSummary {
                        id: id.to_string(),
                        name: name.to_string(),
                    })
                    .collect(),
            })
        }

        async fn get_elasticsearch(
            &self,
            _deployment_id: &str,
            _ref_id: &str,
            query: ResourceQuery,
        ) -> Result<ElasticsearchResourceInfo> {
            assert_eq!(query, ResourceQuery::full());
            Ok(serde_json::from_value(self.resource.clone()).unwrap())
        }

        async fn update_deployment(
            &self,
            deployment_id: &str,
            request: &DeploymentUpdateRequest,
            validate_only: bool,
        ) -> Result<DeploymentUpdateResponse> {
            self.submitted
                .lock()
                .unwrap()
                .push((request.clone(), validate_only));
            if !validate_only {
                self.applied.lock().unwrap().push(request.clone());
            }
            Ok(DeploymentUpdateResponse {
                id: deployment_id.to_string(),
                name: None,
                resources: Vec::new(),
            })
        }

        async fn get_deployment(&self, deployment_id: &str) -> Result<DeploymentGetResponse> {
            *self.tracking_reads.lock().unwrap() += 1;
            let pending = if self.pending_forever {
                json!({ "plan_attempt_log": [] })
            } else {
                Value::Null
            };
            let mut plan_info = json!({ "current": { "healthy": true } });
            if !pending.is_null() {
                plan_info["pending"] = pending;
            }
            Ok(serde_json::from_value(json!({
                "id": deployment_id,
                "resources": {
                    "elasticsearch": [{ "ref_id": "main-elasticsearch", "info": { "plan_info": plan_info } }],
                    "kibana": [{
                        "ref_id": "main-kibana",
                        "info": { "plan_info": { "current": { "healthy": self.kibana_healthy } } }
                    }]
                }
            }))
            .unwrap())
        }
    }

    fn hot_and_warm() -> Value {
        json!([
            {
                "id": "hot_content",
                "zone_count": 2,
                "size": { "resource": "memory", "value": 2048 }
            },
            {
                "id": "warm_content",
                "zone_count": 1,
                "instance_configuration_id": "gcp.es.datawarm.n2.68x10x190",
                "size": { "resource": "memory", "value": 4096 }
            }
        ])
    }

    fn fast() -> TrackFrequency {
        TrackFrequency {
            poll_interval: Duration::from_millis(1),
            max_retries: 3,
        }
    }

    async fn scaler(api: FakeApi) -> (Arc<FakeApi>, DeploymentScaler<FakeApi>) {
        let api = Arc::new(api);
        let scaler = DeploymentScaler::connect(api.clone(), "b")
            .await
            .unwrap()
            .with_track_frequency(fast());
        (api, scaler)
    }

    #[tokio::test]
    async fn test_connect_resolves_deployment_by_name() {
        let api = Arc::new(FakeApi::new(hot_and_warm()));
        let scaler = DeploymentScaler::connect(api, "b").await.unwrap();

        assert_eq!(scaler.deployment_id(), "id-b");
        assert_eq!(scaler.deployment_name(), "b");
    }

    #[tokio::test]
    async fn test_connect_fails_for_unknown_name() {
        let api = Arc::new(FakeApi::new(hot_and_warm()));
        let err = DeploymentScaler::connect(api, "z").await.err().unwrap();

        assert!(matches!(err, ScalerError::DeploymentNotFound { .. }));
        assert!(err.to_string().contains("deployment not found: z"));
    }

    #[tokio::test]
    async fn test_connect_requires_exact_name() {
        for name in ["B", " b", "b "] {
            let api = Arc::new(FakeApi::new(hot_and_warm()));
            let result = DeploymentScaler::connect(api, name).await;
            assert!(
                matches!(result, Err(ScalerError::DeploymentNotFound { .. })),
                "{:?} must not match \"b\"",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_connect_picks_first_duplicate() {
        let mut api = FakeApi::new(hot_and_warm());
        api.deployments = vec![("id-1", "dup"), ("id-2", "dup")];
        let scaler = DeploymentScaler::connect(Arc::new(api), "dup")
            .await
            .unwrap();

        assert_eq!(scaler.deployment_id(), "id-1");
    }

    #[tokio::test]
    async fn test_update_resizes_only_target_tier() {
        let (api, scaler) = scaler(FakeApi::new(hot_and_warm())).await;

        scaler.update_deployment_spec(8192, false).await.unwrap();

        let (request, validate_only) = api.last_submitted();
        assert!(!validate_only);
        let payload = &request.resources.elasticsearch[0];
        let fetched = api.fetched_plan();

        let hot = &payload.plan.cluster_topology[0];
        assert_eq!(hot.id, "hot_content");
        assert_eq!(hot.size.unwrap().value, 8192);
        assert_eq!(hot.size.unwrap().resource, SizeResource::Memory);
        assert_eq!(hot.extra, fetched.cluster_topology[0].extra);

        assert_eq!(
            serde_json::to_vec(&payload.plan.cluster_topology[1]).unwrap(),
            serde_json::to_vec(&fetched.cluster_topology[1]).unwrap()
        );
        assert_eq!(payload.plan.extra, fetched.extra);
        assert_eq!(payload.ref_id, "main-elasticsearch");
        assert_eq!(payload.region, "gcp-asia-northeast1");
        assert_eq!(payload.settings, Some(json!({ "metadata": { "name": "b" } })));
    }

    #[tokio::test]
    async fn test_update_targets_configured_tier() {
        let (api, scaler) = scaler(FakeApi::new(hot_and_warm())).await;
        let scaler = scaler.with_target(ScaleTarget {
            tier: TopologyTier::WarmContent,
            resource: SizeResource::Storage,
            require_tier: false,
        });

        scaler.update_deployment_spec(61440, false).await.unwrap();

        let (request, _) = api.last_submitted();
        let plan = &request.resources.elasticsearch[0].plan;
        assert_eq!(plan.cluster_topology[0], api.fetched_plan().cluster_topology[0]);
        assert_eq!(plan.cluster_topology[1].size.unwrap().value, 61440);
        assert_eq!(
            plan.cluster_topology[1].size.unwrap().resource,
            SizeResource::Storage
        );
    }

    #[tokio::test]
    async fn test_missing_tier_submits_plan_unchanged() {
        let topology = json!([{ "id": "warm_content", "size": { "resource": "memory", "value": 4096 } }]);
        let (api, scaler) = scaler(FakeApi::new(topology)).await;

        scaler.update_deployment_spec(8192, false).await.unwrap();

        let (request, _) = api.last_submitted();
        assert_eq!(request.resources.elasticsearch[0].plan, api.fetched_plan());
    }

    #[tokio::test]
    async fn test_missing_tier_fails_when_required() {
        let topology = json!([{ "id": "warm_content", "size": { "resource": "memory", "value": 4096 } }]);
        let (api, scaler) = scaler(FakeApi::new(topology)).await;
        let scaler = scaler.with_target(ScaleTarget {
            require_tier: true,
            ..ScaleTarget::default()
        });

        let err = scaler.update_deployment_spec(8192, false).await.err().unwrap();
        assert!(matches!(err, ScalerError::TierNotFound { .. }));
        assert!(api.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_never_prunes_orphans() {
        for (size, validate_only) in [(1024, false), (0, true), (-1, true), (i32::MAX, false)] {
            let (api, scaler) = scaler(FakeApi::new(hot_and_warm())).await;
            scaler
                .update_deployment_spec(size, validate_only)
                .await
                .unwrap();
            assert!(!api.last_submitted().0.prune_orphans);
        }
    }

    #[tokio::test]
    async fn test_validate_only_applies_nothing() {
        let (api, scaler) = scaler(FakeApi::new(hot_and_warm())).await;

        scaler.update_deployment_spec(8192, true).await.unwrap();

        assert_eq!(api.submitted.lock().unwrap().len(), 1);
        assert!(api.last_submitted().1);
        assert!(api.applied.lock().unwrap().is_empty());
        assert_eq!(*api.tracking_reads.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tracking_exhaustion_is_an_error() {
        let mut api = FakeApi::new(hot_and_warm());
        api.pending_forever = true;
        let (api, scaler) = scaler(api).await;

        let err = scaler.update_deployment_spec(8192, false).await.err().unwrap();

        assert!(matches!(err, ScalerError::TrackingTimedOut { attempts: 3 }));
        assert_eq!(api.submitted.lock().unwrap().len(), 1);
        assert_eq!(*api.tracking_reads.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unhealthy_sibling_does_not_fail_resize() {
        let mut api = FakeApi::new(hot_and_warm());
        api.kibana_healthy = false;
        let (api, scaler) = scaler(api).await;

        let result = scaler.update_deployment_spec(8192, false).await;

        assert!(result.is_ok(), "unexpected error: {:?}", result.err());
        assert_eq!(*api.tracking_reads.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_tracking() {
        let mut api = FakeApi::new(hot_and_warm());
        api.pending_forever = true;
        let (_api, scaler) = scaler(api).await;
        let scaler = scaler.with_track_frequency(TrackFrequency {
            poll_interval: Duration::from_secs(3600),
            max_retries: 10,
        });

        let cancel = scaler.cancellation_token();
        cancel.cancel();

        let err = scaler.update_deployment_spec(8192, false).await.err().unwrap();
        assert!(matches!(err, ScalerError::Cancelled));
    }
}
