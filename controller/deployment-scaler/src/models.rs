//! Elastic Cloud API v1 wire models
//!
//! Only the fields the scaler reads are typed. Plans and topology elements keep
//! every other field in a flattened map so a fetched plan can be submitted back
//! without losing anything the control plane sent.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Data tier of an Elasticsearch topology element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TopologyTier {
    #[value(name = "hot_content")]
    HotContent,
    #[value(name = "warm_content")]
    WarmContent,
    #[value(name = "cold_content")]
    ColdContent,
    #[value(name = "frozen_content")]
    FrozenContent,
}

impl TopologyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopologyTier::HotContent => "hot_content",
            TopologyTier::WarmContent => "warm_content",
            TopologyTier::ColdContent => "cold_content",
            TopologyTier::FrozenContent => "frozen_content",
        }
    }
}

impl fmt::Display for TopologyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource a topology size is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SizeResource {
    Memory,
    Storage,
}

impl fmt::Display for SizeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeResource::Memory => f.write_str("memory"),
            SizeResource::Storage => f.write_str("storage"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySize {
    pub resource: SizeResource,
    pub value: i32,
}

/// One element of `plan.cluster_topology`
///
/// `id` stays a plain string: besides the data tiers, plans carry elements such
/// as `master`, `ml` or `coordinating`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyElement {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<TopologySize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TopologyElement {
    pub fn is_tier(&self, tier: TopologyTier) -> bool {
        self.id == tier.as_str()
    }
}

/// Elasticsearch cluster plan, submitted wholesale on every update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_topology: Vec<TopologyElement>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentsListResponse {
    #[serde(default)]
    pub deployments: Vec<DeploymentSummary>,
}

/// Query flags for `GET /deployments/{id}/elasticsearch/{ref_id}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceQuery {
    pub show_settings: bool,
    pub show_plans: bool,
    pub show_plan_defaults: bool,
}

impl ResourceQuery {
    /// Current plan, settings and plan defaults
    pub const fn full() -> Self {
        Self {
            show_settings: true,
            show_plans: true,
            show_plan_defaults: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchResourceInfo {
    pub ref_id: String,
    pub region: String,
    pub info: ElasticsearchClusterInfo,
}

impl ElasticsearchResourceInfo {
    pub fn current_plan(&self) -> Option<&Plan> {
        self.info
            .plan_info
            .current
            .as_ref()
            .and_then(|current| current.plan.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchClusterInfo {
    pub plan_info: ElasticsearchPlansInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElasticsearchPlansInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<ElasticsearchPlanInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchPlanInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticsearchPayload {
    pub plan: Plan,
    pub ref_id: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentUpdateResources {
    #[serde(default)]
    pub elasticsearch: Vec<ElasticsearchPayload>,
}

/// Body of `PUT /deployments/{id}`
///
/// With `prune_orphans` set, resource kinds missing from `resources` are deleted
/// from the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentUpdateRequest {
    pub prune_orphans: bool,
    pub resources: DeploymentUpdateResources,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentUpdateResponse {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resources: Vec<UpdatedResource>,
}

/// Resource touched by an accepted update
///
/// Both fields are lenient: the update is already accepted when this is
/// decoded, so a missing field must not turn it into a failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatedResource {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub ref_id: String,
}

impl UpdatedResource {
    /// `kind/ref_id`, or `None` when the response left either field out
    pub fn key(&self) -> Option<String> {
        if self.kind.is_empty() || self.ref_id.is_empty() {
            return None;
        }
        Some(resource_key(&self.kind, &self.ref_id))
    }
}

/// Identifies one resource of a deployment across responses
pub fn resource_key(kind: &str, ref_id: &str) -> String {
    format!("{}/{}", kind, ref_id)
}

/// `GET /deployments/{id}` with plans and plan logs, reduced to what change
/// tracking reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentGetResponse {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Keyed by resource kind: `elasticsearch`, `kibana`, `apm`, ...
    #[serde(default)]
    pub resources: BTreeMap<String, Vec<TrackedResource>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedResource {
    pub ref_id: String,
    pub info: TrackedResourceInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedResourceInfo {
    pub plan_info: PlanTracking,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanTracking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<PlanStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PlanStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
    #[serde(default)]
    pub plan_attempt_log: Vec<PlanStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: String,
    pub status: String,
}

impl PlanStatus {
    /// Step ids of the attempt log entries that ended in error
    pub fn failed_steps(&self) -> Vec<&str> {
        self.plan_attempt_log
            .iter()
            .filter(|step| step.status == "error")
            .map(|step| step.step_id.as_str())
            .collect()
    }

    pub fn is_failed(&self) -> bool {
        self.healthy == Some(false) || !self.failed_steps().is_empty()
    }
}
