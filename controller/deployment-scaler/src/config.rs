//! Configuration for the deployment scaler

use crate::cloud::DEFAULT_API_ENDPOINT;
use crate::models::{SizeResource, TopologySize, TopologyTier};
use crate::scaler::DEFAULT_REF_ID;
use crate::tracker::TrackFrequency;
use clap::Parser;
use std::time::Duration;

/// Configuration for the deployment scaler
#[derive(Debug, Clone, Parser)]
#[command(name = "ec-deployment-scaler")]
#[command(about = "Resizes one topology tier of an Elastic Cloud deployment and waits for the plan")]
pub struct Config {
    /// Elastic Cloud API key
    #[arg(long, env = "EC_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Display name of the deployment (exact match)
    #[arg(long, env = "DEPLOYMENT_NAME")]
    pub deployment_name: String,

    /// Elastic Cloud API base URL
    #[arg(long, env = "EC_API_ENDPOINT", default_value = DEFAULT_API_ENDPOINT)]
    pub api_endpoint: String,

    /// Reference id of the Elasticsearch resource
    #[arg(long, env = "EC_REF_ID", default_value = DEFAULT_REF_ID)]
    pub ref_id: String,

    /// Topology tier to resize
    #[arg(long, env = "SCALE_TIER", value_enum, default_value_t = TopologyTier::HotContent)]
    pub tier: TopologyTier,

    /// Resource the size is expressed in
    #[arg(long, env = "SCALE_RESOURCE", value_enum, default_value_t = SizeResource::Memory)]
    pub resource: SizeResource,

    /// Target size, in the unit the control plane expects for the resource
    #[arg(long, env = "SCALE_SIZE", default_value_t = 1024)]
    pub size: i32,

    /// Ask the control plane to validate the update without applying it
    #[arg(long, env = "VALIDATE_ONLY")]
    pub validate_only: bool,

    /// Fail instead of submitting an unchanged plan when the tier is absent
    #[arg(long, env = "REQUIRE_TIER")]
    pub require_tier: bool,

    /// Interval between plan tracking polls
    #[arg(long, env = "POLL_INTERVAL", value_parser = humantime::parse_duration, default_value = "10s")]
    pub poll_interval: Duration,

    /// Maximum number of plan tracking polls
    #[arg(long, env = "MAX_RETRIES", default_value_t = 10)]
    pub max_retries: u32,

    /// Timeout for a single API request
    #[arg(long, env = "REQUEST_TIMEOUT", value_parser = humantime::parse_duration, default_value = "30s")]
    pub request_timeout: Duration,

    /// Output logs in JSON format
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

/// Which topology tier to resize, and to what
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleTarget {
    pub tier: TopologyTier,
    pub resource: SizeResource,
    /// Error out when the plan has no element for `tier`
    pub require_tier: bool,
}

impl Default for ScaleTarget {
    fn default() -> Self {
        Self {
            tier: TopologyTier::HotContent,
            resource: SizeResource::Memory,
            require_tier: false,
        }
    }
}

impl ScaleTarget {
    pub fn size(&self, value: i32) -> TopologySize {
        TopologySize {
            resource: self.resource,
            value,
        }
    }
}

impl Config {
    /// Parse configuration from command-line args and environment variables
    pub fn parse_config() -> Self {
        Config::parse()
    }

    pub fn scale_target(&self) -> ScaleTarget {
        ScaleTarget {
            tier: self.tier,
            resource: self.resource,
            require_tier: self.require_tier,
        }
    }

    pub fn track_frequency(&self) -> TrackFrequency {
        TrackFrequency {
            poll_interval: self.poll_interval,
            max_retries: self.max_retries,
        }
    }
}
