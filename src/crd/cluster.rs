//! VCDCluster Custom Resource Definition
//!
//! Mirror of the cluster-api provider's VCDCluster resource, reduced to the
//! fields the cleanup engine consumes. The provider owns the CRD; we never
//! install or mutate it beyond the finalizer list.

use kube::CustomResource;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{LoadBalancerConfig, UserCredentialsContext};
use crate::error::Error;
use crate::PAUSED_ANNOTATION;

/// Specification for a VCDCluster
///
/// Addressing fields (`site`, `org`, `ovdc`, `ovdc_network`, VIP subnet)
/// locate the cluster's edge gateway and catalogs in Cloud Director;
/// `user_credentials_context` locates the API credentials.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "VCDCluster",
    plural = "vcdclusters",
    status = "VcdClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VCDClusterSpec {
    /// Cloud Director endpoint URL
    #[serde(default)]
    pub site: String,

    /// Organization the cluster is provisioned in
    #[serde(default)]
    pub org: String,

    /// Organization virtual data center
    #[serde(default)]
    pub ovdc: String,

    /// Routed network the cluster's gateway is attached to
    #[serde(default)]
    pub ovdc_network: String,

    /// Load balancer configuration
    #[serde(default)]
    pub load_balancer_config_spec: LoadBalancerConfig,

    /// Credentials used to build the Cloud Director session
    #[serde(default)]
    pub user_credentials_context: UserCredentialsContext,
}

/// Status for a VCDCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VcdClusterStatus {
    /// Stable identifier assigned once provisioning completes.
    ///
    /// The provisioning layer embeds this in the name of every Cloud
    /// Director resource it creates, which is what ownership matching
    /// keys on during cleanup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_id: Option<String>,

    /// Organization recorded by the provisioner (used for org-scoped listings)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

impl VCDCluster {
    /// Return the cluster's infraId, failing if it is not populated yet.
    ///
    /// An empty infraId would turn substring ownership matching into
    /// match-everything, so callers must treat this as a hard precondition.
    pub fn infra_id(&self) -> Result<&str, Error> {
        self.status
            .as_ref()
            .and_then(|s| s.infra_id.as_deref())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::precondition(format!(
                    ".status.infraId is not populated on the cluster: {}",
                    self.name_any()
                ))
            })
    }

    /// Organization name as recorded in status, falling back to the spec
    pub fn org_name(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.org.as_deref())
            .filter(|o| !o.is_empty())
            .unwrap_or(&self.spec.org)
    }

    /// Returns true if reconciliation of this cluster is paused
    pub fn is_paused(&self) -> bool {
        self.annotations().contains_key(PAUSED_ANNOTATION)
    }
}
