//! Supporting types for the VCDCluster CRD

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Load balancer configuration on the cluster's edge gateway
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerConfig {
    /// Subnet the gateway hands out virtual service IPs from
    #[serde(default)]
    pub vip_subnet: String,
}

/// Reference to a Secret holding Cloud Director credentials
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Secret name
    pub name: String,
    /// Secret namespace
    pub namespace: String,
}

/// Cloud Director user credentials, inline or via Secret reference
///
/// Values present in the referenced Secret override the inline values.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentialsContext {
    /// Username, inline
    #[serde(default)]
    pub username: String,

    /// Password, inline
    #[serde(default)]
    pub password: String,

    /// API refresh token, inline
    #[serde(default)]
    pub refresh_token: String,

    /// Secret holding `username`/`password`/`refreshToken` keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}
