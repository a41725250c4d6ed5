//! Custom Resource Definitions consumed by the cleanup controller
//!
//! The VCDCluster CRD is owned by the cluster-api provider; this controller
//! only reads it (and patches its finalizer list), so the types here mirror
//! the fields the cleanup engine needs and nothing more.

mod cluster;
mod types;

pub use cluster::{VCDCluster, VCDClusterSpec, VcdClusterStatus};
pub use types::{LoadBalancerConfig, SecretRef, UserCredentialsContext};
