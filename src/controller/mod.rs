//! Kubernetes controller reconciliation logic

mod cluster;

pub use cluster::{
    error_policy, reconcile, ClusterApi, Context, ContextBuilder, KubeClusterApi,
    CLEANUP_REQUEUE_INTERVAL,
};

#[cfg(test)]
pub use cluster::MockClusterApi;
