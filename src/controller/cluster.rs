//! VCDCluster reconciliation
//!
//! The reconciler is a small finalizer state machine. While a cluster is
//! alive, the only job is to keep the cleanup finalizer registered - it must
//! be durable before any delete intent arrives, or external resources could
//! be orphaned. Once the deletion timestamp is set, the cleaners run until
//! every one of them reports nothing left to do, and only then is the
//! finalizer released.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::cleaner::CleanupOrchestrator;
use crate::crd::VCDCluster;
use crate::vcd::{RestSessionProvider, SessionProvider};
use crate::{Error, CAPI_CLUSTER_LABEL_KEY, CLEANER_FINALIZER};

/// Fixed backoff requested while cleanup is incomplete or blocked on a
/// precondition
pub const CLEANUP_REQUEUE_INTERVAL: Duration = Duration::from_secs(10);

/// Trait abstracting the VCDCluster persistence operations the reconciler
/// needs, so tests can run without an API server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Persist a new finalizer list on the cluster
    async fn replace_finalizers(
        &self,
        cluster: &VCDCluster,
        finalizers: Vec<String>,
    ) -> Result<(), Error>;
}

/// Real implementation backed by the kube client
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    /// Create a new KubeClusterApi wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn replace_finalizers(
        &self,
        cluster: &VCDCluster,
        finalizers: Vec<String>,
    ) -> Result<(), Error> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<VCDCluster> = Api::namespaced(self.client.clone(), &namespace);

        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });

        api.patch(
            &cluster.name_any(),
            &PatchParams::apply("capi-cleaner-vcd"),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(())
    }
}

/// Controller context shared across all reconciliation calls
pub struct Context {
    /// VCDCluster persistence (trait object for testability)
    pub clusters: Arc<dyn ClusterApi>,
    /// Builds an authenticated Cloud Director session per pass
    pub sessions: Arc<dyn SessionProvider>,
    /// The ordered cleaner sequence
    pub orchestrator: CleanupOrchestrator,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }
}

/// Builder for [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    clusters: Option<Arc<dyn ClusterApi>>,
    sessions: Option<Arc<dyn SessionProvider>>,
    orchestrator: Option<CleanupOrchestrator>,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            clusters: None,
            sessions: None,
            orchestrator: None,
        }
    }

    /// Override the cluster persistence API (primarily for testing)
    pub fn cluster_api(mut self, clusters: Arc<dyn ClusterApi>) -> Self {
        self.clusters = Some(clusters);
        self
    }

    /// Override the session provider (primarily for testing)
    pub fn session_provider(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Override the cleaner sequence
    pub fn orchestrator(mut self, orchestrator: CleanupOrchestrator) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            clusters: self
                .clusters
                .unwrap_or_else(|| Arc::new(KubeClusterApi::new(self.client.clone()))),
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(RestSessionProvider::new(self.client.clone()))),
            orchestrator: self
                .orchestrator
                .unwrap_or_else(CleanupOrchestrator::with_default_cleaners),
        }
    }
}

/// Reconcile a VCDCluster
///
/// Dispatches on the deletion timestamp: live clusters only get the
/// finalizer registered, deleting clusters run the cleanup orchestrator.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<VCDCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    if cluster.is_paused() {
        info!("cluster is marked as paused, won't reconcile");
        return Ok(Action::await_change());
    }

    if cluster.metadata.deletion_timestamp.is_some() {
        reconcile_delete(&cluster, &ctx).await
    } else {
        reconcile_normal(&cluster, &ctx).await
    }
}

/// Normal path: make sure the finalizer is registered and persisted.
///
/// Registration happens before anything else so a later delete intent can
/// never be processed without cleanup getting its turn.
async fn reconcile_normal(cluster: &VCDCluster, ctx: &Context) -> Result<Action, Error> {
    if !has_cleaner_finalizer(cluster) {
        info!("registering cleanup finalizer");
        let mut finalizers = cluster.finalizers().to_vec();
        finalizers.push(CLEANER_FINALIZER.to_string());
        ctx.clusters.replace_finalizers(cluster, finalizers).await?;
    }

    Ok(Action::await_change())
}

/// Delete path: run cleanup to completion, then release the finalizer
async fn reconcile_delete(cluster: &VCDCluster, ctx: &Context) -> Result<Action, Error> {
    if !has_cleaner_finalizer(cluster) {
        // finalizer may have been removed manually; nothing to gate on
        return Ok(Action::await_change());
    }

    let Some(cluster_name) = cluster.labels().get(CAPI_CLUSTER_LABEL_KEY) else {
        warn!(
            expected_label = CAPI_CLUSTER_LABEL_KEY,
            "cluster doesn't have the necessary label, cannot clean up"
        );
        return Ok(Action::await_change());
    };

    // Fails with a precondition error until provisioning has stamped the
    // identifier; error_policy turns that into the fixed requeue.
    cluster.infra_id()?;

    let session = ctx.sessions.session(cluster).await?;

    info!(cluster = %cluster_name, "cleaning Cloud Director resources belonging to cluster");
    let requeue = ctx.orchestrator.run(session.as_ref(), cluster).await?;

    if requeue {
        info!("there is an ongoing clean-up process, requeueing");
        return Ok(Action::requeue(CLEANUP_REQUEUE_INTERVAL));
    }

    info!("clean-up is done, removing finalizer");
    let finalizers = cluster
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != CLEANER_FINALIZER)
        .cloned()
        .collect();
    ctx.clusters.replace_finalizers(cluster, finalizers).await?;

    Ok(Action::await_change())
}

fn has_cleaner_finalizer(cluster: &VCDCluster) -> bool {
    cluster.finalizers().iter().any(|f| f == CLEANER_FINALIZER)
}

/// Error policy for the controller
///
/// Every failure requests the fixed cleanup backoff; the finalizer stays in
/// place, so the deletion simply appears stuck until a later pass succeeds.
pub fn error_policy(cluster: Arc<VCDCluster>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_precondition() {
        warn!(
            cluster = %cluster.name_any(),
            error = %error,
            "cleanup blocked on a precondition, will retry"
        );
    } else {
        error!(
            cluster = %cluster.name_any(),
            error = %error,
            "reconciliation failed"
        );
    }
    Action::requeue(CLEANUP_REQUEUE_INTERVAL)
}
