//! Cleanup of Cloud Director resources belonging to a deleted cluster
//!
//! Each resource kind has its own [`Cleaner`]; the [`CleanupOrchestrator`]
//! runs them sequentially in a fixed order. Cleaners are idempotent: a pass
//! over an external state with no matching resources is a successful no-op,
//! which is what makes crash-and-retry reconciliation safe.

mod app_port_profiles;
mod dnats;
mod lb_pools;
mod virtual_services;
mod volumes;

pub use app_port_profiles::AppPortProfileCleaner;
pub use dnats::DnatCleaner;
pub use lb_pools::LbPoolCleaner;
pub use virtual_services::VirtualServiceCleaner;
pub use volumes::VolumeCleaner;

use async_trait::async_trait;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::crd::VCDCluster;
use crate::error::Error;
use crate::vcd::VcdSession;

/// Removes one kind of externally-provisioned resource for a cluster.
///
/// `clean` returns `true` when cleanup is incomplete and the pass should be
/// requeued; it returns an error to abort the whole pass. With no matching
/// resources left it returns `Ok(false)`, so repeated invocation after a
/// partial failure or crash is safe.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Cleaner: Send + Sync {
    /// Cleaner name for log context
    fn name(&self) -> &'static str;

    /// Delete every resource of this kind belonging to the cluster
    async fn clean(&self, session: &dyn VcdSession, cluster: &VCDCluster)
        -> Result<bool, Error>;
}

/// Runs an ordered sequence of cleaners to completion.
///
/// Execution is sequential: gateway-bound objects have ordering
/// dependencies, and a single cluster's cleanup is small enough that
/// parallelism would only multiply load on a rate-limited API.
pub struct CleanupOrchestrator {
    cleaners: Vec<Box<dyn Cleaner>>,
}

impl CleanupOrchestrator {
    /// Create an orchestrator running the given cleaners in order
    pub fn new(cleaners: Vec<Box<dyn Cleaner>>) -> Self {
        Self { cleaners }
    }

    /// The production cleaner set: volumes first, then gateway-bound
    /// objects, then the org catalog.
    pub fn with_default_cleaners() -> Self {
        Self::new(vec![
            Box::new(VolumeCleaner),
            Box::new(VirtualServiceCleaner),
            Box::new(LbPoolCleaner),
            Box::new(DnatCleaner),
            Box::new(AppPortProfileCleaner),
        ])
    }

    /// Run every cleaner sequentially.
    ///
    /// Returns `true` if any cleaner requested a requeue. The first error
    /// aborts the remaining sequence and is returned as-is; cleaners already
    /// run are not rolled back (their next invocation is a no-op).
    pub async fn run(
        &self,
        session: &dyn VcdSession,
        cluster: &VCDCluster,
    ) -> Result<bool, Error> {
        let mut requeue = false;
        for cleaner in &self.cleaners {
            debug!(cleaner = cleaner.name(), "running cleaner");
            requeue |= cleaner.clean(session, cluster).await?;
        }
        if requeue {
            info!("cleanup incomplete, another pass is needed");
        }
        Ok(requeue)
    }
}
