//! Load balancer pool cleanup

use async_trait::async_trait;
use tracing::info;

use super::Cleaner;
use crate::crd::VCDCluster;
use crate::error::Error;
use crate::vcd::VcdSession;

/// Deletes load balancer pools whose name contains the cluster's infraId
pub struct LbPoolCleaner;

#[async_trait]
impl Cleaner for LbPoolCleaner {
    fn name(&self) -> &'static str {
        "LbPoolCleaner"
    }

    async fn clean(
        &self,
        session: &dyn VcdSession,
        cluster: &VCDCluster,
    ) -> Result<bool, Error> {
        let infra_id = cluster.infra_id()?;
        let gateway = session
            .gateway(
                &cluster.spec.ovdc_network,
                &cluster.spec.load_balancer_config_spec.vip_subnet,
            )
            .await?;
        let pools = session.list_lb_pools(&gateway).await?;

        let mut deleted = 0;
        for pool in pools.iter().filter(|p| p.name.contains(infra_id)) {
            info!(pool = %pool.name, "deleting load balancer pool");
            session.delete_lb_pool(pool).await?;
            deleted += 1;
        }
        if deleted > 0 {
            info!(count = deleted, "load balancer pools deleted");
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::cluster_fixture;
    use super::*;
    use crate::vcd::{GatewayRef, MockVcdSession, ResourceRecord};
    use mockall::predicate::eq;

    fn gateway() -> GatewayRef {
        GatewayRef {
            id: "urn:vcloud:gateway:1".into(),
            name: "acme-gw".into(),
        }
    }

    fn record(name: &str) -> ResourceRecord {
        ResourceRecord {
            name: name.into(),
            id: format!("urn:vcloud:pool:{name}"),
        }
    }

    /// Story: only pools whose name contains the infraId are deleted
    ///
    /// `lb-abc123-pool` belongs to infraId `abc123`; `lb-abc124-pool`
    /// belongs to some other cluster and must survive.
    #[tokio::test]
    async fn story_substring_ownership_matching() {
        let mut session = MockVcdSession::new();
        session
            .expect_gateway()
            .times(1)
            .returning(|_, _| Ok(gateway()));
        session.expect_list_lb_pools().times(1).returning(|_| {
            Ok(vec![record("lb-abc123-pool"), record("lb-abc124-pool")])
        });
        session
            .expect_delete_lb_pool()
            .with(eq(record("lb-abc123-pool")))
            .times(1)
            .returning(|_| Ok(()));

        let requeue = LbPoolCleaner
            .clean(&session, &cluster_fixture("abc123"))
            .await
            .unwrap();
        assert!(!requeue);
    }

    /// Story: with nothing left to delete the cleaner is a repeatable no-op
    #[tokio::test]
    async fn story_idempotent_on_empty_external_state() {
        for _ in 0..2 {
            let mut session = MockVcdSession::new();
            session
                .expect_gateway()
                .times(1)
                .returning(|_, _| Ok(gateway()));
            session
                .expect_list_lb_pools()
                .times(1)
                .returning(|_| Ok(vec![]));
            session.expect_delete_lb_pool().never();

            let requeue = LbPoolCleaner
                .clean(&session, &cluster_fixture("abc123"))
                .await
                .unwrap();
            assert!(!requeue);
        }
    }

    /// Story: a delete failure aborts the cleaner with that error
    #[tokio::test]
    async fn story_delete_failure_aborts() {
        let mut session = MockVcdSession::new();
        session
            .expect_gateway()
            .times(1)
            .returning(|_, _| Ok(gateway()));
        session
            .expect_list_lb_pools()
            .times(1)
            .returning(|_| Ok(vec![record("lb-abc123-a"), record("lb-abc123-b")]));
        session
            .expect_delete_lb_pool()
            .times(1)
            .returning(|_| Err(Error::vcd("delete failed: 502")));

        let err = LbPoolCleaner
            .clean(&session, &cluster_fixture("abc123"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    /// An empty infraId must never reach the substring match
    #[tokio::test]
    async fn empty_infra_id_fails_before_listing() {
        let mut session = MockVcdSession::new();
        session.expect_gateway().never();
        session.expect_list_lb_pools().never();

        let err = LbPoolCleaner
            .clean(&session, &cluster_fixture(""))
            .await
            .unwrap_err();
        assert!(err.is_precondition());
    }
}
