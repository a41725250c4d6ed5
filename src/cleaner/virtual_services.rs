//! Virtual service cleanup

use async_trait::async_trait;
use tracing::info;

use super::Cleaner;
use crate::crd::VCDCluster;
use crate::error::Error;
use crate::vcd::VcdSession;

/// Deletes virtual services whose name contains the cluster's infraId
pub struct VirtualServiceCleaner;

#[async_trait]
impl Cleaner for VirtualServiceCleaner {
    fn name(&self) -> &'static str {
        "VirtualServiceCleaner"
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
        let services = session.list_virtual_services(&gateway).await?;

        let mut deleted = 0;
        for service in services.iter().filter(|s| s.name.contains(infra_id)) {
            info!(service = %service.name, "deleting virtual service");
            session.delete_virtual_service(service).await?;
            deleted += 1;
        }
        if deleted > 0 {
            info!(count = deleted, "virtual services deleted");
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

    /// Story: every matching virtual service is deleted, others survive
    #[tokio::test]
    async fn story_deletes_all_matches() {
        let owned_a = ResourceRecord {
            name: "vs-cl-9f2-api".into(),
            id: "urn:vs:1".into(),
        };
        let owned_b = ResourceRecord {
            name: "ingress-vs-cl-9f2".into(),
            id: "urn:vs:2".into(),
        };
        let foreign = ResourceRecord {
            name: "vs-cl-other".into(),
            id: "urn:vs:3".into(),
        };

        let mut session = MockVcdSession::new();
        session
            .expect_gateway()
            .times(1)
            .returning(|_, _| Ok(gateway()));
        let services = vec![owned_a.clone(), foreign, owned_b.clone()];
        session
            .expect_list_virtual_services()
            .times(1)
            .return_once(move |_| Ok(services));
        session
            .expect_delete_virtual_service()
            .with(eq(owned_a))
            .times(1)
            .returning(|_| Ok(()));
        session
            .expect_delete_virtual_service()
            .with(eq(owned_b))
            .times(1)
            .returning(|_| Ok(()));

        let requeue = VirtualServiceCleaner
            .clean(&session, &cluster_fixture("cl-9f2"))
            .await
            .unwrap();
        assert!(!requeue);
    }

    /// Story: gateway lookup failure aborts before any listing
    #[tokio::test]
    async fn story_gateway_failure_propagates() {
        let mut session = MockVcdSession::new();
        session
            .expect_gateway()
            .times(1)
            .returning(|_, _| Err(Error::vcd("no edge gateway found for network [acme-net]")));
        session.expect_list_virtual_services().never();

        let err = VirtualServiceCleaner
            .clean(&session, &cluster_fixture("cl-9f2"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("acme-net"));
    }
}
