//! DNAT rule cleanup
//!
//! NAT rule listings can span many cursor pages, so matching rules are
//! collected across the full enumeration first and deleted afterwards;
//! deleting while paging invalidates the server-side cursor.

use async_trait::async_trait;
use tracing::info;

use super::Cleaner;
use crate::crd::VCDCluster;
use crate::error::Error;
use crate::vcd::{list_all, GatewayRef, PageResponse, PagedEndpoint, ResourceRecord, VcdSession};
use crate::DEFAULT_PAGE_SIZE;

/// Deletes DNAT rules whose name contains the cluster's infraId
pub struct DnatCleaner;

/// Adapter exposing the gateway's NAT rule listing as a paged endpoint
struct NatRulesEndpoint<'a> {
    session: &'a dyn VcdSession,
    gateway: &'a GatewayRef,
}

#[async_trait]
impl PagedEndpoint for NatRulesEndpoint<'_> {
    type Item = ResourceRecord;

    async fn fetch(
        &self,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<PageResponse<ResourceRecord>, Error> {
        self.session
            .nat_rules_page(self.gateway, page_size, cursor.map(str::to_string))
            .await
    }
}

#[async_trait]
impl Cleaner for DnatCleaner {
    fn name(&self) -> &'static str {
        "DnatCleaner"
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

        let endpoint = NatRulesEndpoint {
            session,
            gateway: &gateway,
        };
        let rules = list_all(&endpoint, DEFAULT_PAGE_SIZE).await?;

        let to_delete: Vec<_> = rules
            .into_iter()
            .filter(|r| r.name.contains(infra_id))
            .collect();

        for rule in &to_delete {
            info!(rule = %rule.name, "deleting DNAT rule");
            session.delete_nat_rule(&gateway, rule).await?;
        }
        if !to_delete.is_empty() {
            info!(count = to_delete.len(), "DNAT rules deleted");
        }

        Ok(false)
    }
}
