//! Session boundary for the Cloud Director API
//!
//! [`VcdSession`] is the single seam between the cleaners and the external
//! API. The production implementation is [`super::rest::RestSession`]; tests
//! use the generated mocks.

use std::sync::Arc;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::pagination::PageResponse;
use crate::crd::VCDCluster;
use crate::error::Error;

/// Handle to an edge gateway, resolved from the cluster's network addressing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayRef {
    /// Gateway identifier (URN)
    pub id: String,
    /// Gateway display name
    pub name: String,
}

/// A named external resource plus the handle used to delete it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Resource name; ownership matching substring-tests this against infraId
    pub name: String,
    /// Identifier used for the delete call
    pub id: String,
}

/// A named-disk query record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskRecord {
    /// Disk name (informational; ownership is matched on description)
    pub name: String,
    /// Entity href used for attachment lookup, detach and delete
    pub href: String,
}

/// One page of disk query records
///
/// The legacy query endpoint pages by number, not cursor; `has_next` reports
/// whether the response carried a `nextPage` link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiskRecordPage {
    /// Records on this page
    pub records: Vec<DiskRecord>,
    /// True if a further page exists
    pub has_next: bool,
}

/// Reference to a compute instance a disk is attached to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmRef {
    /// VM name
    pub name: String,
    /// VM entity href
    pub href: String,
}

/// Authenticated Cloud Director API session
///
/// Implementations treat deleting an object the API reports as missing as
/// success, so callers never special-case not-found.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VcdSession: Send + Sync {
    /// Resolve the edge gateway attached to the given routed network
    async fn gateway(&self, network: &str, vip_subnet: &str) -> Result<GatewayRef, Error>;

    /// List all load balancer pools on the gateway
    async fn list_lb_pools(&self, gateway: &GatewayRef) -> Result<Vec<ResourceRecord>, Error>;

    /// Delete one load balancer pool
    async fn delete_lb_pool(&self, pool: &ResourceRecord) -> Result<(), Error>;

    /// List all virtual services on the gateway
    async fn list_virtual_services(
        &self,
        gateway: &GatewayRef,
    ) -> Result<Vec<ResourceRecord>, Error>;

    /// Delete one virtual service
    async fn delete_virtual_service(&self, service: &ResourceRecord) -> Result<(), Error>;

    /// Fetch one cursor-page of NAT rules on the gateway
    async fn nat_rules_page(
        &self,
        gateway: &GatewayRef,
        page_size: u32,
        cursor: Option<String>,
    ) -> Result<PageResponse<ResourceRecord>, Error>;

    /// Delete one NAT rule
    async fn delete_nat_rule(
        &self,
        gateway: &GatewayRef,
        rule: &ResourceRecord,
    ) -> Result<(), Error>;

    /// List tenant-scoped application port profiles in the organization
    async fn list_app_port_profiles(&self, org: &str) -> Result<Vec<ResourceRecord>, Error>;

    /// Delete one application port profile
    async fn delete_app_port_profile(&self, profile: &ResourceRecord) -> Result<(), Error>;

    /// Query one page of named-disk records whose description equals `description`
    async fn disk_records_by_description(
        &self,
        description: &str,
        page: u32,
    ) -> Result<DiskRecordPage, Error>;

    /// List compute instances the disk is currently attached to
    async fn attached_vms(&self, disk: &DiskRecord) -> Result<Vec<VmRef>, Error>;

    /// Detach the disk from one compute instance and wait for completion
    async fn detach_disk(&self, vm: &VmRef, disk: &DiskRecord) -> Result<(), Error>;

    /// Delete the disk and wait for completion
    async fn delete_disk(&self, disk: &DiskRecord) -> Result<(), Error>;
}

/// Builds an authenticated [`VcdSession`] for a cluster
///
/// A fresh session is constructed per reconciliation pass, so every pass
/// starts with freshly-resolved credentials and a fresh bearer token.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve credentials and log in to the cluster's Cloud Director site
    async fn session(&self, cluster: &VCDCluster) -> Result<Arc<dyn VcdSession>, Error>;
}
