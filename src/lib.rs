//! Cleanup controller for VCDCluster infrastructure resources
//!
//! When a cluster-api VCDCluster is deleted, resources that were provisioned
//! on its behalf in VMware Cloud Director (load-balancer pools, virtual
//! services, DNAT rules, application port profiles, named disks) are not
//! garbage-collected by anything else. This controller holds a finalizer on
//! every VCDCluster and, on deletion, removes those external resources before
//! releasing the finalizer.
//!
//! # Modules
//!
//! - [`crd`] - VCDCluster resource types
//! - [`controller`] - reconciliation logic (finalizer state machine)
//! - [`cleaner`] - per-resource-kind cleaners and the orchestrator
//! - [`vcd`] - Cloud Director API boundary (session trait, pagination, REST)
//! - [`error`] - error types

#![deny(missing_docs)]

pub mod cleaner;
pub mod controller;
pub mod crd;
pub mod error;
pub mod vcd;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Finalizer held on every VCDCluster until external cleanup completes
pub const CLEANER_FINALIZER: &str = "cluster-api-cleaner-cloud-director.finalizers.giantswarm.io";

/// Label carrying the owning cluster-api cluster name
pub const CAPI_CLUSTER_LABEL_KEY: &str = "cluster.x-k8s.io/cluster-name";

/// Annotation that pauses reconciliation of a resource
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";

/// Page size used for cursor-paged Cloud Director listings
pub const DEFAULT_PAGE_SIZE: u32 = 128;
