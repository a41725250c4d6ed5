//! Cloud Director API boundary
//!
//! The cleaners never talk HTTP directly; they go through the [`VcdSession`]
//! trait. The REST implementation lives in [`rest`], cursor pagination in
//! [`pagination`], and credential resolution in [`credentials`].

mod credentials;
mod pagination;
mod rest;
mod session;

pub use credentials::{credentials_for_cluster, UserCredentials};
pub use pagination::{list_all, next_cursor, PageResponse, PagedEndpoint};
pub use rest::{RestSession, RestSessionProvider};
pub use session::{
    DiskRecord, DiskRecordPage, GatewayRef, ResourceRecord, SessionProvider, VcdSession, VmRef,
};

#[cfg(test)]
pub use session::{MockSessionProvider, MockVcdSession};
