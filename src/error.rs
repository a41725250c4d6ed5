//! Error types for the cleanup controller

use thiserror::Error;

/// Main error type for cleanup operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// HTTP transport error talking to Cloud Director
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A precondition for cleanup is not met yet (transient, requeue)
    #[error("precondition error: {0}")]
    Precondition(String),

    /// Credential lookup or session login failure
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Cloud Director API returned a failure
    #[error("cloud director error: {0}")]
    Vcd(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a precondition error with the given message
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a credentials error with the given message
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create a Cloud Director error with the given message
    pub fn vcd(msg: impl Into<String>) -> Self {
        Self::Vcd(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true if this error is transient and the pass should be
    /// requeued after the fixed cleanup backoff rather than the generic one.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: an unpopulated infraId blocks cleanup with a transient error
    ///
    /// Until the provisioning layer stamps .status.infraId, the cleaner
    /// cannot tell which Cloud Director objects belong to the cluster and
    /// must defer rather than guess.
    #[test]
    fn story_missing_infra_id_is_a_precondition_failure() {
        let err = Error::precondition(".status.infraId is not populated on the cluster: prod-1");
        assert!(err.is_precondition());
        assert!(err.to_string().contains("precondition error"));
        assert!(err.to_string().contains("prod-1"));
    }

    /// Story: Cloud Director failures surface verbatim
    ///
    /// List/delete/detach failures abort the whole pass; the message keeps
    /// enough context to identify the failing resource.
    #[test]
    fn story_vcd_errors_identify_the_failing_resource() {
        let err = Error::vcd("failed to delete load balancer pool lb-abc123-pool: 502 Bad Gateway");
        assert!(!err.is_precondition());
        assert!(err.to_string().contains("cloud director error"));
        assert!(err.to_string().contains("lb-abc123-pool"));
    }

    /// Story: credential errors name the secret that could not be read
    #[test]
    fn story_credential_errors_name_the_secret() {
        let err = Error::credentials("error getting secret [vcd-creds] in namespace [org-acme]");
        match err {
            Error::Credentials(msg) => assert!(msg.contains("vcd-creds")),
            _ => panic!("expected Credentials variant"),
        }
    }

    /// Story: constructor helpers accept both String and &str
    #[test]
    fn story_error_construction_ergonomics() {
        let cluster = "cl-9f2";
        let err = Error::precondition(format!("infraId empty on {}", cluster));
        assert!(err.to_string().contains("cl-9f2"));

        let err = Error::serialization("unparsable Link header");
        assert!(err.to_string().contains("serialization error"));
    }
}
