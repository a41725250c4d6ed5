//! Credential resolution for Cloud Director sessions
//!
//! Credentials can be given inline on the VCDCluster spec or via a Secret
//! reference; Secret values win over inline values key by key.

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};

use crate::crd::VCDCluster;
use crate::error::Error;

/// Resolved Cloud Director user credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UserCredentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
    /// API refresh token; preferred over username/password when non-empty
    pub refresh_token: String,
}

// Credentials are deliberately opaque in logs and error output.
impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Resolve the credentials for a cluster, reading the referenced Secret if set
pub async fn credentials_for_cluster(
    client: &Client,
    cluster: &VCDCluster,
) -> Result<UserCredentials, Error> {
    let defined = &cluster.spec.user_credentials_context;
    let mut creds = UserCredentials {
        username: defined.username.clone(),
        password: defined.password.clone(),
        refresh_token: defined.refresh_token.clone(),
    };

    if let Some(secret_ref) = &defined.secret_ref {
        let api: Api<Secret> = Api::namespaced(client.clone(), &secret_ref.namespace);
        let secret = api.get(&secret_ref.name).await.map_err(|e| {
            Error::credentials(format!(
                "error getting secret [{}] in namespace [{}]: {}",
                secret_ref.name, secret_ref.namespace, e
            ))
        })?;
        apply_secret_overrides(&mut creds, &secret);
    }

    Ok(creds)
}

/// Overlay Secret data onto inline credentials, key by key.
///
/// Secret values created from files commonly carry a trailing newline;
/// it is stripped here so it never ends up inside a bearer token request.
fn apply_secret_overrides(creds: &mut UserCredentials, secret: &Secret) {
    let Some(data) = &secret.data else {
        return;
    };
    if let Some(b) = data.get("username") {
        creds.username = trim_secret_value(&b.0);
    }
    if let Some(b) = data.get("password") {
        creds.password = trim_secret_value(&b.0);
    }
    if let Some(b) = data.get("refreshToken") {
        creds.refresh_token = trim_secret_value(&b.0);
    }
}

fn trim_secret_value(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\n')
        .to_string()
}
