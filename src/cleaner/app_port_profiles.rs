//! Application port profile cleanup

use async_trait::async_trait;
use tracing::info;

use super::Cleaner;
use crate::crd::VCDCluster;
use crate::error::Error;
use crate::vcd::VcdSession;

/// Deletes tenant-scoped application port profiles whose name contains the
/// cluster's infraId
pub struct AppPortProfileCleaner;

#[async_trait]
impl Cleaner for AppPortProfileCleaner {
    fn name(&self) -> &'static str {
        "AppPortProfileCleaner"
    }

    async fn clean(
        &self,
        session: &dyn VcdSession,
        cluster: &VCDCluster,
    ) -> Result<bool, Error> {
        let infra_id = cluster.infra_id()?;
        let profiles = session.list_app_port_profiles(cluster.org_name()).await?;

        let mut deleted = 0;
        for profile in profiles.iter().filter(|p| p.name.contains(infra_id)) {
            info!(profile = %profile.name, "deleting app port profile");
            session.delete_app_port_profile(profile).await?;
            deleted += 1;
        }
        if deleted > 0 {
            info!(count = deleted, "app port profiles deleted");
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::cluster_fixture;
    use super::*;
    use crate::vcd::{MockVcdSession, ResourceRecord};
    use mockall::predicate::eq;

    /// Story: the org-scoped listing uses the organization recorded in status
    #[tokio::test]
    async fn story_lists_profiles_in_the_status_org() {
        let mut session = MockVcdSession::new();
        session
            .expect_list_app_port_profiles()
            .with(eq("acme"))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    ResourceRecord {
                        name: "appPort-cl-9f2-6443".into(),
                        id: "urn:app:1".into(),
                    },
                    ResourceRecord {
                        name: "appPort-unrelated".into(),
                        id: "urn:app:2".into(),
                    },
                ])
            });
        session
            .expect_delete_app_port_profile()
            .withf(|p| p.name == "appPort-cl-9f2-6443")
            .times(1)
            .returning(|_| Ok(()));

        let requeue = AppPortProfileCleaner
            .clean(&session, &cluster_fixture("cl-9f2"))
            .await
            .unwrap();
        assert!(!requeue);
    }

    /// Story: calling twice against an empty catalog is safe
    #[tokio::test]
    async fn story_idempotent_on_empty_catalog() {
        let mut session = MockVcdSession::new();
        session
            .expect_list_app_port_profiles()
            .times(2)
            .returning(|_| Ok(vec![]));
        session.expect_delete_app_port_profile().never();

        let cluster = cluster_fixture("cl-9f2");
        for _ in 0..2 {
            let requeue = AppPortProfileCleaner
                .clean(&session, &cluster)
                .await
                .unwrap();
            assert!(!requeue);
        }
    }
}
