//! Named disk (volume) cleanup
//!
//! Unlike the other cleaners, volumes are matched by a description field
//! equal to the infraId: the CSI driver stamps the cluster identifier into
//! the disk description rather than its name. A disk must be detached from
//! every compute instance before the API accepts the delete.

use async_trait::async_trait;
use tracing::info;

use super::Cleaner;
use crate::crd::VCDCluster;
use crate::error::Error;
use crate::vcd::{DiskRecord, VcdSession};

/// Deletes named disks whose description equals the cluster's infraId
pub struct VolumeCleaner;

impl VolumeCleaner {
    async fn detach_from_all_vms(
        &self,
        session: &dyn VcdSession,
        disk: &DiskRecord,
    ) -> Result<(), Error> {
        for vm in session.attached_vms(disk).await? {
            info!(disk = %disk.name, vm = %vm.name, "detaching disk");
            session.detach_disk(&vm, disk).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Cleaner for VolumeCleaner {
    fn name(&self) -> &'static str {
        "VolumeCleaner"
    }

    async fn clean(
        &self,
        session: &dyn VcdSession,
        cluster: &VCDCluster,
    ) -> Result<bool, Error> {
        let infra_id = cluster.infra_id()?;

        // The query endpoint pages by number, not cursor.
        let mut disks = Vec::new();
        let mut page = 1;
        loop {
            let result = session.disk_records_by_description(infra_id, page).await?;
            disks.extend(result.records);
            if !result.has_next {
                break;
            }
            page += 1;
        }

        if !disks.is_empty() {
            info!(count = disks.len(), "disks will be deleted");
        }

        for disk in &disks {
            self.detach_from_all_vms(session, disk).await?;
            info!(disk = %disk.name, "deleting disk");
            session.delete_disk(disk).await?;
        }

        Ok(false)
    }
}
