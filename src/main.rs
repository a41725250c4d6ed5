//! cluster-api cleaner for VMware Cloud Director

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use capi_cleaner_vcd::controller::{error_policy, reconcile, Context};
use capi_cleaner_vcd::crd::VCDCluster;

/// Cleanup controller removing Cloud Director resources left behind by
/// deleted VCDClusters
#[derive(Parser, Debug)]
#[command(name = "capi-cleaner-vcd", version, about, long_about = None)]
struct Cli {
    /// Print the VCDCluster CRD manifest and exit
    ///
    /// The cluster-api provider normally owns this CRD; the flag exists for
    /// standalone test environments.
    #[arg(long)]
    crd: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&VCDCluster::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    run_controller().await
}

/// Run the VCDCluster controller until shutdown
async fn run_controller() -> anyhow::Result<()> {
    tracing::info!("cleaner controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let ctx = Arc::new(Context::builder(client.clone()).build());

    let clusters: Api<VCDCluster> = Api::all(client);

    Controller::new(clusters, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("cleaner controller shutting down");
    Ok(())
}
