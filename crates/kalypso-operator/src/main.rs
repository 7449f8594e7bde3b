//! Kalypso scheduler operator binary

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use kalypso_github::GitHubFactory;
use kalypso_operator::{crds, runner, Context};

/// Declarative workload scheduler and GitOps manifest compiler
#[derive(Debug, Parser)]
#[command(name = "kalypso-operator", version, about)]
struct Args {
    /// Path to a kubeconfig file; in-cluster config is used when omitted
    #[arg(long)]
    kubeconfig: Option<PathBuf>,
}

async fn create_client(kubeconfig: Option<&PathBuf>) -> Result<Client, Box<dyn std::error::Error>> {
    match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            let config =
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
            Ok(Client::try_from(config)?)
        }
        None => Ok(Client::try_default().await?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    kalypso_common::telemetry::init("kalypso-operator");

    let args = Args::parse();
    let client = create_client(args.kubeconfig.as_ref()).await?;

    crds::ensure_crds_installed(&client).await?;

    let ctx = Arc::new(Context::new(client.clone(), Arc::new(GitHubFactory)));
    runner::run_controllers(ctx).await;

    tracing::info!("kalypso operator shut down");
    Ok(())
}
