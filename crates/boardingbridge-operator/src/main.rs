//! boardingbridge - keeps a core Service in step with each BridgeService

use clap::Parser;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, CustomResourceExt};

use boardingbridge_common::crd::BridgeService;
use boardingbridge_common::telemetry::{init_telemetry, TelemetryConfig};
use boardingbridge_operator::{build_bridge_controller, ControllerArgs, ControllerConfig};

/// boardingbridge - manages a core Service for every BridgeService
#[derive(Parser, Debug)]
#[command(name = "boardingbridge", version, about, long_about = None)]
struct Cli {
    /// Print the BridgeService CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    controller: ControllerArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install rustls crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&BridgeService::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let telemetry = init_telemetry(&TelemetryConfig::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let result = run_controller(cli.controller).await;
    telemetry.shutdown();
    result
}

/// Install or update the BridgeService CRD with server-side apply
async fn ensure_crd_installed(client: &Client, field_manager: &str) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(field_manager).force();

    tracing::info!("Installing BridgeService CRD...");
    crds.patch(
        BridgeService::crd_name(),
        &params,
        &Patch::Apply(&BridgeService::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install BridgeService CRD: {}", e))?;

    Ok(())
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let config = ControllerConfig::try_from(args)?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if config.install_crd {
        ensure_crd_installed(&client, &config.field_manager).await?;
    }

    tracing::info!(
        field_manager = %config.field_manager,
        namespace = config.namespace.as_deref().unwrap_or("*"),
        ingress_address = config.ingress_address.as_deref().unwrap_or("<cluster IP>"),
        "Starting boardingbridge controller"
    );

    build_bridge_controller(client, &config).await;

    tracing::info!("Controller stopped");
    Ok(())
}
