//! `member-agent`: runs on each member cluster, watching `ServiceExport`
//! (C3, spec.md §4.2) against the member's own API server and mirroring into
//! `InternalServiceExport` on the hub, and `ServiceImport` (C4, spec.md
//! §4.5) mirroring hub-observed status back onto the member's own
//! `ServiceImport` objects. See `SPEC_FULL.md` §0 for why these two
//! reconcilers are grouped in this binary rather than `hub-agent`.

use std::{env, sync::Arc};

use fleet_networking::{
    context::{InternalServiceImportContext, ServiceExportContext},
    metrics::Metrics,
    metrics_server,
    reconcile::{internal_service_import, service_export},
    types::{ServiceExport, ServiceImport},
};
use futures_util::StreamExt;
use kube::{
    runtime::{
        controller::Controller,
        events::{Recorder, Reporter},
        watcher::Config,
    },
    Api, Client,
};
use tracing::{error, info};

const REPORTER: &str = "fleet-networking-member-agent";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let member_cluster_id =
        env::var("FLEET_MEMBER_CLUSTER_ID").map_err(|_| anyhow::anyhow!("FLEET_MEMBER_CLUSTER_ID must be set"))?;
    let hub_namespace =
        env::var("FLEET_HUB_NAMESPACE").map_err(|_| anyhow::anyhow!("FLEET_HUB_NAMESPACE must be set"))?;
    let traffic_manager_enabled = env::var("FLEET_ENABLE_TRAFFIC_MANAGER")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let default_resource_group = env::var("FLEET_TM_RESOURCE_GROUP").unwrap_or_default();

    let member_client = Client::try_default().await?;
    let hub_client = hub_client_from_env().await?;

    let public_ip_client: Option<Arc<dyn fleet_networking::cloud::PublicIpClient>> = if traffic_manager_enabled {
        let subscription_id = env::var("FLEET_TM_SUBSCRIPTION_ID")
            .map_err(|_| anyhow::anyhow!("FLEET_TM_SUBSCRIPTION_ID must be set when FLEET_ENABLE_TRAFFIC_MANAGER=true"))?;
        let bearer_token = env::var("FLEET_TM_BEARER_TOKEN")
            .map_err(|_| anyhow::anyhow!("FLEET_TM_BEARER_TOKEN must be set when FLEET_ENABLE_TRAFFIC_MANAGER=true"))?;
        let endpoint = env::var("FLEET_TM_CLOUD_ENDPOINT")
            .unwrap_or_else(|_| "https://management.azure.com".to_string());
        Some(Arc::new(fleet_networking::cloud::AzureTrafficManagerPublicIpClient::new(
            endpoint,
            subscription_id,
            bearer_token,
        )))
    } else {
        None
    };

    let metrics = Arc::new(Metrics::new());
    let metrics_port: u16 = env::var("FLEET_METRICS_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    metrics_server::spawn(metrics.clone(), metrics_port);

    let reporter: Reporter = REPORTER.into();
    let service_export_recorder = Recorder::new(hub_client.clone(), reporter.clone());
    let internal_import_recorder = Recorder::new(hub_client.clone(), reporter);

    let service_export_ctx = Arc::new(ServiceExportContext {
        member_client: member_client.clone(),
        hub_client: hub_client.clone(),
        hub_namespace: hub_namespace.clone(),
        recorder: service_export_recorder,
        traffic_manager_enabled,
        public_ip_client,
        default_resource_group,
    });
    let internal_import_ctx = Arc::new(InternalServiceImportContext {
        hub_client: hub_client.clone(),
        member_client: member_client.clone(),
        recorder: internal_import_recorder,
    });

    info!(member_cluster_id, "starting member-agent");

    let exports: Api<ServiceExport> = Api::all(member_client.clone());
    let service_export_controller = Controller::new(exports, Config::default())
        .run(service_export::reconcile, service_export::error_policy, service_export_ctx)
        .for_each(|res| async move {
            match res {
                Ok((objref, _)) => info!(name = %objref.name, "reconciled ServiceExport"),
                Err(err) => error!(error = %err, "ServiceExport reconcile failed"),
            }
        });

    let imports: Api<ServiceImport> = Api::namespaced(hub_client.clone(), &hub_namespace);
    let internal_import_controller = Controller::new(imports, Config::default())
        .run(internal_service_import::reconcile, internal_service_import::error_policy, internal_import_ctx)
        .for_each(|res| async move {
            match res {
                Ok((objref, _)) => info!(name = %objref.name, "reconciled ServiceImport"),
                Err(err) => error!(error = %err, "ServiceImport reconcile failed"),
            }
        });

    tokio::join!(service_export_controller, internal_import_controller);
    Ok(())
}

async fn hub_client_from_env() -> anyhow::Result<Client> {
    use kube::config::{KubeConfigOptions, Kubeconfig};
    let path = env::var("KUBECONFIG_HUB").map_err(|_| anyhow::anyhow!("KUBECONFIG_HUB must be set"))?;
    let kubeconfig = Kubeconfig::read_from(&path)?;
    let config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    Ok(Client::try_from(config)?)
}
