//! `hub-agent`: runs once for the whole fleet, fanning out
//! `EndpointSliceExport` records into per-member `EndpointSliceImport`
//! copies (C5, spec.md §4.3) and, when enabled, programming an Azure
//! Traffic Manager profile per `TrafficManagerProfile` (C6, spec.md §4.4).

use std::{env, sync::Arc};

use fleet_networking::{
    cloud::{AzureTrafficManagerClient, TrafficManagerClient},
    context::{EndpointSliceExportContext, TrafficManagerProfileContext},
    crd,
    metrics::Metrics,
    metrics_server,
    reconcile::{endpointslice_export, traffic_manager_profile},
    types::{EndpointSliceExport, TrafficManagerProfile},
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

const REPORTER: &str = "fleet-networking-hub-agent";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    if env::var("PRINT_CRDS").is_ok() {
        return crd::print_crds();
    }

    let fleet_system_namespace =
        env::var("FLEET_SYSTEM_NAMESPACE").unwrap_or_else(|_| "fleet-system".to_string());
    let traffic_manager_enabled = env::var("FLEET_ENABLE_TRAFFIC_MANAGER")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let hub_client = Client::try_default().await?;
    let metrics = Arc::new(Metrics::new());
    let metrics_port: u16 = env::var("FLEET_METRICS_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    metrics_server::spawn(metrics.clone(), metrics_port);

    let reporter: Reporter = REPORTER.into();

    let endpointslice_ctx = Arc::new(EndpointSliceExportContext {
        hub_client: hub_client.clone(),
        recorder: Recorder::new(hub_client.clone(), reporter.clone()),
        fleet_system_namespace,
    });

    info!("starting hub-agent");

    let slices: Api<EndpointSliceExport> = Api::all(hub_client.clone());
    let endpointslice_controller = Controller::new(slices, Config::default())
        .run(endpointslice_export::reconcile, endpointslice_export::error_policy, endpointslice_ctx)
        .for_each(|res| async move {
            match res {
                Ok((objref, _)) => info!(name = %objref.name, "reconciled EndpointSliceExport"),
                Err(err) => error!(error = %err, "EndpointSliceExport reconcile failed"),
            }
        });

    if !traffic_manager_enabled {
        endpointslice_controller.await;
        return Ok(());
    }

    let subscription_id = env::var("FLEET_TM_SUBSCRIPTION_ID")
        .map_err(|_| anyhow::anyhow!("FLEET_TM_SUBSCRIPTION_ID must be set when FLEET_ENABLE_TRAFFIC_MANAGER=true"))?;
    let bearer_token = env::var("FLEET_TM_BEARER_TOKEN")
        .map_err(|_| anyhow::anyhow!("FLEET_TM_BEARER_TOKEN must be set when FLEET_ENABLE_TRAFFIC_MANAGER=true"))?;
    let endpoint = env::var("FLEET_TM_CLOUD_ENDPOINT").unwrap_or_else(|_| "https://management.azure.com".to_string());
    let cloud: Arc<dyn TrafficManagerClient> =
        Arc::new(AzureTrafficManagerClient::new(endpoint, subscription_id, bearer_token));

    let profile_ctx = Arc::new(TrafficManagerProfileContext {
        hub_client: hub_client.clone(),
        recorder: Recorder::new(hub_client.clone(), reporter),
        metrics,
        cloud,
    });

    let profiles: Api<TrafficManagerProfile> = Api::all(hub_client.clone());
    let profile_controller = Controller::new(profiles, Config::default())
        .run(traffic_manager_profile::reconcile, traffic_manager_profile::error_policy, profile_ctx)
        .for_each(|res| async move {
            match res {
                Ok((objref, _)) => info!(name = %objref.name, "reconciled TrafficManagerProfile"),
                Err(err) => error!(error = %err, "TrafficManagerProfile reconcile failed"),
            }
        });

    tokio::join!(endpointslice_controller, profile_controller);
    Ok(())
}
