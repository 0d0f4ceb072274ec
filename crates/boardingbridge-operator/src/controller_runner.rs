//! Controller runner - builds the BridgeService controller future
//!
//! Construction stays separate from `main` so the wiring can be reasoned
//! about without a running process.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use boardingbridge_common::crd::BridgeService;
use boardingbridge_common::{MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE};
use boardingbridge_controller::{error_policy, reconcile, BridgeContext};

use crate::config::ControllerConfig;

/// Label selector matching Services this controller creates
pub fn managed_service_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE)
}

/// Build the BridgeService controller future.
///
/// Watches BridgeServices and the Services they own, so that edits to or
/// deletion of a managed Service wake up its BridgeService. Runs until
/// SIGTERM or SIGINT.
pub fn build_bridge_controller(
    client: Client,
    config: &ControllerConfig,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let ctx = Arc::new(BridgeContext::from_client(
        client.clone(),
        &config.field_manager,
        config.ingress_address.clone(),
        config.retry.clone(),
    ));

    let (bridges, services): (Api<BridgeService>, Api<Service>) = match &config.namespace {
        Some(ns) => {
            tracing::info!(namespace = %ns, "- BridgeService controller (single namespace)");
            (
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client, ns),
            )
        }
        None => {
            tracing::info!("- BridgeService controller (all namespaces)");
            (Api::all(client.clone()), Api::all(client))
        }
    };

    let selector = managed_service_selector();
    Box::pin(
        Controller::new(
            bridges,
            WatcherConfig::default().timeout(config.watch_timeout_secs),
        )
        .owns(
            services,
            WatcherConfig::default()
                .labels(&selector)
                .timeout(config.watch_timeout_secs),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("BridgeService")),
    )
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
