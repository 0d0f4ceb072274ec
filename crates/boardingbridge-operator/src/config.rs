//! Controller configuration from flags and environment

use std::time::Duration;

use clap::Args;

use boardingbridge_common::retry::RetryConfig;
use boardingbridge_common::{Error, DEFAULT_FIELD_MANAGER};

/// Watches must close before kube's client read timeout (295s) fires
pub const MAX_WATCH_TIMEOUT_SECS: u32 = 290;

const CONFIG_RESOURCE: &str = "controller config";

/// Flags for the controller subcommand
#[derive(Args, Debug, Clone)]
pub struct ControllerArgs {
    /// Install or update the BridgeService CRD on startup
    #[arg(long, env = "BRIDGE_INSTALL_CRD")]
    pub install_crd: bool,

    /// Only watch this namespace (defaults to all namespaces)
    #[arg(long, env = "BRIDGE_WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Address published on every managed Service instead of its cluster IP
    #[arg(long, env = "BRIDGE_INGRESS_ADDRESS")]
    pub ingress_address: Option<String>,

    /// Field manager and event reporter name
    #[arg(long, env = "BRIDGE_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// Server-side watch timeout
    #[arg(long, default_value_t = 25)]
    pub watch_timeout_secs: u32,

    /// Requeue delay after the first consecutive failure
    #[arg(long, default_value_t = 5)]
    pub backoff_base_secs: u64,

    /// Upper bound on the requeue delay
    #[arg(long, default_value_t = 300)]
    pub backoff_max_secs: u64,
}

/// Validated controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Install the CRD before starting
    pub install_crd: bool,
    /// Namespace to watch, or all namespaces
    pub namespace: Option<String>,
    /// Address to publish on managed Services
    pub ingress_address: Option<String>,
    /// Field manager and event reporter name
    pub field_manager: String,
    /// Server-side watch timeout in seconds
    pub watch_timeout_secs: u32,
    /// Requeue backoff
    pub retry: RetryConfig,
}

impl TryFrom<ControllerArgs> for ControllerConfig {
    type Error = Error;

    fn try_from(args: ControllerArgs) -> Result<Self, Error> {
        let field_manager = args.field_manager.trim().to_string();
        if field_manager.is_empty() {
            return Err(Error::validation_for_field(
                CONFIG_RESOURCE,
                "--field-manager",
                "must not be empty",
            ));
        }

        if args.watch_timeout_secs == 0 || args.watch_timeout_secs > MAX_WATCH_TIMEOUT_SECS {
            return Err(Error::validation_for_field(
                CONFIG_RESOURCE,
                "--watch-timeout-secs",
                format!(
                    "must be between 1 and {}, got {}",
                    MAX_WATCH_TIMEOUT_SECS, args.watch_timeout_secs
                ),
            ));
        }

        if args.backoff_base_secs == 0 {
            return Err(Error::validation_for_field(
                CONFIG_RESOURCE,
                "--backoff-base-secs",
                "must be greater than zero",
            ));
        }
        if args.backoff_max_secs < args.backoff_base_secs {
            return Err(Error::validation_for_field(
                CONFIG_RESOURCE,
                "--backoff-max-secs",
                format!(
                    "must be at least --backoff-base-secs ({})",
                    args.backoff_base_secs
                ),
            ));
        }

        let namespace = non_empty(args.namespace);
        let ingress_address = non_empty(args.ingress_address);
        if let Some(address) = &ingress_address {
            if address.chars().any(char::is_whitespace) {
                return Err(Error::validation_for_field(
                    CONFIG_RESOURCE,
                    "--ingress-address",
                    format!("'{}' is not an IP address or hostname", address),
                ));
            }
        }

        Ok(Self {
            install_crd: args.install_crd,
            namespace,
            ingress_address,
            field_manager,
            watch_timeout_secs: args.watch_timeout_secs,
            retry: RetryConfig {
                initial_delay: Duration::from_secs(args.backoff_base_secs),
                max_delay: Duration::from_secs(args.backoff_max_secs),
                ..Default::default()
            },
        })
    }
}

// Empty env vars are common in manifests; treat them as unset
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
