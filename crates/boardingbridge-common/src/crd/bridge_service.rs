//! BridgeService Custom Resource Definition
//!
//! A BridgeService declares a core Kubernetes Service that the controller
//! creates, keeps in shape, and tears down on behalf of the user. The managed
//! Service lives in the same namespace, carries the same name, and points back
//! at its BridgeService through a controller owner reference.

use std::collections::{BTreeMap, BTreeSet};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// BridgeService declares the Service the controller manages.
///
/// Example:
/// ```yaml
/// apiVersion: boardingbridge.dev/v1alpha1
/// kind: BridgeService
/// metadata:
///   name: foo
///   namespace: ns
/// spec:
///   type: ClusterIP
///   ports:
///     - name: http
///       protocol: TCP
///       port: 8080
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "boardingbridge.dev",
    version = "v1alpha1",
    kind = "BridgeService",
    namespaced,
    status = "BridgeServiceStatus",
    shortname = "bsvc",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Address","type":"string","jsonPath":".status.address"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BridgeServiceSpec {
    /// Service type of the managed Service
    #[serde(default, rename = "type")]
    pub type_: BridgeServiceType,

    /// Ports exposed by the managed Service
    #[serde(default = "default_ports")]
    pub ports: Vec<BridgePort>,

    /// Pod selector copied onto the managed Service
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
}

impl Default for BridgeServiceSpec {
    fn default() -> Self {
        Self {
            type_: BridgeServiceType::default(),
            ports: default_ports(),
            selector: BTreeMap::new(),
        }
    }
}

/// The port template used when a BridgeService doesn't list any ports
fn default_ports() -> Vec<BridgePort> {
    vec![BridgePort {
        name: Some("test".to_string()),
        protocol: PortProtocol::Tcp,
        port: 8080,
        target_port: None,
    }]
}

impl BridgeServiceSpec {
    /// Validate the spec well enough that the managed Service is accepted by
    /// the API server.
    ///
    /// `resource` is the namespaced name used in error messages.
    pub fn validate(&self, resource: &str) -> Result<(), crate::Error> {
        if self.ports.is_empty() {
            return Err(crate::Error::validation_for_field(
                resource,
                "spec.ports",
                "at least one port is required",
            ));
        }

        let multi_port = self.ports.len() > 1;
        let mut names = BTreeSet::new();
        let mut endpoints = BTreeSet::new();

        for (i, port) in self.ports.iter().enumerate() {
            let field = format!("spec.ports[{}]", i);

            if !(1..=65535).contains(&port.port) {
                return Err(crate::Error::validation_for_field(
                    resource,
                    format!("{}.port", field),
                    format!("port {} is out of range 1-65535", port.port),
                ));
            }

            if let Some(target) = port.target_port {
                if !(1..=65535).contains(&target) {
                    return Err(crate::Error::validation_for_field(
                        resource,
                        format!("{}.targetPort", field),
                        format!("targetPort {} is out of range 1-65535", target),
                    ));
                }
            }

            match port.name.as_deref() {
                Some(name) => {
                    if !names.insert(name) {
                        return Err(crate::Error::validation_for_field(
                            resource,
                            format!("{}.name", field),
                            format!("duplicate port name '{}'", name),
                        ));
                    }
                }
                None if multi_port => {
                    return Err(crate::Error::validation_for_field(
                        resource,
                        format!("{}.name", field),
                        "ports must be named when more than one is declared",
                    ));
                }
                None => {}
            }

            if !endpoints.insert((port.port, port.protocol)) {
                return Err(crate::Error::validation_for_field(
                    resource,
                    field,
                    format!("duplicate port {}/{}", port.port, port.protocol.as_str()),
                ));
            }
        }

        Ok(())
    }
}

/// Service type of the managed Service
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum BridgeServiceType {
    /// Cluster-internal virtual IP
    #[default]
    #[serde(rename = "ClusterIP")]
    ClusterIp,
    /// Exposed on every node's IP at a static port
    NodePort,
    /// Exposed through a cloud load balancer
    LoadBalancer,
}

impl BridgeServiceType {
    /// The value Kubernetes expects in `Service.spec.type`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClusterIp => "ClusterIP",
            Self::NodePort => "NodePort",
            Self::LoadBalancer => "LoadBalancer",
        }
    }
}

/// A single port on the managed Service
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgePort {
    /// Port name (required when more than one port is declared)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Transport protocol
    #[serde(default)]
    pub protocol: PortProtocol,

    /// Port exposed by the Service
    pub port: i32,

    /// Port on the selected pods (defaults to `port`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<i32>,
}

/// Transport protocol for a port
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortProtocol {
    /// TCP
    #[default]
    Tcp,
    /// UDP
    Udp,
    /// SCTP
    Sctp,
}

impl PortProtocol {
    /// The value Kubernetes expects in `ServicePort.protocol`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
        }
    }
}

/// BridgeService phase
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum BridgeServicePhase {
    /// Not reconciled yet
    #[default]
    Pending,
    /// Managed Service exists and its address is published
    Ready,
    /// The most recent reconcile failed
    Failed,
}

/// Status for a BridgeService
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeServiceStatus {
    /// Current phase
    #[serde(default)]
    pub phase: BridgeServicePhase,

    /// Human-readable message about the current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Name of the managed Service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_service: Option<String>,

    /// Address published on the managed Service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Generation of the spec this status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions representing the BridgeService state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl BridgeServiceStatus {
    /// Create a new status with the given phase
    pub fn with_phase(phase: BridgeServicePhase) -> Self {
        Self {
            phase,
            ..Default::default()
        }
    }

    /// Set the message and return self for chaining
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Set the managed Service name and return self for chaining
    pub fn managed_service(mut self, name: impl Into<String>) -> Self {
        self.managed_service = Some(name.into());
        self
    }

    /// Set the published address and return self for chaining
    pub fn address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    /// Set the observed generation and return self for chaining
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Add a condition and return self for chaining
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.retain(|c| c.type_ != condition.type_);
        self.conditions.push(condition);
        self
    }

    /// Compare everything except conditions.
    ///
    /// Conditions carry a fresh `lastTransitionTime` on every build, so a full
    /// equality check would never match and every patch would look new.
    pub fn same_summary(&self, other: &Self) -> bool {
        self.phase == other.phase
            && self.message == other.message
            && self.managed_service == other.managed_service
            && self.address == other.address
            && self.observed_generation == other.observed_generation
    }
}
