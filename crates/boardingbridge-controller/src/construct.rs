//! Managed Service construction
//!
//! Everything here is pure: the same BridgeService always yields the same
//! Service, and nothing touches the API server. The reconciler compares the
//! result against the stored Service to decide whether to create, correct, or
//! leave it alone.

use std::collections::BTreeMap;
use std::net::IpAddr;

use k8s_openapi::api::core::v1::{
    LoadBalancerIngress, LoadBalancerStatus, Service, ServicePort, ServiceSpec, ServiceStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};

use boardingbridge_common::crd::BridgeService;
use boardingbridge_common::{
    Error, MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE, OWNER_LABEL_KEY,
};

/// Build the Service this BridgeService should own.
///
/// The Service shares the BridgeService's namespace and name, carries the
/// managed-by and owner labels, and has a single controller owner reference
/// pointing back at the BridgeService. Fails with [`Error::Construction`] if
/// the spec can't produce a Service the API server would accept, or if the
/// BridgeService has no UID yet.
pub fn build_managed_service(bridge: &BridgeService) -> Result<Service, Error> {
    let name = bridge.name_any();
    let namespace = bridge
        .namespace()
        .ok_or_else(|| Error::construction(&name, "BridgeService has no namespace"))?;
    let resource = format!("{}/{}", namespace, name);

    bridge.spec.validate(&resource).map_err(|e| match e {
        Error::Validation { message, field, .. } => Error::construction(
            &resource,
            match field {
                Some(field) => format!("{}: {}", field, message),
                None => message,
            },
        ),
        other => other,
    })?;

    let mut owner_ref = bridge
        .controller_owner_ref(&())
        .ok_or_else(|| Error::construction(&resource, "BridgeService has no UID yet"))?;
    owner_ref.block_owner_deletion = Some(true);

    let labels = BTreeMap::from([
        (
            MANAGED_BY_LABEL_KEY.to_string(),
            MANAGED_BY_LABEL_VALUE.to_string(),
        ),
        (OWNER_LABEL_KEY.to_string(), name.clone()),
    ]);

    let ports = bridge
        .spec
        .ports
        .iter()
        .map(|p| ServicePort {
            name: p.name.clone(),
            protocol: Some(p.protocol.as_str().to_string()),
            port: p.port,
            target_port: p.target_port.map(IntOrString::Int),
            ..Default::default()
        })
        .collect();

    let selector = (!bridge.spec.selector.is_empty()).then(|| bridge.spec.selector.clone());

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace),
            labels: Some(labels),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(bridge.spec.type_.as_str().to_string()),
            ports: Some(ports),
            selector,
            ..Default::default()
        }),
        status: None,
    })
}

/// Returns true if `service` carries an owner reference to this BridgeService's UID
pub fn is_owned_by(service: &Service, bridge: &BridgeService) -> bool {
    let Some(uid) = bridge.meta().uid.as_deref() else {
        return false;
    };
    service
        .owner_references()
        .iter()
        .any(|r| r.uid == uid && r.controller == Some(true))
}

/// Describe who owns a Service, for ownership conflict messages
pub fn owner_description(service: &Service) -> String {
    match service
        .owner_references()
        .iter()
        .find(|r| r.controller == Some(true))
    {
        Some(owner) => format!("controlled by {} {} ({})", owner.kind, owner.name, owner.uid),
        None => "Service has no controller owner".to_string(),
    }
}

/// Comparable projection of a port after API server defaulting
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PortShape {
    name: Option<String>,
    protocol: String,
    port: i32,
    target_port: Option<i32>,
}

impl PortShape {
    fn of(port: &ServicePort) -> Self {
        // Unset targetPort defaults to port; a named targetPort never matches ours
        let target_port = match &port.target_port {
            None => Some(port.port),
            Some(IntOrString::Int(n)) => Some(*n),
            Some(IntOrString::String(_)) => None,
        };
        Self {
            name: port.name.clone().filter(|n| !n.is_empty()),
            protocol: protocol(port).to_string(),
            port: port.port,
            target_port,
        }
    }
}

fn service_type(spec: &ServiceSpec) -> &str {
    spec.type_.as_deref().unwrap_or("ClusterIP")
}

fn port_shapes(spec: &ServiceSpec) -> Vec<PortShape> {
    let mut shapes: Vec<_> = spec.ports.iter().flatten().map(PortShape::of).collect();
    shapes.sort();
    shapes
}

fn selector(spec: &ServiceSpec) -> BTreeMap<String, String> {
    spec.selector.clone().unwrap_or_default()
}

/// Returns true if the stored Service no longer matches the desired shape.
///
/// Only the fields this controller sets are compared: type, ports and
/// selector. Server-assigned fields (clusterIP, nodePort, ...) are ignored.
pub fn spec_drifted(existing: &Service, desired: &Service) -> bool {
    let empty = ServiceSpec::default();
    let current = existing.spec.as_ref().unwrap_or(&empty);
    let wanted = desired.spec.as_ref().unwrap_or(&empty);

    service_type(current) != service_type(wanted)
        || port_shapes(current) != port_shapes(wanted)
        || selector(current) != selector(wanted)
}

/// Where the address for a stored Service comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressPlan {
    /// A load balancer controller already assigned this address; leave it be
    Adopt(String),
    /// Write this address into the Service's load balancer status
    Publish(String),
    /// No address is available yet
    Pending,
}

/// Decide which address a stored Service should advertise.
///
/// A LoadBalancer Service belongs to whichever controller provisions its
/// load balancer: an ingress it already reports is adopted as-is, and until
/// one shows up only a configured ingress address is published. Other types
/// publish the configured address, or else the cluster IP once assigned
/// (headless Services have none).
pub fn plan_address(ingress_address: Option<&str>, service: &Service) -> AddressPlan {
    let spec = service.spec.as_ref();
    let load_balancer = spec.map(service_type) == Some("LoadBalancer");

    if load_balancer {
        if let Some(address) = published_address(service) {
            return AddressPlan::Adopt(address);
        }
    }
    if let Some(address) = ingress_address {
        return AddressPlan::Publish(address.to_string());
    }
    if load_balancer {
        return AddressPlan::Pending;
    }

    spec.and_then(|s| s.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty() && *ip != "None")
        .map(|ip| AddressPlan::Publish(ip.to_string()))
        .unwrap_or(AddressPlan::Pending)
}

/// The full object to write back when a stored Service has drifted.
///
/// Starts from the stored copy so its identity, resourceVersion and
/// server-assigned fields (clusterIP, matching nodePorts) carry over, then
/// puts back our labels, type, ports and selector. Fields that are only
/// valid for a type the Service no longer has are cleared, otherwise the
/// API server rejects the update.
pub fn corrected_service(existing: &Service, desired: &Service) -> Service {
    let mut corrected = existing.clone();
    corrected.status = None;

    let labels = corrected.metadata.labels.get_or_insert_with(BTreeMap::new);
    labels.extend(desired.labels().clone());

    let wanted = desired.spec.clone().unwrap_or_default();
    let kind = service_type(&wanted).to_string();
    let spec = corrected.spec.get_or_insert_with(ServiceSpec::default);
    let previous = spec.ports.take().unwrap_or_default();

    spec.ports = wanted.ports.map(|ports| {
        ports
            .into_iter()
            .map(|mut port| {
                if kind != "ClusterIP" {
                    port.node_port = previous
                        .iter()
                        .find(|p| p.port == port.port && protocol(p) == protocol(&port))
                        .and_then(|p| p.node_port);
                }
                port
            })
            .collect()
    });
    spec.selector = wanted.selector;

    if kind != "LoadBalancer" {
        spec.load_balancer_ip = None;
        spec.load_balancer_class = None;
        spec.load_balancer_source_ranges = None;
        spec.allocate_load_balancer_node_ports = None;
        spec.health_check_node_port = None;
    }
    if kind == "ClusterIP" {
        spec.external_traffic_policy = None;
    }
    spec.type_ = Some(kind);

    corrected
}

fn protocol(port: &ServicePort) -> &str {
    port.protocol.as_deref().unwrap_or("TCP")
}

/// The address currently published in the Service's load balancer status
pub fn published_address(service: &Service) -> Option<String> {
    service
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .first()
        .and_then(|ingress| ingress.ip.clone().or_else(|| ingress.hostname.clone()))
}

/// Service status advertising `address` as the single load balancer ingress
pub fn load_balancer_status(address: &str) -> ServiceStatus {
    let ingress = if address.parse::<IpAddr>().is_ok() {
        LoadBalancerIngress {
            ip: Some(address.to_string()),
            ..Default::default()
        }
    } else {
        LoadBalancerIngress {
            hostname: Some(address.to_string()),
            ..Default::default()
        }
    };
    ServiceStatus {
        load_balancer: Some(LoadBalancerStatus {
            ingress: Some(vec![ingress]),
        }),
        ..Default::default()
    }
}
