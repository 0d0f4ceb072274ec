//! Reconcile keys and the two-phase lifecycle of a BridgeService
//!
//! A BridgeService is either `Active` (no deletion timestamp) or `Terminating`.
//! Within each phase the only thing that matters is whether our finalizer is
//! present. The transitions driven by the reconciler are:
//!
//! - `Active { finalizer_registered: false }` → register finalizer → `Active { true }`
//! - `Active { true }` → construct, create-if-absent, publish status (stays)
//! - `Terminating { finalizer_present: true }` → delete managed Service, remove finalizer
//!   → `Terminating { false }`
//! - `Terminating { false }` → terminal; the store removes the object once every
//!   other finalizer is gone

use std::fmt;

use kube::ResourceExt;

use boardingbridge_common::crd::BridgeService;
use boardingbridge_common::{Error, Finalizers, BRIDGE_FINALIZER};

/// Namespaced identity of a BridgeService (and of its managed Service)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Namespace of both records
    pub namespace: String,
    /// Name of both records
    pub name: String,
}

impl ObjectKey {
    /// Create a key from its parts
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a BridgeService delivered by the watcher
    pub fn for_resource(bridge: &BridgeService) -> Result<Self, Error> {
        let name = bridge.name_any();
        let namespace = bridge.namespace().ok_or_else(|| {
            Error::validation_for_field(&name, "metadata.namespace", "BridgeService must be namespaced")
        })?;
        Ok(Self::new(namespace, name))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Lifecycle state of a BridgeService as seen by the reconciler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// No deletion requested
    Active {
        /// Our finalizer is already on the object
        finalizer_registered: bool,
    },
    /// Deletion timestamp is set
    Terminating {
        /// Our finalizer still blocks physical deletion
        finalizer_present: bool,
    },
}

impl Lifecycle {
    /// Classify a BridgeService from its metadata
    pub fn of(bridge: &BridgeService) -> Self {
        let has_finalizer = Finalizers::from_meta(&bridge.metadata).contains(BRIDGE_FINALIZER);
        if bridge.metadata.deletion_timestamp.is_some() {
            Self::Terminating {
                finalizer_present: has_finalizer,
            }
        } else {
            Self::Active {
                finalizer_registered: has_finalizer,
            }
        }
    }
}
