//! Custom Resource Definitions for boardingbridge
//!
//! This module contains the BridgeService CRD and the status types it shares.

mod bridge_service;
mod types;

pub use bridge_service::{
    BridgePort, BridgeService, BridgeServicePhase, BridgeServiceSpec, BridgeServiceStatus,
    BridgeServiceType, PortProtocol,
};
pub use types::{Condition, ConditionStatus};
