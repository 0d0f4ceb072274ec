//! BridgeService reconciler
//!
//! Keeps one core Service per BridgeService, guarded by a finalizer so the
//! Service is always torn down before its BridgeService disappears.

#![deny(missing_docs)]

pub mod construct;
pub mod controller;
pub mod lifecycle;

pub use controller::{
    error_policy, reconcile, reconcile_key, BridgeContext, BridgeKubeClient, BridgeKubeClientImpl,
    CreateOutcome, DeleteOutcome,
};
pub use lifecycle::{Lifecycle, ObjectKey};
