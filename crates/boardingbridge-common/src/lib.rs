//! Common types for boardingbridge: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod finalizers;
pub mod metrics;
pub mod retry;
pub mod telemetry;

pub use error::Error;
pub use events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
pub use finalizers::Finalizers;

/// Finalizer marker this controller registers on every BridgeService
pub const BRIDGE_FINALIZER: &str = "boardingbridge.dev/managed-service";

/// Default field manager for server-side apply and patches
pub const DEFAULT_FIELD_MANAGER: &str = "boardingbridge-controller";

/// Label key marking resources created by this controller
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";

/// Label value for [`MANAGED_BY_LABEL_KEY`]
pub const MANAGED_BY_LABEL_VALUE: &str = "boardingbridge";

/// Label key carrying the owning BridgeService name on managed Services
pub const OWNER_LABEL_KEY: &str = "boardingbridge.dev/owner";
