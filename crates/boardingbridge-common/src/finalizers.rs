//! Ordered finalizer set
//!
//! Finalizers are shared with every other controller that touches an object,
//! so their order must survive a read-modify-write. Membership is a linear
//! scan over a handful of entries.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Ordered set of finalizer markers read from an object's metadata
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Finalizers(Vec<String>);

impl Finalizers {
    /// Read the finalizers from object metadata.
    ///
    /// Foreign markers are kept verbatim, duplicates included.
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self(meta.finalizers.clone().unwrap_or_default())
    }

    /// Returns true if the marker is present
    pub fn contains(&self, marker: &str) -> bool {
        self.0.iter().any(|f| f == marker)
    }

    /// Append the marker if absent. Returns true if the set changed.
    pub fn insert(&mut self, marker: &str) -> bool {
        if self.contains(marker) {
            return false;
        }
        self.0.push(marker.to_string());
        true
    }

    /// Remove the marker, keeping the order of the rest. Returns true if the set changed.
    pub fn remove(&mut self, marker: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|f| f != marker);
        self.0.len() != before
    }

    /// Consume into the list written back to the store
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}
