use serde::{Deserialize, Serialize};

use crate::inventory::ResourceKind;

/// An opaque reference to a provider-side resource. The Adapter never leaks
/// the provider's own SDK types upward; everything above this module deals
/// only in `ResourceHandle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub id: String,
    pub name: String,
}

impl ResourceHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Keypairs are addressed by name everywhere in the provider API (and in
    /// the cleanup file schema); every other kind is addressed by id.
    pub fn kind_uses_name(&self, kind: ResourceKind) -> bool {
        matches!(kind, ResourceKind::Keypair)
    }
}
