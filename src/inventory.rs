/// Resource Inventory: the mapping from resource kind to environment label to
/// an ordered sequence of resource handles.
///
/// Creation order within a kind matches the name-encoded index; deletions
/// traverse kinds in `RESOURCE_ORDER` reversed (see `cleanup_engine`).
/// Handles are never shared across environments, and network handles carry
/// an extra `role` key because servers and clients keep separate router/
/// network fleets.
use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::adapter::types::ResourceHandle;
use crate::topology::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Project,
    User,
    SecGroup,
    Keypair,
    Router,
    Network,
    Subnet,
    Instance,
    Volume,
    Floater,
    LoadBalancer,
    LbListener,
    LbPool,
    LbMember,
    LbMonitor,
}

/// Kinds whose handles are additionally keyed by role (master/server/client)
/// because each role keeps its own fleet of routers/networks.
fn is_role_keyed(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Router | ResourceKind::Network)
}

#[derive(Debug, Clone)]
pub struct InventoryEntry {
    pub kind: ResourceKind,
    pub env_label: String,
    pub role: Option<Role>,
    pub handle: ResourceHandle,
}

/// The inventory's storage is a single mutex-guarded vector in creation
/// order; lookups filter it, matching the "single append, many views"
/// discipline the Executor and Cleanup Engine both need.
#[derive(Default)]
pub struct ResourceInventory {
    entries: Mutex<Vec<InventoryEntry>>,
}

impl ResourceInventory {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, kind: ResourceKind, env_label: &str, role: Option<Role>, handle: ResourceHandle) {
        let mut entries = self.entries.lock().expect("inventory mutex poisoned");
        entries.push(InventoryEntry {
            kind,
            env_label: env_label.to_string(),
            role,
            handle,
        });
    }

    pub fn for_kind(&self, kind: ResourceKind) -> Vec<InventoryEntry> {
        self.entries
            .lock()
            .expect("inventory mutex poisoned")
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn for_kind_and_env(&self, kind: ResourceKind, env_label: &str) -> Vec<InventoryEntry> {
        self.entries
            .lock()
            .expect("inventory mutex poisoned")
            .iter()
            .filter(|e| e.kind == kind && e.env_label == env_label)
            .cloned()
            .collect()
    }

    pub fn remove(&self, kind: ResourceKind, handle: &ResourceHandle) {
        let mut entries = self.entries.lock().expect("inventory mutex poisoned");
        entries.retain(|e| !(e.kind == kind && &e.handle == handle));
    }

    pub fn remove_by_name(&self, kind: ResourceKind, name: &str) {
        let mut entries = self.entries.lock().expect("inventory mutex poisoned");
        entries.retain(|e| !(e.kind == kind && e.handle.name == name));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("inventory mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<InventoryEntry> {
        self.entries.lock().expect("inventory mutex poisoned").clone()
    }

    /// Group handles by kind, in the order each kind was first touched —
    /// used to build a cleanup file.
    pub fn group_by_kind(&self) -> HashMap<ResourceKind, Vec<String>> {
        let mut groups: HashMap<ResourceKind, Vec<String>> = HashMap::new();
        for entry in self.snapshot() {
            let key = if entry.handle.kind_uses_name(entry.kind) {
                entry.handle.name.clone()
            } else {
                entry.handle.id.clone()
            };
            groups.entry(entry.kind).or_default().push(key);
        }
        groups
    }
}

impl InventoryEntry {
    pub fn role_key(&self) -> Option<Role> {
        if is_role_keyed(self.kind) {
            self.role
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::types::ResourceHandle;

    #[test]
    fn records_and_filters_by_kind() {
        let inventory = ResourceInventory::new();
        inventory.record(
            ResourceKind::Instance,
            "env1",
            Some(Role::Server),
            ResourceHandle::new("id-1", "cloudpunch-1-s-r1-n1-s1"),
        );
        inventory.record(
            ResourceKind::Router,
            "env1",
            Some(Role::Server),
            ResourceHandle::new("id-2", "cloudpunch-1-s-r1"),
        );

        assert_eq!(inventory.for_kind(ResourceKind::Instance).len(), 1);
        assert_eq!(inventory.for_kind(ResourceKind::Router).len(), 1);
        assert_eq!(inventory.len(), 2);
    }

    #[test]
    fn remove_drops_only_matching_entry() {
        let inventory = ResourceInventory::new();
        let handle = ResourceHandle::new("id-1", "cloudpunch-1-s1");
        inventory.record(ResourceKind::Instance, "env1", None, handle.clone());
        inventory.remove(ResourceKind::Instance, &handle);
        assert!(inventory.is_empty());
    }
}
