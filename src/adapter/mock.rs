use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AdapterError, CloudAdapter, ResourceHandle};
use crate::inventory::ResourceKind;

/// An in-memory `CloudAdapter` used by the Staging Executor, Cleanup Engine,
/// and Driver tests. This is the only concrete adapter in this repository —
/// binding to a real provider SDK is out of scope.
#[derive(Default)]
pub struct MockAdapter {
    resources: Mutex<HashMap<ResourceKind, HashMap<String, ResourceHandle>>>,
    next_id: Mutex<u64>,
    /// Names that should fail every create call, simulating a provider
    /// refusal — used to exercise the Staging Executor's error path.
    pub fail_on_create: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self) -> String {
        let mut next = self.next_id.lock().expect("mock adapter mutex poisoned");
        *next += 1;
        format!("mock-{next}")
    }
}

#[async_trait]
impl CloudAdapter for MockAdapter {
    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        _spec: serde_json::Value,
    ) -> Result<ResourceHandle, AdapterError> {
        if self
            .fail_on_create
            .lock()
            .expect("mock adapter mutex poisoned")
            .iter()
            .any(|n| n == name)
        {
            return Err(AdapterError::Permanent(format!("provider refused {name}")));
        }
        let id = self.alloc_id();
        let handle = ResourceHandle::new(id, name);
        self.resources
            .lock()
            .expect("mock adapter mutex poisoned")
            .entry(kind)
            .or_default()
            .insert(handle.id.clone(), handle.clone());
        Ok(handle)
    }

    async fn delete(&self, kind: ResourceKind, handle: &ResourceHandle) -> Result<(), AdapterError> {
        let mut resources = self.resources.lock().expect("mock adapter mutex poisoned");
        let bucket = resources.entry(kind).or_default();
        if bucket.remove(&handle.id).is_some() {
            Ok(())
        } else {
            Err(AdapterError::NotFound(format!("{} {}", handle.id, handle.name)))
        }
    }

    async fn get(&self, kind: ResourceKind, handle: &ResourceHandle) -> Result<ResourceHandle, AdapterError> {
        self.resources
            .lock()
            .expect("mock adapter mutex poisoned")
            .get(&kind)
            .and_then(|bucket| bucket.get(&handle.id))
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(handle.id.clone()))
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<ResourceHandle>, AdapterError> {
        Ok(self
            .resources
            .lock()
            .expect("mock adapter mutex poisoned")
            .get(&kind)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_by_project(
        &self,
        kind: ResourceKind,
        name_prefix: &str,
    ) -> Result<Vec<ResourceHandle>, AdapterError> {
        Ok(self
            .resources
            .lock()
            .expect("mock adapter mutex poisoned")
            .get(&kind)
            .map(|bucket| {
                bucket
                    .values()
                    .filter(|h| h.name.starts_with(name_prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn attach_subnet(&self, _router: &ResourceHandle, _subnet: &ResourceHandle) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn add_float(&self, _instance: &ResourceHandle, _floater: &ResourceHandle) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn attach_volume(&self, _instance: &ResourceHandle, _volume: &ResourceHandle) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn add_member(&self, _pool: &ResourceHandle, _member: &ResourceHandle) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn disassociate_monitor(
        &self,
        _pool: &ResourceHandle,
        _monitor: &ResourceHandle,
    ) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let adapter = MockAdapter::new();
        let handle = adapter
            .create(ResourceKind::Instance, "cloudpunch-1-s1", serde_json::json!({}))
            .await
            .unwrap();
        let fetched = adapter.get(ResourceKind::Instance, &handle).await.unwrap();
        assert_eq!(fetched.name, "cloudpunch-1-s1");
    }

    #[tokio::test]
    async fn create_failure_is_permanent() {
        let adapter = MockAdapter::new();
        adapter
            .fail_on_create
            .lock()
            .unwrap()
            .push("cloudpunch-1-s1".to_string());
        let result = adapter
            .create(ResourceKind::Instance, "cloudpunch-1-s1", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(AdapterError::Permanent(_))));
    }

    #[tokio::test]
    async fn list_by_project_filters_prefix() {
        let adapter = MockAdapter::new();
        adapter
            .create(ResourceKind::Instance, "cloudpunch-1-s1", serde_json::json!({}))
            .await
            .unwrap();
        adapter
            .create(ResourceKind::Instance, "other-instance", serde_json::json!({}))
            .await
            .unwrap();
        let found = adapter
            .list_by_project(ResourceKind::Instance, "cloudpunch-")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
