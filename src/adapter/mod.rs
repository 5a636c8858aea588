pub mod error;
pub mod mock;
pub mod types;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

pub use error::AdapterError;
pub use types::ResourceHandle;

use crate::inventory::ResourceKind;

/// Uniform CRUD plus kind-specific mutations over cloud resources, per
/// Implementations must never leak provider-native types through this
/// interface — only `ResourceHandle` and `AdapterError` cross the boundary.
#[async_trait]
pub trait CloudAdapter: Send + Sync {
    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        spec: serde_json::Value,
    ) -> Result<ResourceHandle, AdapterError>;

    async fn delete(&self, kind: ResourceKind, handle: &ResourceHandle) -> Result<(), AdapterError>;

    async fn get(&self, kind: ResourceKind, handle: &ResourceHandle) -> Result<ResourceHandle, AdapterError>;

    async fn list(&self, kind: ResourceKind) -> Result<Vec<ResourceHandle>, AdapterError>;

    async fn list_by_project(
        &self,
        kind: ResourceKind,
        name_prefix: &str,
    ) -> Result<Vec<ResourceHandle>, AdapterError>;

    async fn attach_subnet(
        &self,
        router: &ResourceHandle,
        subnet: &ResourceHandle,
    ) -> Result<(), AdapterError>;

    async fn add_float(&self, instance: &ResourceHandle, floater: &ResourceHandle) -> Result<(), AdapterError>;

    async fn attach_volume(&self, instance: &ResourceHandle, volume: &ResourceHandle) -> Result<(), AdapterError>;

    async fn add_member(&self, pool: &ResourceHandle, member: &ResourceHandle) -> Result<(), AdapterError>;

    async fn disassociate_monitor(
        &self,
        pool: &ResourceHandle,
        monitor: &ResourceHandle,
    ) -> Result<(), AdapterError>;
}

/// Poll a readiness check until it reports true, the check reports a
/// permanent error, or the retry budget is exhausted. Used by Adapter
/// implementations after `create` to wait for active/available state.
pub async fn poll_until_ready<F, Fut>(
    mut check: F,
    attempts: u32,
    interval: Duration,
) -> Result<(), AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, AdapterError>>,
{
    for attempt in 0..attempts {
        match check().await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                if attempt + 1 < attempts {
                    tokio::time::sleep(interval).await;
                }
            }
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                tokio::time::sleep(interval).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(AdapterError::Transient("timed out waiting for ready state".into()))
}

/// Delete a resource, tolerating not-found and retrying transient failures
/// up to `attempts` times with a fixed 1s backoff. Returns
/// `true` if the resource is gone (deleted or already absent), `false` if
/// every attempt failed and the resource should be demoted to a leftover.
pub async fn delete_with_retry(
    adapter: &dyn CloudAdapter,
    kind: ResourceKind,
    handle: &ResourceHandle,
    attempts: u32,
) -> bool {
    for attempt in 0..attempts {
        match adapter.delete(kind, handle).await {
            Ok(()) => return true,
            Err(e) if e.is_not_found() => return true,
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(_) => {
                if attempt + 1 >= attempts {
                    return false;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockAdapter;

    #[tokio::test]
    async fn delete_with_retry_tolerates_not_found() {
        let adapter = MockAdapter::new();
        let handle = ResourceHandle::new("missing-id", "missing-name");
        let ok = delete_with_retry(&adapter, ResourceKind::Instance, &handle, 3).await;
        assert!(ok);
    }
}
