//! Read-only cluster queries consumed by the resolver.

use anyhow::Result;

use crate::model::{PodResource, ReplicaGroupResource, ServiceResource, WorkloadKind, WorkloadResource};
use crate::Uid;

/// Namespace-scoped, read-only view of a cluster.
///
/// Absence is `Ok(None)` / an empty list; `Err` is reserved for transport or decoding
/// failures and is passed through to callers untouched. Listing order must be stable for
/// an unchanged cluster since it decides ties between equally matching objects.
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn get_workload(&self, kind: WorkloadKind, namespace: &str, name: &str) -> Result<Option<WorkloadResource>>;

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceResource>>;

    /// Replica groups whose owner references include `owner`.
    async fn list_replica_groups_owned_by(&self, namespace: &str, owner: &Uid) -> Result<Vec<ReplicaGroupResource>>;

    /// Pods whose owner references include `owner`.
    async fn list_pods_owned_by(&self, namespace: &str, owner: &Uid) -> Result<Vec<PodResource>>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<ServiceResource>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<PodResource>>;
}

#[async_trait::async_trait]
impl<P: ResourceProvider + ?Sized> ResourceProvider for std::sync::Arc<P> {
    async fn get_workload(&self, kind: WorkloadKind, namespace: &str, name: &str) -> Result<Option<WorkloadResource>> {
        (**self).get_workload(kind, namespace, name).await
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceResource>> {
        (**self).list_services(namespace).await
    }

    async fn list_replica_groups_owned_by(&self, namespace: &str, owner: &Uid) -> Result<Vec<ReplicaGroupResource>> {
        (**self).list_replica_groups_owned_by(namespace, owner).await
    }

    async fn list_pods_owned_by(&self, namespace: &str, owner: &Uid) -> Result<Vec<PodResource>> {
        (**self).list_pods_owned_by(namespace, owner).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<ServiceResource>> {
        (**self).get_service(namespace, name).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<PodResource>> {
        (**self).get_pod(namespace, name).await
    }
}
