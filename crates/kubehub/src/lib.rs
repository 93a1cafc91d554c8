//! Locus kubehub: live cluster access through `kube` and conversion into core records.

#![forbid(unsafe_code)]

pub mod convert;

use std::time::Instant;

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, ListParams},
    Client,
};
use locus_core::{
    PodResource, ReplicaGroupResource, ResourceProvider, ServiceResource, Uid, WorkloadKind, WorkloadResource,
};
use tracing::{debug, warn};
use uuid::Uuid;

pub fn to_uid(uid_str: &str) -> Result<Uid> {
    let u = Uuid::parse_str(uid_str).context("parsing metadata.uid as uuid")?;
    Ok(*u.as_bytes())
}

fn owned_by(meta: &ObjectMeta, owner: &Uid) -> bool {
    meta.owner_references
        .iter()
        .flatten()
        .any(|r| to_uid(&r.uid).map(|u| &u == owner).unwrap_or(false))
}

fn record_call(verb: &'static str, kind: &'static str, started: Instant) {
    metrics::counter!("kube_requests_total", 1u64, "verb" => verb, "kind" => kind);
    metrics::histogram!("kube_request_ms", started.elapsed().as_secs_f64() * 1000.0, "kind" => kind);
}

/// Convert every item, skipping (with a warning) objects that fail conversion.
fn convert_all<K, T>(items: Vec<K>, kind: &str, conv: impl Fn(&K) -> Result<T>) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match conv(item) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(kind, error = %e, "skipping unconvertible object");
                None
            }
        })
        .collect()
}

/// `ResourceProvider` over a live API server. Cheap to clone; shares the client.
#[derive(Clone)]
pub struct KubeProvider {
    client: Client,
}

impl KubeProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the local kubeconfig or in-cluster service account.
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await.context("creating kube client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ResourceProvider for KubeProvider {
    async fn get_workload(&self, kind: WorkloadKind, namespace: &str, name: &str) -> Result<Option<WorkloadResource>> {
        let started = Instant::now();
        let out = match kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                let found = api.get_opt(name).await?;
                record_call("get", "Deployment", started);
                found.as_ref().map(convert::workload_from_deployment).transpose()?
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                let found = api.get_opt(name).await?;
                record_call("get", "StatefulSet", started);
                found.as_ref().map(convert::workload_from_stateful_set).transpose()?
            }
        };
        debug!(%kind, ns = %namespace, name = %name, found = out.is_some(), "workload lookup");
        Ok(out)
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceResource>> {
        let started = Instant::now();
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        record_call("list", "Service", started);
        Ok(convert_all(list.items, "Service", convert::service_from))
    }

    async fn list_replica_groups_owned_by(&self, namespace: &str, owner: &Uid) -> Result<Vec<ReplicaGroupResource>> {
        let started = Instant::now();
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        record_call("list", "ReplicaSet", started);
        let owned: Vec<ReplicaSet> = list.items.into_iter().filter(|rs| owned_by(&rs.metadata, owner)).collect();
        Ok(convert_all(owned, "ReplicaSet", convert::replica_group_from))
    }

    async fn list_pods_owned_by(&self, namespace: &str, owner: &Uid) -> Result<Vec<PodResource>> {
        let started = Instant::now();
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        record_call("list", "Pod", started);
        let owned: Vec<Pod> = list.items.into_iter().filter(|p| owned_by(&p.metadata, owner)).collect();
        Ok(convert_all(owned, "Pod", convert::pod_from))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<ServiceResource>> {
        let started = Instant::now();
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let found = api.get_opt(name).await?;
        record_call("get", "Service", started);
        found.as_ref().map(convert::service_from).transpose()
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<PodResource>> {
        let started = Instant::now();
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let found = api.get_opt(name).await?;
        record_call("get", "Pod", started);
        found.as_ref().map(convert::pod_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    fn meta_with_owner(uid: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some("child".into()),
            owner_references: Some(vec![OwnerReference {
                api_version: "apps/v1".into(),
                kind: "ReplicaSet".into(),
                name: "parent".into(),
                uid: uid.into(),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn to_uid_parses_uuid_bytes() {
        let u = to_uid("00000000-0000-0000-0000-0000000000ff").expect("ok");
        assert_eq!(u[15], 0xff);
        assert!(u[..15].iter().all(|b| *b == 0));
        assert!(to_uid("not-a-uid").is_err());
    }

    #[test]
    fn owned_by_matches_parsed_uid() {
        let owner = to_uid("00000000-0000-0000-0000-000000000003").expect("uid");
        assert!(owned_by(&meta_with_owner("00000000-0000-0000-0000-000000000003"), &owner));
        assert!(!owned_by(&meta_with_owner("00000000-0000-0000-0000-000000000004"), &owner));
        assert!(!owned_by(&meta_with_owner("garbage"), &owner));
        assert!(!owned_by(&ObjectMeta::default(), &owner));
    }
}
