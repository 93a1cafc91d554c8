//! Locus store: in-RAM cluster snapshot serving as a `ResourceProvider`.
//!
//! Objects are kept in arrival order, which is the listing order the resolver sees.
//! Ownership is indexed as `owner uid -> dependent positions`.

#![forbid(unsafe_code)]

use std::path::Path;

use anyhow::{Context, Result};
use locus_core::{
    PodResource, ReplicaGroupResource, ResourceProvider, ServiceResource, Uid, WorkloadKind, WorkloadResource,
};
use locus_kubehub::convert::{convert_value, Converted};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use smallvec::SmallVec;
use tracing::{debug, info};

type OwnerIndex = FxHashMap<Uid, SmallVec<[usize; 4]>>;

/// Immutable set of records with owner indexes.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    workloads: Vec<WorkloadResource>,
    services: Vec<ServiceResource>,
    replica_groups: Vec<ReplicaGroupResource>,
    pods: Vec<PodResource>,
    groups_by_owner: OwnerIndex,
    pods_by_owner: OwnerIndex,
}

impl ClusterSnapshot {
    /// Load manifests from a JSON or YAML (multi-document) file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut builder = SnapshotBuilder::new();
        builder.apply_path(path)?;
        Ok(builder.freeze())
    }

    pub fn len(&self) -> usize {
        self.workloads.len() + self.services.len() + self.replica_groups.len() + self.pods.len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn workloads(&self) -> &[WorkloadResource] { &self.workloads }
    pub fn services(&self) -> &[ServiceResource] { &self.services }
}

fn index_owners<'a>(owners: impl Iterator<Item = &'a [Uid]>) -> OwnerIndex {
    let mut idx = OwnerIndex::default();
    for (pos, refs) in owners.enumerate() {
        for owner in refs {
            let slot = idx.entry(*owner).or_default();
            // an object listing the same owner twice is indexed once
            if slot.last() != Some(&pos) {
                slot.push(pos);
            }
        }
    }
    idx
}

/// Split manifest text into raw objects. JSON (object or array) or YAML documents.
pub fn parse_manifests(text: &str) -> Result<Vec<serde_json::Value>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        let v: serde_json::Value = serde_json::from_str(trimmed).context("decoding JSON manifests")?;
        return Ok(match v {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        });
    }
    let mut out = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(text) {
        let v = serde_json::Value::deserialize(doc).context("decoding YAML document")?;
        if !v.is_null() {
            out.push(v);
        }
    }
    Ok(out)
}

/// Accumulates converted objects and freezes them into a `ClusterSnapshot`.
pub struct SnapshotBuilder {
    default_namespace: String,
    workloads: Vec<WorkloadResource>,
    services: Vec<ServiceResource>,
    replica_groups: Vec<ReplicaGroupResource>,
    pods: Vec<PodResource>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self { Self::new() }
}

/// Replace the record with the same uid in place, or append.
fn upsert<T>(items: &mut Vec<T>, item: T, uid_of: impl Fn(&T) -> Uid) {
    let uid = uid_of(&item);
    match items.iter().position(|x| uid_of(x) == uid) {
        Some(idx) => items[idx] = item,
        None => items.push(item),
    }
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            default_namespace: "default".to_string(),
            workloads: Vec::new(),
            services: Vec::new(),
            replica_groups: Vec::new(),
            pods: Vec::new(),
        }
    }

    /// Namespace assigned to manifests that omit `metadata.namespace`.
    pub fn with_default_namespace(mut self, ns: impl Into<String>) -> Self {
        self.default_namespace = ns.into();
        self
    }

    /// Apply one raw object. `*List` objects are expanded; kinds the resolver never reads are ignored.
    pub fn apply(&mut self, raw: serde_json::Value) -> Result<()> {
        let kind = raw.get("kind").and_then(|k| k.as_str()).unwrap_or_default().to_string();
        if kind.ends_with("List") {
            if let Some(serde_json::Value::Array(items)) = raw.get("items") {
                for item in items.iter().cloned() {
                    self.apply(item)?;
                }
            }
            return Ok(());
        }
        let Some(converted) = convert_value(raw)? else {
            debug!(kind = %kind, "ignoring object");
            return Ok(());
        };
        metrics::counter!("snapshot_objects_total", 1u64, "kind" => kind);
        let ns = &self.default_namespace;
        match converted {
            Converted::Workload(mut w) => {
                if w.namespace.is_empty() { w.namespace = ns.clone(); }
                upsert(&mut self.workloads, w, |x| x.uid);
            }
            Converted::Service(mut s) => {
                if s.namespace.is_empty() { s.namespace = ns.clone(); }
                upsert(&mut self.services, s, |x| x.uid);
            }
            Converted::ReplicaGroup(mut g) => {
                if g.namespace.is_empty() { g.namespace = ns.clone(); }
                upsert(&mut self.replica_groups, g, |x| x.uid);
            }
            Converted::Pod(mut p) => {
                if p.namespace.is_empty() { p.namespace = ns.clone(); }
                upsert(&mut self.pods, p, |x| x.uid);
            }
        }
        Ok(())
    }

    pub fn apply_all(&mut self, batch: impl IntoIterator<Item = serde_json::Value>) -> Result<()> {
        for raw in batch {
            self.apply(raw)?;
        }
        Ok(())
    }

    /// Apply every manifest found in a JSON or YAML file.
    pub fn apply_path(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let docs = parse_manifests(&text).with_context(|| format!("parsing {}", path.display()))?;
        let count = docs.len();
        self.apply_all(docs).with_context(|| format!("loading {}", path.display()))?;
        info!(path = %path.display(), documents = count, "manifests loaded");
        Ok(())
    }

    pub fn freeze(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            groups_by_owner: index_owners(self.replica_groups.iter().map(|g| g.owner_references.as_slice())),
            pods_by_owner: index_owners(self.pods.iter().map(|p| p.owner_references.as_slice())),
            workloads: self.workloads.clone(),
            services: self.services.clone(),
            replica_groups: self.replica_groups.clone(),
            pods: self.pods.clone(),
        }
    }
}

fn owned<'a, T>(items: &'a [T], idx: &OwnerIndex, owner: &Uid, in_ns: impl Fn(&T) -> bool) -> Vec<T>
where
    T: Clone + 'a,
{
    idx.get(owner)
        .into_iter()
        .flatten()
        .filter_map(|pos| items.get(*pos))
        .filter(|item| in_ns(item))
        .cloned()
        .collect()
}

#[async_trait::async_trait]
impl ResourceProvider for ClusterSnapshot {
    async fn get_workload(&self, kind: WorkloadKind, namespace: &str, name: &str) -> Result<Option<WorkloadResource>> {
        Ok(self
            .workloads
            .iter()
            .find(|w| w.kind == kind && w.namespace == namespace && w.name == name)
            .cloned())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceResource>> {
        Ok(self.services.iter().filter(|s| s.namespace == namespace).cloned().collect())
    }

    async fn list_replica_groups_owned_by(&self, namespace: &str, owner: &Uid) -> Result<Vec<ReplicaGroupResource>> {
        Ok(owned(&self.replica_groups, &self.groups_by_owner, owner, |g| g.namespace == namespace))
    }

    async fn list_pods_owned_by(&self, namespace: &str, owner: &Uid) -> Result<Vec<PodResource>> {
        Ok(owned(&self.pods, &self.pods_by_owner, owner, |p| p.namespace == namespace))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<ServiceResource>> {
        Ok(self.services.iter().find(|s| s.namespace == namespace && s.name == name).cloned())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<PodResource>> {
        Ok(self.pods.iter().find(|p| p.namespace == namespace && p.name == name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_documents_are_split() {
        let text = "---\napiVersion: v1\nkind: Pod\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: Pod\nmetadata:\n  name: b\n";
        let docs = parse_manifests(text).expect("parse");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["metadata"]["name"], "b");
    }

    #[test]
    fn json_array_is_flattened() {
        let docs = parse_manifests(r#"[{"kind":"Pod"},{"kind":"Service"}]"#).expect("parse");
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn owner_index_dedups_repeated_owner() {
        let a = [[1u8; 16], [1u8; 16]];
        let b = [[1u8; 16]];
        let idx = index_owners(vec![&a[..], &b[..]].into_iter());
        assert_eq!(idx.get(&[1u8; 16]).map(|v| v.as_slice()), Some(&[0usize, 1][..]));
    }
}
