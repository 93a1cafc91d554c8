//! Read-only resource records and the resolved endpoint.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Uid;

/// Workload kinds reachable through the ownership graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    /// Deployment -> ReplicaSet -> Pod
    Deployment,
    /// StatefulSet -> Pod
    StatefulSet,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
        }
    }

    /// Whether pods hang off an intermediate replica group rather than the workload itself.
    pub fn has_replica_groups(&self) -> bool {
        matches!(self, WorkloadKind::Deployment)
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedPort {
    pub name: Option<String>,
    pub port: u16,
}

/// Where a Service port forwards to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TargetPort {
    Number(u16),
    Name(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePort {
    pub name: Option<String>,
    pub port: u16,
    pub target: TargetPort,
}

/// Deployment-like object. `desired_replicas` is the reported (status) count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadResource {
    pub uid: Uid,
    pub name: String,
    pub namespace: String,
    pub kind: WorkloadKind,
    pub owner_references: Vec<Uid>,
    pub desired_replicas: i32,
    pub pod_template_labels: BTreeMap<String, String>,
    /// All containers' ports in declaration order.
    pub container_ports: Vec<NamedPort>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResource {
    pub uid: Uid,
    pub name: String,
    pub namespace: String,
    pub selector: BTreeMap<String, String>,
    pub owner_references: Vec<Uid>,
    /// Cluster IP; `None` for headless Services.
    pub cluster_address: Option<String>,
    pub ports: Vec<ServicePort>,
}

impl ServiceResource {
    /// True when the selector is non-empty and every pair appears in `labels`.
    pub fn selects(&self, labels: &BTreeMap<String, String>) -> bool {
        !self.selector.is_empty() && self.selector.iter().all(|(k, v)| labels.get(k) == Some(v))
    }

    pub fn is_owned_by(&self, uid: &Uid) -> bool {
        self.owner_references.contains(uid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaGroupResource {
    pub uid: Uid,
    pub name: String,
    pub namespace: String,
    pub owner_references: Vec<Uid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodResource {
    pub uid: Uid,
    pub name: String,
    pub namespace: String,
    pub owner_references: Vec<Uid>,
    pub ip: Option<String>,
    pub container_ports: Vec<NamedPort>,
}

/// Resolved network address, rendered as `<scheme>://<host>:<port>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self { scheme: scheme.into(), host: host.into(), port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // IPv6 literals need brackets in URLs
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn service(selector: &[(&str, &str)]) -> ServiceResource {
        ServiceResource {
            uid: [1; 16],
            name: "svc".into(),
            namespace: "ns".into(),
            selector: labels(selector),
            owner_references: vec![[9; 16]],
            cluster_address: Some("10.0.0.1".into()),
            ports: Vec::new(),
        }
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(Endpoint::new("http", "10.10.10.11", 80).to_string(), "http://10.10.10.11:80");
        assert_eq!(Endpoint::new("https", "fd00::1", 443).to_string(), "https://[fd00::1]:443");
    }

    #[test]
    fn selector_must_be_subset_of_labels() {
        let pod_labels = labels(&[("app", "web"), ("tier", "front")]);
        assert!(service(&[("app", "web")]).selects(&pod_labels));
        assert!(service(&[("app", "web"), ("tier", "front")]).selects(&pod_labels));
        assert!(!service(&[("app", "web"), ("tier", "back")]).selects(&pod_labels));
        assert!(!service(&[("app", "db")]).selects(&pod_labels));
    }

    #[test]
    fn empty_selector_selects_nothing() {
        assert!(!service(&[]).selects(&labels(&[("app", "web")])));
    }

    #[test]
    fn owner_lookup_uses_uid() {
        let s = service(&[]);
        assert!(s.is_owned_by(&[9; 16]));
        assert!(!s.is_owned_by(&[1; 16]));
    }

    #[test]
    fn target_port_serializes_untagged() {
        let named = serde_json::to_value(TargetPort::Name("http".into())).expect("ser");
        assert_eq!(named, serde_json::json!("http"));
        let num = serde_json::to_value(TargetPort::Number(8080)).expect("ser");
        assert_eq!(num, serde_json::json!(8080));
    }
}
