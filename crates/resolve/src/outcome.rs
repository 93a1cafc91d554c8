//! Resolution outcomes.

use std::fmt;

use serde::Serialize;

use locus_core::Endpoint;

/// Which branch of the chain produced an endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPath {
    /// Service whose selector matches the workload's pod template.
    ServiceSelector,
    /// Service owned by the workload.
    ServiceOwner,
    /// Single pod reached through owner references.
    OwnedPod,
    /// Locator named a Service.
    DirectService,
    /// Locator named a Pod.
    DirectPod,
}

impl ResolutionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPath::ServiceSelector => "service-selector",
            ResolutionPath::ServiceOwner => "service-owner",
            ResolutionPath::OwnedPod => "owned-pod",
            ResolutionPath::DirectService => "direct-service",
            ResolutionPath::DirectPod => "direct-pod",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub endpoint: Endpoint,
    pub path: ResolutionPath,
    /// Container port behind the selected Service port, when it could be determined.
    pub target_port: Option<u16>,
}

/// Why no endpoint was produced. None of these are failures.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum UnresolvedReason {
    UnsupportedScheme { scheme: String },
    UnsupportedKind { kind: String },
    WorkloadNotFound,
    ServiceNotFound,
    PodNotFound,
    /// Headless Service named directly.
    NoServiceAddress,
    /// No Service and the workload does not report exactly one replica.
    ReplicaCount { replicas: i32 },
    ReplicaGroupCount { count: usize },
    PodCount { count: usize },
    PodAddressMissing,
    PortNotFound { requested: Option<String> },
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::UnsupportedScheme { .. } => "unsupported-scheme",
            UnresolvedReason::UnsupportedKind { .. } => "unsupported-kind",
            UnresolvedReason::WorkloadNotFound => "workload-not-found",
            UnresolvedReason::ServiceNotFound => "service-not-found",
            UnresolvedReason::PodNotFound => "pod-not-found",
            UnresolvedReason::NoServiceAddress => "no-service-address",
            UnresolvedReason::ReplicaCount { .. } => "replica-count",
            UnresolvedReason::ReplicaGroupCount { .. } => "replica-group-count",
            UnresolvedReason::PodCount { .. } => "pod-count",
            UnresolvedReason::PodAddressMissing => "pod-address-missing",
            UnresolvedReason::PortNotFound { .. } => "port-not-found",
        }
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::UnsupportedScheme { scheme } => write!(f, "unsupported scheme `{}`", scheme),
            UnresolvedReason::UnsupportedKind { kind } => write!(f, "unsupported kind `{}`", kind),
            UnresolvedReason::WorkloadNotFound => f.write_str("workload not found"),
            UnresolvedReason::ServiceNotFound => f.write_str("service not found"),
            UnresolvedReason::PodNotFound => f.write_str("pod not found"),
            UnresolvedReason::NoServiceAddress => f.write_str("service has no cluster address"),
            UnresolvedReason::ReplicaCount { replicas } => {
                write!(f, "no service and {} replicas (need exactly 1)", replicas)
            }
            UnresolvedReason::ReplicaGroupCount { count } => {
                write!(f, "{} owned replica groups (need exactly 1)", count)
            }
            UnresolvedReason::PodCount { count } => write!(f, "{} owned pods (need exactly 1)", count),
            UnresolvedReason::PodAddressMissing => f.write_str("pod has no IP yet"),
            UnresolvedReason::PortNotFound { requested: Some(name) } => write!(f, "no port named `{}`", name),
            UnresolvedReason::PortNotFound { requested: None } => f.write_str("no ports declared"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Resolution {
    Resolved(ResolvedEndpoint),
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Resolution::Resolved(r) => Some(&r.endpoint),
            Resolution::Unresolved(_) => None,
        }
    }

    pub fn into_endpoint(self) -> Option<Endpoint> {
        match self {
            Resolution::Resolved(r) => Some(r.endpoint),
            Resolution::Unresolved(_) => None,
        }
    }
}
