//! Locus endpoint resolver.
//!
//! Turns a locator into an endpoint by preferring a Service fronting the workload and
//! otherwise walking the ownership graph down to a single pod. Absence and ambiguity are
//! reported as [`Resolution::Unresolved`]; only bad locators and provider failures are errors.

#![forbid(unsafe_code)]

pub mod config;
pub mod outcome;

use std::time::Instant;

use locus_core::{
    select_port, Endpoint, Locator, ParseError, PodResource, ResourceProvider, ServiceResource, TargetPort,
    WorkloadKind, WorkloadResource,
};
use tracing::{debug, info};

pub use config::ResolverConfig;
pub use outcome::{Resolution, ResolutionPath, ResolvedEndpoint, UnresolvedReason};

/// The only locator scheme served.
pub const KUBERNETES_SCHEME: &str = "kubernetes";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid locator: {0}")]
    Parse(#[from] ParseError),
    /// Provider failure, passed through unchanged.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Kinds a locator may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Workload(WorkloadKind),
    Service,
    Pod,
}

impl TargetKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "deployment" | "deployments" => Some(TargetKind::Workload(WorkloadKind::Deployment)),
            "statefulset" | "statefulsets" => Some(TargetKind::Workload(WorkloadKind::StatefulSet)),
            "service" | "services" | "svc" => Some(TargetKind::Service),
            "pod" | "pods" => Some(TargetKind::Pod),
            _ => None,
        }
    }
}

fn unresolved(reason: UnresolvedReason) -> ResolveResult<Resolution> {
    Ok(Resolution::Unresolved(reason))
}

/// First Service fronting `workload`: selector matches win over owner references.
/// Headless Services have no stable address and are passed over.
fn match_service<'a>(workload: &WorkloadResource, services: &'a [ServiceResource]) -> Option<(&'a ServiceResource, ResolutionPath)> {
    let addressable = || services.iter().filter(|s| s.cluster_address.is_some());
    if let Some(s) = addressable().find(|s| s.selects(&workload.pod_template_labels)) {
        return Some((s, ResolutionPath::ServiceSelector));
    }
    addressable()
        .find(|s| s.is_owned_by(&workload.uid))
        .map(|s| (s, ResolutionPath::ServiceOwner))
}

/// Stateless resolver over a [`ResourceProvider`]. Safe to share across tasks.
pub struct EndpointResolver<P> {
    provider: P,
    config: ResolverConfig,
}

impl<P: ResourceProvider> EndpointResolver<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, ResolverConfig::default())
    }

    pub fn with_config(provider: P, config: ResolverConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P { &self.provider }
    pub fn config(&self) -> &ResolverConfig { &self.config }

    /// Parse `text` and resolve it.
    pub async fn resolve_str(&self, text: &str) -> ResolveResult<Option<Endpoint>> {
        let locator = Locator::parse(text)?;
        self.resolve(&locator).await
    }

    /// Resolve to an endpoint, or `None` when the locator has no single answer.
    pub async fn resolve(&self, locator: &Locator) -> ResolveResult<Option<Endpoint>> {
        Ok(self.resolve_detailed(locator).await?.into_endpoint())
    }

    /// Resolve and report which path answered or why none did.
    pub async fn resolve_detailed(&self, locator: &Locator) -> ResolveResult<Resolution> {
        let started = Instant::now();
        let res = self.dispatch(locator).await;
        let (outcome, detail) = match &res {
            Ok(Resolution::Resolved(r)) => {
                info!(locator = %locator, endpoint = %r.endpoint, path = r.path.as_str(), "resolved");
                ("resolved", r.path.as_str())
            }
            Ok(Resolution::Unresolved(reason)) => {
                info!(locator = %locator, reason = %reason, "unresolved");
                ("unresolved", reason.as_str())
            }
            Err(e) => {
                debug!(locator = %locator, error = %e, "resolution failed");
                ("error", "provider")
            }
        };
        metrics::counter!("resolve_total", 1u64, "outcome" => outcome, "detail" => detail);
        metrics::histogram!("resolve_ms", started.elapsed().as_secs_f64() * 1000.0);
        res
    }

    async fn dispatch(&self, locator: &Locator) -> ResolveResult<Resolution> {
        if !locator.scheme().eq_ignore_ascii_case(KUBERNETES_SCHEME) {
            return unresolved(UnresolvedReason::UnsupportedScheme { scheme: locator.scheme().to_string() });
        }
        match TargetKind::parse(locator.kind()) {
            Some(TargetKind::Workload(kind)) => self.resolve_workload(kind, locator).await,
            Some(TargetKind::Service) => self.resolve_service(locator).await,
            Some(TargetKind::Pod) => self.resolve_pod(locator).await,
            None => unresolved(UnresolvedReason::UnsupportedKind { kind: locator.kind().to_string() }),
        }
    }

    async fn resolve_workload(&self, kind: WorkloadKind, locator: &Locator) -> ResolveResult<Resolution> {
        let ns = locator.namespace();
        let requested = locator.port_name();
        let Some(workload) = self.provider.get_workload(kind, ns, locator.name()).await? else {
            return unresolved(UnresolvedReason::WorkloadNotFound);
        };

        let services = self.provider.list_services(ns).await?;
        if let Some((service, path)) = match_service(&workload, &services) {
            debug!(workload = %workload.name, service = %service.name, path = path.as_str(), "service matched");
            return Ok(self.service_endpoint(service, Some(&workload), requested, path));
        }

        debug!(workload = %workload.name, replicas = workload.desired_replicas, "no service; walking owners");
        if workload.desired_replicas != 1 {
            return unresolved(UnresolvedReason::ReplicaCount { replicas: workload.desired_replicas });
        }

        let pod_owner = if kind.has_replica_groups() {
            let groups = self.provider.list_replica_groups_owned_by(ns, &workload.uid).await?;
            match groups.as_slice() {
                [group] => group.uid,
                _ => return unresolved(UnresolvedReason::ReplicaGroupCount { count: groups.len() }),
            }
        } else {
            workload.uid
        };

        let pods = self.provider.list_pods_owned_by(ns, &pod_owner).await?;
        match pods.as_slice() {
            [pod] => Ok(self.pod_endpoint(pod, requested, ResolutionPath::OwnedPod)),
            _ => unresolved(UnresolvedReason::PodCount { count: pods.len() }),
        }
    }

    async fn resolve_service(&self, locator: &Locator) -> ResolveResult<Resolution> {
        match self.provider.get_service(locator.namespace(), locator.name()).await? {
            Some(service) => Ok(self.service_endpoint(&service, None, locator.port_name(), ResolutionPath::DirectService)),
            None => unresolved(UnresolvedReason::ServiceNotFound),
        }
    }

    async fn resolve_pod(&self, locator: &Locator) -> ResolveResult<Resolution> {
        match self.provider.get_pod(locator.namespace(), locator.name()).await? {
            Some(pod) => Ok(self.pod_endpoint(&pod, locator.port_name(), ResolutionPath::DirectPod)),
            None => unresolved(UnresolvedReason::PodNotFound),
        }
    }

    /// Endpoint on the Service's cluster address and its own (not target) port.
    fn service_endpoint(
        &self,
        service: &ServiceResource,
        workload: Option<&WorkloadResource>,
        requested: Option<&str>,
        path: ResolutionPath,
    ) -> Resolution {
        let Some(host) = service.cluster_address.as_deref() else {
            return Resolution::Unresolved(UnresolvedReason::NoServiceAddress);
        };
        let Some(port) = select_port(&service.ports, requested) else {
            return Resolution::Unresolved(UnresolvedReason::PortNotFound { requested: requested.map(str::to_string) });
        };
        let target_port = match &port.target {
            TargetPort::Number(n) => Some(*n),
            TargetPort::Name(name) => workload
                .and_then(|w| select_port(&w.container_ports, Some(name)))
                .map(|p| p.port),
        };
        debug!(service = %service.name, port = port.port, target = ?target_port, "service port selected");
        Resolution::Resolved(ResolvedEndpoint {
            endpoint: Endpoint::new(self.config.scheme_for(port), host, port.port),
            path,
            target_port,
        })
    }

    fn pod_endpoint(&self, pod: &PodResource, requested: Option<&str>, path: ResolutionPath) -> Resolution {
        let Some(ip) = pod.ip.as_deref() else {
            return Resolution::Unresolved(UnresolvedReason::PodAddressMissing);
        };
        let Some(port) = select_port(&pod.container_ports, requested) else {
            return Resolution::Unresolved(UnresolvedReason::PortNotFound { requested: requested.map(str::to_string) });
        };
        Resolution::Resolved(ResolvedEndpoint {
            endpoint: Endpoint::new(self.config.scheme_for(port), ip, port.port),
            path,
            target_port: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use locus_core::{ReplicaGroupResource, Uid};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider whose every call fails, counting calls.
    #[derive(Default)]
    struct Unreachable {
        calls: AtomicUsize,
    }

    impl Unreachable {
        fn fail<T>(&self) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("connection refused"))
        }
    }

    #[async_trait::async_trait]
    impl ResourceProvider for Unreachable {
        async fn get_workload(&self, _: WorkloadKind, _: &str, _: &str) -> Result<Option<WorkloadResource>> { self.fail() }
        async fn list_services(&self, _: &str) -> Result<Vec<ServiceResource>> { self.fail() }
        async fn list_replica_groups_owned_by(&self, _: &str, _: &Uid) -> Result<Vec<ReplicaGroupResource>> { self.fail() }
        async fn list_pods_owned_by(&self, _: &str, _: &Uid) -> Result<Vec<PodResource>> { self.fail() }
        async fn get_service(&self, _: &str, _: &str) -> Result<Option<ServiceResource>> { self.fail() }
        async fn get_pod(&self, _: &str, _: &str) -> Result<Option<PodResource>> { self.fail() }
    }

    #[tokio::test]
    async fn provider_errors_propagate_unchanged() {
        let r = EndpointResolver::new(Unreachable::default());
        let err = r.resolve_str("kubernetes:apps/v1/deployment/ns/app").await.expect_err("should fail");
        assert!(matches!(err, ResolveError::Provider(_)));
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn parse_errors_surface_before_any_query() {
        let r = EndpointResolver::new(Unreachable::default());
        let err = r.resolve_str("kubernetes:apps/v1/deployment/ns/").await.expect_err("should fail");
        assert!(matches!(err, ResolveError::Parse(ParseError::EmptySegment("name"))));
        assert_eq!(r.provider().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsupported_scheme_and_kind_do_not_query() {
        let r = EndpointResolver::new(Unreachable::default());
        let by_scheme = r
            .resolve_detailed(&Locator::parse("knative:serving.knative.dev/v1/service/ns/app").expect("ok"))
            .await
            .expect("no error");
        assert_eq!(by_scheme, Resolution::Unresolved(UnresolvedReason::UnsupportedScheme { scheme: "knative".into() }));
        let by_kind = r
            .resolve_detailed(&Locator::parse("kubernetes:batch/v1/job/ns/app").expect("ok"))
            .await
            .expect("no error");
        assert_eq!(by_kind, Resolution::Unresolved(UnresolvedReason::UnsupportedKind { kind: "job".into() }));
        assert_eq!(r.provider().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn kind_names_are_case_insensitive_and_accept_plurals() {
        assert_eq!(TargetKind::parse("Deployment"), Some(TargetKind::Workload(WorkloadKind::Deployment)));
        assert_eq!(TargetKind::parse("statefulsets"), Some(TargetKind::Workload(WorkloadKind::StatefulSet)));
        assert_eq!(TargetKind::parse("SVC"), Some(TargetKind::Service));
        assert_eq!(TargetKind::parse("pods"), Some(TargetKind::Pod));
        assert_eq!(TargetKind::parse("replicaset"), None);
    }
}
