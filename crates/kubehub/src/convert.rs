//! Conversion from `k8s-openapi` objects (or their raw JSON) into core records.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Container, PodTemplateSpec, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use locus_core::{
    NamedPort, PodResource, ReplicaGroupResource, ServicePort, ServiceResource, TargetPort, Uid, WorkloadKind,
    WorkloadResource,
};

use crate::to_uid;

/// Any record the resolver consumes, tagged by source kind.
#[derive(Debug, Clone)]
pub enum Converted {
    Workload(WorkloadResource),
    Service(ServiceResource),
    ReplicaGroup(ReplicaGroupResource),
    Pod(PodResource),
}

/// Identity fields shared by every record.
struct Ident {
    uid: Uid,
    name: String,
    namespace: String,
    owners: Vec<Uid>,
}

fn ident(meta: &ObjectMeta) -> Result<Ident> {
    let name = meta.name.clone().ok_or_else(|| anyhow!("object missing metadata.name"))?;
    let uid_str = meta
        .uid
        .as_deref()
        .ok_or_else(|| anyhow!("object {} missing metadata.uid", name))?;
    let uid = to_uid(uid_str).with_context(|| format!("object {}", name))?;
    let mut owners = Vec::new();
    for owner in meta.owner_references.iter().flatten() {
        owners.push(to_uid(&owner.uid).with_context(|| format!("ownerReferences of {}", name))?);
    }
    Ok(Ident { uid, name, namespace: meta.namespace.clone().unwrap_or_default(), owners })
}

fn port_u16(value: i32, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| anyhow!("{} {} out of range", what, value))
}

fn container_ports(containers: &[Container]) -> Result<Vec<NamedPort>> {
    let mut out = Vec::new();
    for c in containers {
        for p in c.ports.iter().flatten() {
            out.push(NamedPort { name: p.name.clone(), port: port_u16(p.container_port, "containerPort")? });
        }
    }
    Ok(out)
}

fn template_parts(template: Option<&PodTemplateSpec>) -> Result<(BTreeMap<String, String>, Vec<NamedPort>)> {
    let Some(t) = template else { return Ok((BTreeMap::new(), Vec::new())) };
    let labels = t.metadata.as_ref().and_then(|m| m.labels.clone()).unwrap_or_default();
    let ports = match t.spec.as_ref() {
        Some(spec) => container_ports(&spec.containers)?,
        None => Vec::new(),
    };
    Ok((labels, ports))
}

pub fn workload_from_deployment(d: &Deployment) -> Result<WorkloadResource> {
    let id = ident(&d.metadata)?;
    let (pod_template_labels, container_ports) = template_parts(d.spec.as_ref().map(|s| &s.template))?;
    Ok(WorkloadResource {
        uid: id.uid,
        name: id.name,
        namespace: id.namespace,
        kind: WorkloadKind::Deployment,
        owner_references: id.owners,
        desired_replicas: d.status.as_ref().and_then(|s| s.replicas).unwrap_or(0),
        pod_template_labels,
        container_ports,
    })
}

pub fn workload_from_stateful_set(s: &StatefulSet) -> Result<WorkloadResource> {
    let id = ident(&s.metadata)?;
    let (pod_template_labels, container_ports) = template_parts(s.spec.as_ref().map(|s| &s.template))?;
    Ok(WorkloadResource {
        uid: id.uid,
        name: id.name,
        namespace: id.namespace,
        kind: WorkloadKind::StatefulSet,
        owner_references: id.owners,
        desired_replicas: s.status.as_ref().map(|st| st.replicas).unwrap_or(0),
        pod_template_labels,
        container_ports,
    })
}

pub fn service_from(s: &Service) -> Result<ServiceResource> {
    let id = ident(&s.metadata)?;
    let spec = s.spec.as_ref();
    let cluster_address = spec
        .and_then(|sp| sp.cluster_ip.clone())
        .filter(|ip| !ip.is_empty() && ip != "None");
    let mut ports = Vec::new();
    for p in spec.and_then(|sp| sp.ports.as_ref()).into_iter().flatten() {
        let port = port_u16(p.port, "service port")?;
        // unset targetPort defaults to the service port
        let target = match &p.target_port {
            None => TargetPort::Number(port),
            Some(IntOrString::Int(n)) => TargetPort::Number(port_u16(*n, "targetPort")?),
            Some(IntOrString::String(name)) => match name.parse::<u16>() {
                Ok(n) => TargetPort::Number(n),
                Err(_) => TargetPort::Name(name.clone()),
            },
        };
        ports.push(ServicePort { name: p.name.clone(), port, target });
    }
    Ok(ServiceResource {
        uid: id.uid,
        name: id.name,
        namespace: id.namespace,
        selector: spec.and_then(|sp| sp.selector.clone()).unwrap_or_default(),
        owner_references: id.owners,
        cluster_address,
        ports,
    })
}

pub fn replica_group_from(rs: &ReplicaSet) -> Result<ReplicaGroupResource> {
    let id = ident(&rs.metadata)?;
    Ok(ReplicaGroupResource { uid: id.uid, name: id.name, namespace: id.namespace, owner_references: id.owners })
}

pub fn pod_from(p: &Pod) -> Result<PodResource> {
    let id = ident(&p.metadata)?;
    let container_ports = match p.spec.as_ref() {
        Some(spec) => container_ports(&spec.containers)?,
        None => Vec::new(),
    };
    Ok(PodResource {
        uid: id.uid,
        name: id.name,
        namespace: id.namespace,
        owner_references: id.owners,
        ip: p.status.as_ref().and_then(|s| s.pod_ip.clone()).filter(|ip| !ip.is_empty()),
        container_ports,
    })
}

/// Convert a raw manifest by its `kind`. Kinds the resolver never reads yield `Ok(None)`.
pub fn convert_value(raw: serde_json::Value) -> Result<Option<Converted>> {
    let kind = raw.get("kind").and_then(|k| k.as_str()).unwrap_or_default().to_string();
    let converted = match kind.as_str() {
        "Deployment" => {
            let d: Deployment = serde_json::from_value(raw).context("decoding Deployment")?;
            Converted::Workload(workload_from_deployment(&d)?)
        }
        "StatefulSet" => {
            let s: StatefulSet = serde_json::from_value(raw).context("decoding StatefulSet")?;
            Converted::Workload(workload_from_stateful_set(&s)?)
        }
        "Service" => {
            let s: Service = serde_json::from_value(raw).context("decoding Service")?;
            Converted::Service(service_from(&s)?)
        }
        "ReplicaSet" => {
            let rs: ReplicaSet = serde_json::from_value(raw).context("decoding ReplicaSet")?;
            Converted::ReplicaGroup(replica_group_from(&rs)?)
        }
        "Pod" => {
            let p: Pod = serde_json::from_value(raw).context("decoding Pod")?;
            Converted::Pod(pod_from(&p)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(converted))
}
