//! Locus core types: locators, read-only resource records, endpoints and port selection.

#![forbid(unsafe_code)]

pub mod locator;
pub mod model;
pub mod ports;
pub mod provider;

pub use locator::{Locator, ParseError, PORT_NAME_PARAM};
pub use model::{
    Endpoint, NamedPort, PodResource, ReplicaGroupResource, ServicePort, ServiceResource, TargetPort,
    WorkloadKind, WorkloadResource,
};
pub use ports::{select_port, PortCandidate};
pub use provider::ResourceProvider;

pub type Uid = [u8; 16];

pub mod prelude {
    pub use super::{
        select_port, Endpoint, Locator, NamedPort, ParseError, PodResource, PortCandidate,
        ReplicaGroupResource, ResourceProvider, ServicePort, ServiceResource, TargetPort, Uid,
        WorkloadKind, WorkloadResource,
    };
}
