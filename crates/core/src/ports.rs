//! Port selection: first port by declared order, or the first exact name match.

use crate::model::{NamedPort, ServicePort};

/// Anything that carries an optional port name and a port number.
pub trait PortCandidate {
    fn port_name(&self) -> Option<&str>;
    fn port_number(&self) -> u16;
}

impl PortCandidate for NamedPort {
    fn port_name(&self) -> Option<&str> { self.name.as_deref() }
    fn port_number(&self) -> u16 { self.port }
}

impl PortCandidate for ServicePort {
    fn port_name(&self) -> Option<&str> { self.name.as_deref() }
    fn port_number(&self) -> u16 { self.port }
}

/// Pick a port from `candidates`.
///
/// With `requested`, returns the first candidate whose name equals it exactly
/// (case-sensitive) or `None`. Without it, returns the first candidate.
pub fn select_port<'a, T: PortCandidate>(candidates: &'a [T], requested: Option<&str>) -> Option<&'a T> {
    match requested {
        Some(name) => candidates.iter().find(|c| c.port_name() == Some(name)),
        None => candidates.first(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: Option<&str>, port: u16) -> NamedPort {
        NamedPort { name: name.map(str::to_string), port }
    }

    #[test]
    fn defaults_to_first_declared() {
        let ports = vec![port(Some("metrics"), 9090), port(Some("http"), 8080)];
        assert_eq!(select_port(&ports, None).map(|p| p.port), Some(9090));
    }

    #[test]
    fn named_selection_is_exact() {
        let ports = vec![port(None, 80), port(Some("web"), 8080), port(Some("Web"), 8081), port(Some("web"), 8082)];
        assert_eq!(select_port(&ports, Some("web")).map(|p| p.port), Some(8080));
        assert_eq!(select_port(&ports, Some("Web")).map(|p| p.port), Some(8081));
        assert!(select_port(&ports, Some("WEB")).is_none());
    }

    #[test]
    fn unnamed_ports_never_match_a_name() {
        let ports = vec![port(None, 80)];
        assert!(select_port(&ports, Some("")).is_none());
    }

    #[test]
    fn empty_list_yields_none() {
        let ports: Vec<NamedPort> = Vec::new();
        assert!(select_port(&ports, None).is_none());
        assert!(select_port(&ports, Some("http")).is_none());
    }
}
