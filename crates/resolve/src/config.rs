//! Resolver configuration (environment driven).

use serde::{Deserialize, Serialize};

use locus_core::PortCandidate;

/// Scheme used for endpoints and when to switch to the secure one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolverConfig {
    pub default_scheme: String,
    pub secure_scheme: String,
    /// Use `secure_scheme` for ports named `https` or numbered 443.
    pub detect_secure: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { default_scheme: "http".to_string(), secure_scheme: "https".to_string(), detect_secure: true }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ResolverConfig {
    /// Read `LOCUS_DEFAULT_SCHEME`, `LOCUS_SECURE_SCHEME` and `LOCUS_DETECT_SECURE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable values keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(s) = lookup("LOCUS_DEFAULT_SCHEME").filter(|s| !s.is_empty()) {
            cfg.default_scheme = s;
        }
        if let Some(s) = lookup("LOCUS_SECURE_SCHEME").filter(|s| !s.is_empty()) {
            cfg.secure_scheme = s;
        }
        if let Some(b) = lookup("LOCUS_DETECT_SECURE").as_deref().and_then(parse_bool) {
            cfg.detect_secure = b;
        }
        cfg
    }

    pub fn scheme_for<T: PortCandidate>(&self, port: &T) -> &str {
        if self.detect_secure && (port.port_name() == Some("https") || port.port_number() == 443) {
            &self.secure_scheme
        } else {
            &self.default_scheme
        }
    }
}
