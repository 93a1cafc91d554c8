//! Textual locators of the form `scheme:apiVersion/kind/namespace/name[?key=value&...]`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Query key selecting a port by name.
pub const PORT_NAME_PARAM: &str = "port-name";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("locator has no scheme prefix (expect `scheme:apiVersion/kind/namespace/name`)")]
    MissingScheme,
    #[error("locator path is incomplete (expect apiVersion/kind/namespace/name)")]
    MissingSegments,
    #[error("locator {0} segment is empty")]
    EmptySegment(&'static str),
    #[error("invalid apiVersion `{0}` (expect v1 or group/v1)")]
    ApiVersion(String),
    #[error("malformed query parameter `{0}` (expect key=value)")]
    MalformedQuery(String),
}

/// Parsed locator. Fields are fixed at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    scheme: String,
    api_version: String,
    kind: String,
    namespace: String,
    name: String,
    query_params: BTreeMap<String, String>,
}

impl Locator {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let (scheme, rest) = text.split_once(':').ok_or(ParseError::MissingScheme)?;
        if scheme.is_empty() {
            return Err(ParseError::MissingScheme);
        }
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 4 {
            return Err(ParseError::MissingSegments);
        }
        let (gv, tail) = segments.split_at(segments.len() - 3);
        let api_version = parse_api_version(gv)?;
        let kind = non_empty(tail[0], "kind")?;
        let namespace = non_empty(tail[1], "namespace")?;
        let name = non_empty(tail[2], "name")?;

        let mut query_params = BTreeMap::new();
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            for token in query.split('&') {
                match token.split_once('=') {
                    Some((k, v)) if !k.is_empty() && !v.is_empty() => {
                        query_params.insert(k.to_string(), v.to_string());
                    }
                    _ => return Err(ParseError::MalformedQuery(token.to_string())),
                }
            }
        }

        Ok(Self {
            scheme: scheme.to_string(),
            api_version,
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            query_params,
        })
    }

    pub fn scheme(&self) -> &str { &self.scheme }
    pub fn api_version(&self) -> &str { &self.api_version }
    pub fn kind(&self) -> &str { &self.kind }
    pub fn namespace(&self) -> &str { &self.namespace }
    pub fn name(&self) -> &str { &self.name }
    pub fn query_params(&self) -> &BTreeMap<String, String> { &self.query_params }

    /// API group, empty for the core group (`v1`).
    pub fn group(&self) -> &str {
        self.api_version.split_once('/').map(|(g, _)| g).unwrap_or("")
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(String::as_str)
    }

    /// Requested port name (`?port-name=`), if any.
    pub fn port_name(&self) -> Option<&str> {
        self.query_param(PORT_NAME_PARAM)
    }
}

fn non_empty<'a>(segment: &'a str, what: &'static str) -> Result<&'a str, ParseError> {
    if segment.is_empty() {
        Err(ParseError::EmptySegment(what))
    } else {
        Ok(segment)
    }
}

fn parse_api_version(gv: &[&str]) -> Result<String, ParseError> {
    match gv {
        [version] => {
            let version = non_empty(version, "apiVersion")?;
            if !is_version(version) {
                return Err(ParseError::ApiVersion(version.to_string()));
            }
            Ok(version.to_string())
        }
        [group, version] => {
            let group = non_empty(group, "apiVersion")?;
            let version = non_empty(version, "apiVersion")?;
            if !is_version(version) {
                return Err(ParseError::ApiVersion(format!("{}/{}", group, version)));
            }
            Ok(format!("{}/{}", group, version))
        }
        _ => Err(ParseError::ApiVersion(gv.join("/"))),
    }
}

/// Kubernetes version strings: `v1`, `v2beta1`, `v1alpha3`.
fn is_version(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('v') else { return false };
    let major_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if major_len == 0 {
        return false;
    }
    let qualifier = &rest[major_len..];
    if qualifier.is_empty() {
        return true;
    }
    let Some(level) = qualifier.strip_prefix("alpha").or_else(|| qualifier.strip_prefix("beta")) else {
        return false;
    };
    !level.is_empty() && level.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for Locator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}/{}/{}", self.scheme, self.api_version, self.kind, self.namespace, self.name)?;
        for (i, (k, v)) in self.query_params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grouped_locator_with_port_name() {
        let l = Locator::parse("kubernetes:apps/v1/deployment/my-ns/my-app?port-name=my-custom-port").expect("ok");
        assert_eq!(l.scheme(), "kubernetes");
        assert_eq!(l.api_version(), "apps/v1");
        assert_eq!(l.group(), "apps");
        assert_eq!(l.kind(), "deployment");
        assert_eq!(l.namespace(), "my-ns");
        assert_eq!(l.name(), "my-app");
        assert_eq!(l.port_name(), Some("my-custom-port"));
    }

    #[test]
    fn parses_core_group_locator() {
        let l: Locator = "kubernetes:v1/service/default/web".parse().expect("ok");
        assert_eq!(l.api_version(), "v1");
        assert_eq!(l.group(), "");
        assert_eq!(l.kind(), "service");
        assert!(l.query_params().is_empty());
        assert_eq!(l.port_name(), None);
    }

    #[test]
    fn keeps_unknown_query_keys() {
        let l = Locator::parse("kubernetes:apps/v1/deployment/ns/app?zone=a&port-name=http").expect("ok");
        assert_eq!(l.query_param("zone"), Some("a"));
        assert_eq!(l.port_name(), Some("http"));
    }

    #[test]
    fn last_duplicate_query_key_wins() {
        let l = Locator::parse("kubernetes:apps/v1/deployment/ns/app?port-name=a&port-name=b").expect("ok");
        assert_eq!(l.port_name(), Some("b"));
    }

    #[test]
    fn trailing_question_mark_means_no_params() {
        let l = Locator::parse("kubernetes:apps/v1/deployment/ns/app?").expect("ok");
        assert!(l.query_params().is_empty());
    }

    #[test]
    fn display_renders_canonical_form() {
        let l = Locator::parse("kubernetes:apps/v1/deployment/ns/app?z=1&a=2").expect("ok");
        assert_eq!(l.to_string(), "kubernetes:apps/v1/deployment/ns/app?a=2&z=1");
    }

    #[test]
    fn accepts_prerelease_versions() {
        assert!(Locator::parse("kubernetes:example.io/v1beta2/widget/ns/w").is_ok());
        assert!(Locator::parse("kubernetes:v2alpha1/thing/ns/t").is_ok());
    }

    #[test]
    fn rejects_missing_scheme() {
        assert_eq!(Locator::parse("apps/v1/deployment/ns/app"), Err(ParseError::MissingScheme));
        assert_eq!(Locator::parse(":apps/v1/deployment/ns/app"), Err(ParseError::MissingScheme));
    }

    #[test]
    fn rejects_empty_segments() {
        assert_eq!(Locator::parse("kubernetes:apps/v1/deployment/ns/"), Err(ParseError::EmptySegment("name")));
        assert_eq!(Locator::parse("kubernetes:apps/v1/deployment//app"), Err(ParseError::EmptySegment("namespace")));
        assert_eq!(Locator::parse("kubernetes:apps/v1//ns/app"), Err(ParseError::EmptySegment("kind")));
        assert_eq!(Locator::parse("kubernetes:/v1/deployment/ns/app"), Err(ParseError::EmptySegment("apiVersion")));
    }

    #[test]
    fn rejects_short_or_misaligned_paths() {
        assert_eq!(Locator::parse("kubernetes:v1/service/web"), Err(ParseError::MissingSegments));
        assert_eq!(Locator::parse("kubernetes:"), Err(ParseError::MissingSegments));
        // namespace omitted: "apps" lands in the version slot
        assert_eq!(Locator::parse("kubernetes:apps/v1/deployment/app"), Err(ParseError::ApiVersion("apps".into())));
        assert!(matches!(Locator::parse("kubernetes:a/b/v1/deployment/ns/app"), Err(ParseError::ApiVersion(_))));
    }

    #[test]
    fn rejects_malformed_query() {
        assert_eq!(
            Locator::parse("kubernetes:apps/v1/deployment/ns/app?port-name"),
            Err(ParseError::MalformedQuery("port-name".into()))
        );
        assert_eq!(
            Locator::parse("kubernetes:apps/v1/deployment/ns/app?a=1&&b=2"),
            Err(ParseError::MalformedQuery(String::new()))
        );
        assert!(Locator::parse("kubernetes:apps/v1/deployment/ns/app?=x").is_err());
        assert!(Locator::parse("kubernetes:apps/v1/deployment/ns/app?port-name=").is_err());
    }
}
