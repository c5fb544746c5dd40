//! Route entity model and its derived views
//!
//! A route maps a domain + path prefix to an upstream: either a running
//! docker container or a static file tree. Internally the upstream is a
//! tagged union so each variant carries only its own required fields; at the
//! wire boundary the union is flattened into an object with nullable variant
//! fields, which is what the authority speaks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of upstream a route targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    Docker,
    Static,
}

impl std::fmt::Display for ProxyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyType::Docker => write!(f, "docker"),
            ProxyType::Static => write!(f, "static"),
        }
    }
}

/// Variant-specific upstream configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// Proxy to a running container on the shared docker network.
    Docker {
        container_id: String,
        port: u16,
        /// Path rewritten inside the container. Defaults to "/".
        target_path: String,
    },
    /// Serve a file tree visible to the proxy process.
    Static { static_path: String },
}

impl Upstream {
    pub fn proxy_type(&self) -> ProxyType {
        match self {
            Upstream::Docker { .. } => ProxyType::Docker,
            Upstream::Static { .. } => ProxyType::Static,
        }
    }
}

/// A single routing entry as held by the remote authority.
///
/// `id` is 0 before creation; the authority assigns a durable id. `info` is
/// authority-derived (health annotations) and read-only from this side. The
/// client never patches a `Route` locally and trusts it as canonical; after
/// any mutation the list is re-fetched (see [`crate::reconcile`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RouteWire", try_from = "RouteWire")]
pub struct Route {
    pub id: i64,
    /// Empty string means "match regardless of host".
    pub domain: String,
    /// Match prefix within the domain's namespace. Never empty.
    pub path: String,
    pub upstream: Upstream,
    pub enabled: bool,
    /// Free-text lines appended verbatim into the generated location block.
    /// Syntax is the authority's concern, not validated here.
    pub custom_config: Option<String>,
    pub description: Option<String>,
    pub project_name: Option<String>,
    pub contact_user: Option<String>,
    /// Authority-derived annotation (e.g. "OK", "Manually deactivated").
    pub info: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Flat transport form of a route: the tagged union is spread into nullable
/// variant fields for compatibility with the authority's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteWire {
    #[serde(default)]
    pub id: i64,
    pub proxy_type: ProxyType,
    #[serde(default)]
    pub domain: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_path: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl From<Route> for RouteWire {
    fn from(route: Route) -> Self {
        let proxy_type = route.upstream.proxy_type();
        let (container_id, port, target_path, static_path) = match route.upstream {
            Upstream::Docker {
                container_id,
                port,
                target_path,
            } => (Some(container_id), Some(port), Some(target_path), None),
            Upstream::Static { static_path } => (None, None, None, Some(static_path)),
        };

        RouteWire {
            id: route.id,
            proxy_type,
            domain: route.domain,
            path: route.path,
            container_id,
            port,
            target_path,
            static_path,
            enabled: route.enabled,
            custom_config: route.custom_config,
            description: route.description,
            project_name: route.project_name,
            contact_user: route.contact_user,
            info: route.info,
        }
    }
}

impl TryFrom<RouteWire> for Route {
    type Error = String;

    fn try_from(wire: RouteWire) -> Result<Self, Self::Error> {
        let upstream = match wire.proxy_type {
            ProxyType::Docker => {
                let container_id = wire
                    .container_id
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| format!("docker route {} has no container_id", wire.id))?;
                let port = wire
                    .port
                    .filter(|p| *p > 0)
                    .ok_or_else(|| format!("docker route {} has no port", wire.id))?;
                let target_path = match wire.target_path {
                    Some(t) if !t.is_empty() => t,
                    _ => "/".to_string(),
                };
                Upstream::Docker {
                    container_id,
                    port,
                    target_path,
                }
            }
            ProxyType::Static => {
                let static_path = wire
                    .static_path
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| format!("static route {} has no static_path", wire.id))?;
                Upstream::Static { static_path }
            }
        };

        Ok(Route {
            id: wire.id,
            domain: wire.domain,
            path: wire.path,
            upstream,
            enabled: wire.enabled,
            custom_config: wire.custom_config,
            description: wire.description,
            project_name: wire.project_name,
            contact_user: wire.contact_user,
            info: wire.info,
        })
    }
}

/// Partition routes by domain, preserving authority order within each domain.
///
/// Domain is not a stored entity on this side; it is always derived from the
/// route collection so there is no second table to drift out of sync.
pub fn group_by_domain(routes: &[Route]) -> BTreeMap<String, Vec<Route>> {
    let mut groups: BTreeMap<String, Vec<Route>> = BTreeMap::new();
    for route in routes {
        groups
            .entry(route.domain.clone())
            .or_default()
            .push(route.clone());
    }
    groups
}

/// Conjunctive, case-insensitive substring filter over domain and path.
/// An empty needle matches everything.
pub fn filter_routes<'a>(routes: &'a [Route], domain: &str, path: &str) -> Vec<&'a Route> {
    let domain_needle = domain.to_lowercase();
    let path_needle = path.to_lowercase();
    routes
        .iter()
        .filter(|r| {
            r.domain.to_lowercase().contains(&domain_needle)
                && r.path.to_lowercase().contains(&path_needle)
        })
        .collect()
}

/// Precedence order for routes whose paths may overlap within one domain
/// (including the no-domain group): longest path wins, ties broken by
/// ascending id so earlier-created routes stay ahead.
pub fn match_order(routes: &[Route]) -> Vec<&Route> {
    let mut ordered: Vec<&Route> = routes.iter().collect();
    ordered.sort_by(|a, b| {
        b.path
            .len()
            .cmp(&a.path.len())
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docker_route(id: i64, domain: &str, path: &str) -> Route {
        Route {
            id,
            domain: domain.to_string(),
            path: path.to_string(),
            upstream: Upstream::Docker {
                container_id: "web-1".to_string(),
                port: 8080,
                target_path: "/".to_string(),
            },
            enabled: true,
            custom_config: None,
            description: None,
            project_name: Some("demo".to_string()),
            contact_user: Some("ops".to_string()),
            info: None,
        }
    }

    #[test]
    fn wire_round_trip_docker() {
        let route = docker_route(3, "example.com", "/api");
        let json = serde_json::to_string(&route).unwrap();
        let back: Route = serde_json::from_str(&json).unwrap();
        assert_eq!(route, back);
    }

    #[test]
    fn wire_round_trip_static() {
        let route = Route {
            id: 7,
            domain: String::new(),
            path: "/docs".to_string(),
            upstream: Upstream::Static {
                static_path: "/var/www/docs".to_string(),
            },
            enabled: false,
            custom_config: Some("autoindex on;".to_string()),
            description: None,
            project_name: None,
            contact_user: None,
            info: Some("Manually deactivated".to_string()),
        };
        let json = serde_json::to_string(&route).unwrap();
        assert!(!json.contains("container_id"));
        let back: Route = serde_json::from_str(&json).unwrap();
        assert_eq!(route, back);
    }

    #[test]
    fn wire_decode_fills_defaults() {
        // Minimal payload as the authority stores it: id absent pre-creation,
        // enabled defaulting to true, target_path defaulting to "/".
        let json = r#"{
            "proxy_type": "docker",
            "path": "/app",
            "container_id": "c1",
            "port": 3000
        }"#;
        let route: Route = serde_json::from_str(json).unwrap();
        assert_eq!(route.id, 0);
        assert!(route.enabled);
        assert_eq!(route.domain, "");
        match route.upstream {
            Upstream::Docker { target_path, .. } => assert_eq!(target_path, "/"),
            _ => panic!("expected docker upstream"),
        }
    }

    #[test]
    fn wire_decode_rejects_incomplete_variant() {
        let json = r#"{"proxy_type": "docker", "path": "/app", "port": 3000}"#;
        assert!(serde_json::from_str::<Route>(json).is_err());

        let json = r#"{"proxy_type": "static", "path": "/app"}"#;
        assert!(serde_json::from_str::<Route>(json).is_err());
    }

    #[test]
    fn grouping_preserves_order_within_domain() {
        let routes = vec![
            docker_route(1, "a.test", "/one"),
            docker_route(2, "b.test", "/x"),
            docker_route(3, "a.test", "/two"),
        ];
        let groups = group_by_domain(&routes);
        let a: Vec<&str> = groups["a.test"].iter().map(|r| r.path.as_str()).collect();
        assert_eq!(a, vec!["/one", "/two"]);
        assert_eq!(groups["b.test"].len(), 1);
    }

    #[test]
    fn filter_is_conjunctive_and_case_insensitive() {
        let routes = vec![
            docker_route(1, "api.example.com", "/v1"),
            docker_route(2, "www.example.com", "/v1"),
            docker_route(3, "API.other.net", "/admin"),
        ];

        let hits = filter_routes(&routes, "api", "");
        let ids: Vec<i64> = hits.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let hits = filter_routes(&routes, "api", "/v1");
        let ids: Vec<i64> = hits.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);

        // Empty needles match everything.
        assert_eq!(filter_routes(&routes, "", "").len(), 3);
    }

    #[test]
    fn match_order_prefers_longest_path_then_creation_order() {
        let routes = vec![
            docker_route(5, "", "/app"),
            docker_route(2, "", "/app/static"),
            docker_route(9, "", "/api"),
        ];
        let ordered: Vec<i64> = match_order(&routes).iter().map(|r| r.id).collect();
        // "/app/static" is longest; "/app" and "/api" tie on length, so the
        // older route (id 5) comes first.
        assert_eq!(ordered, vec![2, 5, 9]);
    }
}
