//! Variant-aware validation for route edits
//!
//! Runs entirely locally, before anything is submitted. The editable form is
//! a flat [`RouteDraft`] holding both variants' fields at once (an operator
//! can flip the proxy type back and forth without losing input); only the
//! fields belonging to the *current* proxy type participate in validation,
//! so stale input for the other variant never produces errors.

use crate::route::{ProxyType, Route, Upstream};
use std::collections::BTreeSet;
use thiserror::Error;

/// A field that can be reported missing by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Path,
    ContactUser,
    ProjectName,
    ContainerId,
    Port,
    StaticPath,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Path => "path",
            Field::ContactUser => "contact_user",
            Field::ProjectName => "project_name",
            Field::ContainerId => "container_id",
            Field::Port => "port",
            Field::StaticPath => "static_path",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of validating a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid { missing: BTreeSet<Field> },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Validation failure carrying the offending field set. Local only; never
/// constructed from a server response and never sent over the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing or invalid fields: {}", format_fields(.missing))]
pub struct ValidationError {
    pub missing: BTreeSet<Field>,
}

fn format_fields(fields: &BTreeSet<Field>) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The flat, editable form of a route. All variant fields are present so an
/// editor can keep input across a proxy-type switch.
#[derive(Debug, Clone)]
pub struct RouteDraft {
    pub domain: String,
    pub path: String,
    pub proxy_type: ProxyType,
    pub container_id: String,
    pub port: Option<u16>,
    pub target_path: String,
    pub static_path: String,
    pub custom_config: String,
    pub description: String,
    pub project_name: String,
    pub contact_user: String,
}

impl Default for RouteDraft {
    fn default() -> Self {
        Self {
            domain: String::new(),
            path: "/".to_string(),
            proxy_type: ProxyType::Docker,
            container_id: String::new(),
            port: None,
            target_path: String::new(),
            static_path: String::new(),
            custom_config: String::new(),
            description: String::new(),
            project_name: String::new(),
            contact_user: String::new(),
        }
    }
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Validate a draft against the rules for its current proxy type.
///
/// Deterministic and total; no I/O. `domain` may be empty (no-domain routes
/// match regardless of host) and is never reported missing.
pub fn validate(draft: &RouteDraft) -> ValidationResult {
    let mut missing = BTreeSet::new();

    if blank(&draft.path) {
        missing.insert(Field::Path);
    }
    if blank(&draft.contact_user) {
        missing.insert(Field::ContactUser);
    }
    if blank(&draft.project_name) {
        missing.insert(Field::ProjectName);
    }

    match draft.proxy_type {
        ProxyType::Docker => {
            if blank(&draft.container_id) {
                missing.insert(Field::ContainerId);
            }
            match draft.port {
                Some(p) if p > 0 => {}
                _ => {
                    missing.insert(Field::Port);
                }
            }
        }
        ProxyType::Static => {
            if blank(&draft.static_path) {
                missing.insert(Field::StaticPath);
            }
        }
    }

    if missing.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid { missing }
    }
}

fn none_if_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

impl RouteDraft {
    /// Draft pre-filled from an existing route, for edits.
    pub fn from_route(route: &Route) -> Self {
        let mut draft = RouteDraft {
            domain: route.domain.clone(),
            path: route.path.clone(),
            proxy_type: route.upstream.proxy_type(),
            custom_config: route.custom_config.clone().unwrap_or_default(),
            description: route.description.clone().unwrap_or_default(),
            project_name: route.project_name.clone().unwrap_or_default(),
            contact_user: route.contact_user.clone().unwrap_or_default(),
            ..Default::default()
        };
        match &route.upstream {
            Upstream::Docker {
                container_id,
                port,
                target_path,
            } => {
                draft.container_id = container_id.clone();
                draft.port = Some(*port);
                draft.target_path = target_path.clone();
            }
            Upstream::Static { static_path } => {
                draft.static_path = static_path.clone();
            }
        }
        draft
    }

    /// Convert a valid draft into a submittable route with `id = 0` and
    /// `enabled = true` (the creation defaults). Fails with the missing
    /// field set otherwise.
    pub fn build(self) -> Result<Route, ValidationError> {
        match validate(&self) {
            ValidationResult::Valid => {}
            ValidationResult::Invalid { missing } => return Err(ValidationError { missing }),
        }

        let upstream = match self.proxy_type {
            ProxyType::Docker => Upstream::Docker {
                container_id: self.container_id,
                // Checked non-zero by validate() above.
                port: self.port.unwrap_or(0),
                target_path: if blank(&self.target_path) {
                    "/".to_string()
                } else {
                    self.target_path
                },
            },
            ProxyType::Static => Upstream::Static {
                static_path: self.static_path,
            },
        };

        Ok(Route {
            id: 0,
            domain: self.domain,
            path: self.path,
            upstream,
            enabled: true,
            custom_config: none_if_blank(self.custom_config),
            description: none_if_blank(self.description),
            project_name: none_if_blank(self.project_name),
            contact_user: none_if_blank(self.contact_user),
            info: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docker_draft() -> RouteDraft {
        RouteDraft {
            path: "/api".to_string(),
            proxy_type: ProxyType::Docker,
            container_id: "web-1".to_string(),
            port: Some(8080),
            project_name: "demo".to_string(),
            contact_user: "ops".to_string(),
            ..Default::default()
        }
    }

    fn static_draft() -> RouteDraft {
        RouteDraft {
            path: "/app".to_string(),
            proxy_type: ProxyType::Static,
            static_path: "/var/www".to_string(),
            project_name: "p".to_string(),
            contact_user: "a".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn docker_valid_iff_container_and_port_present() {
        assert!(validate(&docker_draft()).is_valid());

        let mut d = docker_draft();
        d.container_id = String::new();
        assert_eq!(
            validate(&d),
            ValidationResult::Invalid {
                missing: [Field::ContainerId].into_iter().collect()
            }
        );

        let mut d = docker_draft();
        d.port = None;
        assert_eq!(
            validate(&d),
            ValidationResult::Invalid {
                missing: [Field::Port].into_iter().collect()
            }
        );

        let mut d = docker_draft();
        d.port = Some(0);
        assert!(!validate(&d).is_valid());
    }

    #[test]
    fn static_valid_iff_static_path_present() {
        assert!(validate(&static_draft()).is_valid());

        let mut d = static_draft();
        d.static_path = "   ".to_string();
        assert_eq!(
            validate(&d),
            ValidationResult::Invalid {
                missing: [Field::StaticPath].into_iter().collect()
            }
        );
    }

    #[test]
    fn common_fields_required_for_both_variants() {
        for mut d in [docker_draft(), static_draft()] {
            d.path = String::new();
            d.project_name = String::new();
            d.contact_user = String::new();
            match validate(&d) {
                ValidationResult::Invalid { missing } => {
                    assert!(missing.contains(&Field::Path));
                    assert!(missing.contains(&Field::ProjectName));
                    assert!(missing.contains(&Field::ContactUser));
                }
                ValidationResult::Valid => panic!("expected invalid"),
            }
        }
    }

    #[test]
    fn empty_domain_is_never_an_error() {
        let mut d = docker_draft();
        d.domain = String::new();
        assert!(validate(&d).is_valid());
    }

    #[test]
    fn switching_variant_drops_stale_errors() {
        // Docker fields never filled in, then the operator switches to
        // static: the docker gaps must not leak into the result.
        let mut d = static_draft();
        d.container_id = String::new();
        d.port = None;
        assert!(validate(&d).is_valid());

        // And the other way round: garbage static_path on a docker draft.
        let mut d = docker_draft();
        d.static_path = String::new();
        assert!(validate(&d).is_valid());
    }

    #[test]
    fn build_applies_creation_defaults() {
        let route = docker_draft().build().unwrap();
        assert_eq!(route.id, 0);
        assert!(route.enabled);
        assert_eq!(route.custom_config, None);
        match route.upstream {
            Upstream::Docker { target_path, .. } => assert_eq!(target_path, "/"),
            _ => panic!("expected docker upstream"),
        }
    }

    #[test]
    fn build_rejects_invalid_draft() {
        let mut d = docker_draft();
        d.port = None;
        let err = d.build().unwrap_err();
        assert!(err.missing.contains(&Field::Port));
    }

    #[test]
    fn draft_round_trips_through_route() {
        let route = static_draft().build().unwrap();
        let draft = RouteDraft::from_route(&route);
        assert_eq!(draft.static_path, "/var/www");
        assert_eq!(draft.proxy_type, ProxyType::Static);
        assert!(validate(&draft).is_valid());
    }
}
