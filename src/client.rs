//! Typed HTTP client for the route authority
//!
//! One method per remote capability; each is a single request with one
//! well-defined success or failure outcome. The authority wraps its payloads
//! in small envelopes (`{"routes": [...]}`, `{"route": {...}}`, ...) which
//! are decoded here and never leak to callers.
//!
//! A mutating method returns whatever the authority echoed for the changed
//! record, but that echo is never substituted for canonical list state; the
//! reconciliation layer re-fetches after every mutation.

use crate::config::ServerSettings;
use crate::error::RemoteError;
use crate::route::Route;
use crate::status::NginxStatus;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RoutesEnvelope {
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct GroupedEnvelope {
    routes: BTreeMap<String, Vec<Route>>,
}

#[derive(Debug, Deserialize)]
struct DomainsEnvelope {
    domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DomainConfigEnvelope {
    custom_config: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RouteEnvelope {
    route: Route,
}

/// Client for the authority's JSON-over-HTTP control surface.
#[derive(Debug, Clone)]
pub struct AuthorityClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthorityClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check the response status, turning non-2xx into the error taxonomy
    /// with the body kept as opaque diagnostic text.
    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::from_status(status.as_u16(), body, context))
    }

    async fn decode<T: DeserializeOwned>(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<T, RemoteError> {
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Transient {
            reason: format!("{}: undecodable response: {}", context, e),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, context: &str) -> Result<T, RemoteError> {
        debug!(path, "GET");
        let resp = self.http.get(self.url(path)).send().await?;
        let resp = Self::ensure_success(resp, context).await?;
        Self::decode(resp, context).await
    }

    /// All routes, in authority order.
    pub async fn list_routes(&self) -> Result<Vec<Route>, RemoteError> {
        let envelope: RoutesEnvelope = self.get_json("/routes", "list routes").await?;
        Ok(envelope.routes)
    }

    /// Routes under one domain. An unknown domain yields an empty list, not
    /// an error.
    pub async fn routes_for_domain(&self, domain: &str) -> Result<Vec<Route>, RemoteError> {
        let path = format!("/routes/{}", urlencoding::encode(domain));
        let envelope: RoutesEnvelope = self.get_json(&path, "list routes for domain").await?;
        Ok(envelope.routes)
    }

    /// All routes, grouped by domain on the authority side.
    pub async fn routes_by_domain(&self) -> Result<BTreeMap<String, Vec<Route>>, RemoteError> {
        let envelope: GroupedEnvelope = self
            .get_json("/routes_by_domain", "list routes by domain")
            .await?;
        Ok(envelope.routes)
    }

    /// Domain keys currently implied by the route table.
    pub async fn list_domains(&self) -> Result<Vec<String>, RemoteError> {
        let envelope: DomainsEnvelope = self.get_json("/domains", "list domains").await?;
        Ok(envelope.domains)
    }

    /// Domain-level custom config block. The authority answers 200 with a
    /// null config for unknown domains; that is mapped to `NotFound` so
    /// callers see one consistent signal.
    pub async fn domain_config(&self, domain: &str) -> Result<String, RemoteError> {
        let context = format!("get config for domain '{}'", domain);
        let path = format!("/domains/{}", urlencoding::encode(domain));
        let envelope: DomainConfigEnvelope = self.get_json(&path, &context).await?;
        envelope
            .custom_config
            .ok_or(RemoteError::NotFound { context })
    }

    /// Replace the domain-level custom config block.
    pub async fn update_domain_config(
        &self,
        domain: &str,
        config: &str,
    ) -> Result<(), RemoteError> {
        let path = format!("/domains/{}", urlencoding::encode(domain));
        debug!(domain, "PUT domain config");
        let resp = self
            .http
            .put(self.url(&path))
            .json(&serde_json::json!({ "config": config }))
            .send()
            .await?;
        Self::ensure_success(resp, &format!("update config for domain '{}'", domain)).await?;
        Ok(())
    }

    /// Create a route. The caller must have validated the record; `id` is
    /// ignored by the authority. The durable id comes from the follow-up
    /// re-list, which the reconciliation contract requires anyway.
    pub async fn create_route(&self, route: &Route) -> Result<Route, RemoteError> {
        debug!(domain = %route.domain, path = %route.path, "POST route");
        let resp = self
            .http
            .post(self.url("/route"))
            .json(route)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create route").await?;
        let envelope: RouteEnvelope = Self::decode(resp, "create route").await?;
        Ok(envelope.route)
    }

    /// Update an existing route, identified by `route.id`.
    pub async fn update_route(&self, route: &Route) -> Result<Route, RemoteError> {
        let context = format!("update route {}", route.id);
        debug!(id = route.id, "PUT route");
        let resp = self
            .http
            .put(self.url(&format!("/route/{}", route.id)))
            .json(route)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, &context).await?;
        let envelope: RouteEnvelope = Self::decode(resp, &context).await?;
        Ok(envelope.route)
    }

    /// Flip a route's enabled flag. Idempotent: re-sending the current state
    /// is accepted by the authority as a no-op.
    pub async fn set_route_enabled(&self, id: i64, enabled: bool) -> Result<Route, RemoteError> {
        let action = if enabled { "activate" } else { "deactivate" };
        let context = format!("{} route {}", action, id);
        debug!(id, enabled, "PUT route enabled state");
        let resp = self
            .http
            .put(self.url(&format!("/route/{}/{}", action, id)))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, &context).await?;
        let envelope: RouteEnvelope = Self::decode(resp, &context).await?;
        Ok(envelope.route)
    }

    /// Delete a route permanently.
    pub async fn delete_route(&self, id: i64) -> Result<(), RemoteError> {
        debug!(id, "DELETE route");
        let resp = self
            .http
            .delete(self.url(&format!("/route/{}", id)))
            .send()
            .await?;
        Self::ensure_success(resp, &format!("delete route {}", id)).await?;
        Ok(())
    }

    /// Ask the authority to re-attach a docker route's container to the
    /// proxy network. Used after the upstream container restarted and its
    /// address needs rediscovery. Idempotent.
    pub async fn force_reconnect(&self, id: i64) -> Result<(), RemoteError> {
        debug!(id, "PUT connect container");
        let resp = self
            .http
            .put(self.url(&format!("/connect_container/{}", id)))
            .send()
            .await?;
        Self::ensure_success(resp, &format!("reconnect container for route {}", id)).await?;
        Ok(())
    }

    /// Re-attach every docker route's container in one pass; the bulk
    /// counterpart of [`force_reconnect`](Self::force_reconnect). Idempotent.
    pub async fn reconnect_all(&self) -> Result<(), RemoteError> {
        debug!("POST connect containers");
        let resp = self
            .http
            .post(self.url("/connect_containers"))
            .send()
            .await?;
        Self::ensure_success(resp, "reconnect all containers").await?;
        Ok(())
    }

    /// Reachability check: confirms the authority is up and holds a working
    /// docker client. No payload beyond a confirmation message.
    pub async fn docker_ping(&self) -> Result<(), RemoteError> {
        debug!("GET docker client");
        let resp = self.http.get(self.url("/docker_client")).send().await?;
        Self::ensure_success(resp, "ping docker client").await?;
        Ok(())
    }

    /// Have the authority re-check every docker upstream, deactivating
    /// routes whose container is gone or detached from the network.
    pub async fn verify_backends(&self) -> Result<(), RemoteError> {
        debug!("POST verify dockers");
        let resp = self.http.post(self.url("/verify_dockers")).send().await?;
        Self::ensure_success(resp, "verify backends").await?;
        Ok(())
    }

    /// Run state of the proxy container.
    pub async fn nginx_status(&self) -> Result<NginxStatus, RemoteError> {
        self.get_json("/nginx_status", "get nginx status").await
    }

    /// Regenerate the full nginx configuration from the current route and
    /// domain records and reload the proxy. A single blocking call with no
    /// partial-success state; it can take observably longer than the rest.
    pub async fn apply_and_reload(&self) -> Result<(), RemoteError> {
        debug!("POST update nginx config");
        let resp = self
            .http
            .post(self.url("/update_nginx_config"))
            .send()
            .await?;
        Self::ensure_success(resp, "apply and reload").await?;
        Ok(())
    }

    /// The authority's static configuration.
    pub async fn server_settings(&self) -> Result<ServerSettings, RemoteError> {
        self.get_json("/config", "get server settings").await
    }
}
