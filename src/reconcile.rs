//! Reconciliation: canonical state always comes from a re-fetch
//!
//! Each logical view (route list, domain list, proxy status) owns an
//! independent refresh cycle. Every successful mutation is followed by a
//! refresh of the views it can affect before the state is considered
//! settled; the mutation's echoed payload is never substituted for list
//! state, since the authority applies side effects beyond the echo (derived
//! `info` annotations, implicit domain creation, ordering).
//!
//! Failure policy, enforced here once instead of per call site: a failed
//! refresh keeps the previous good snapshot (stale-but-available) and
//! records the error; a failed mutation is returned to the caller and no
//! refresh is attempted.

use crate::client::AuthorityClient;
use crate::error::RemoteError;
use crate::route::Route;
use crate::status::NginxStatus;
use crate::validate::{RouteDraft, ValidationError};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Error from a workspace mutation: either the draft never left the client,
/// or the remote call failed.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// What a refresh request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fetched and replaced the snapshot.
    Refreshed,
    /// Fetch failed; the previous snapshot (if any) is kept.
    Failed,
    /// A refresh for this view was already outstanding; this one was skipped.
    InFlight,
}

/// Point-in-time state of one view.
#[derive(Debug, Clone)]
pub struct ViewSnapshot<T> {
    /// Last successfully fetched data. Survives failed refreshes.
    pub data: Option<T>,
    pub refreshing: bool,
    /// Error from the most recent refresh, cleared on the next success.
    pub last_error: Option<String>,
}

impl<T> Default for ViewSnapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            refreshing: false,
            last_error: None,
        }
    }
}

/// A single view's snapshot holder with an in-flight guard.
///
/// Refreshes for one view are strictly sequential: a refresh requested while
/// another is outstanding is skipped rather than queued. Views are
/// independent of each other; there is no cross-view locking.
pub struct View<T> {
    state: RwLock<ViewSnapshot<T>>,
    in_flight: AtomicBool,
}

impl<T: Clone> View<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ViewSnapshot::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> ViewSnapshot<T> {
        self.state.read().await.clone()
    }

    /// Run `fetch` and fold its result into the snapshot.
    pub async fn refresh<F, Fut>(&self, fetch: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Refresh already in flight, skipping");
            return RefreshOutcome::InFlight;
        }

        self.state.write().await.refreshing = true;
        let result = fetch().await;

        let mut state = self.state.write().await;
        state.refreshing = false;
        let outcome = match result {
            Ok(data) => {
                state.data = Some(data);
                state.last_error = None;
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                // Keep the stale snapshot; only record the failure.
                warn!(error = %e, "View refresh failed, keeping previous snapshot");
                state.last_error = Some(e.to_string());
                RefreshOutcome::Failed
            }
        };
        drop(state);

        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }
}

impl<T: Clone> Default for View<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The client-side working set: one authority client plus the three views,
/// with every mutation wired to its follow-up refreshes.
pub struct Workspace {
    client: AuthorityClient,
    pub routes: View<Vec<Route>>,
    pub domains: View<Vec<String>>,
    pub status: View<NginxStatus>,
}

impl Workspace {
    pub fn new(client: AuthorityClient) -> Self {
        Self {
            client,
            routes: View::new(),
            domains: View::new(),
            status: View::new(),
        }
    }

    pub fn client(&self) -> &AuthorityClient {
        &self.client
    }

    pub async fn refresh_routes(&self) -> RefreshOutcome {
        self.routes
            .refresh(|| async { self.client.list_routes().await })
            .await
    }

    pub async fn refresh_domains(&self) -> RefreshOutcome {
        self.domains
            .refresh(|| async { self.client.list_domains().await })
            .await
    }

    pub async fn refresh_status(&self) -> RefreshOutcome {
        self.status
            .refresh(|| async { self.client.nginx_status().await })
            .await
    }

    /// Validate and create a route, then re-fetch routes and domains (a
    /// create can introduce a new domain key).
    pub async fn create_route(&self, draft: RouteDraft) -> Result<Route, WorkspaceError> {
        let route = draft.build()?;
        let created = self.client.create_route(&route).await?;
        info!(domain = %created.domain, path = %created.path, "Route created");
        self.refresh_routes().await;
        self.refresh_domains().await;
        Ok(created)
    }

    /// Update an existing route, then re-fetch routes and domains (the
    /// domain key may have changed).
    pub async fn update_route(&self, route: &Route) -> Result<Route, WorkspaceError> {
        let updated = self.client.update_route(route).await?;
        info!(id = route.id, "Route updated");
        self.refresh_routes().await;
        self.refresh_domains().await;
        Ok(updated)
    }

    pub async fn set_route_enabled(&self, id: i64, enabled: bool) -> Result<Route, WorkspaceError> {
        let route = self.client.set_route_enabled(id, enabled).await?;
        info!(id, enabled, "Route enabled state changed");
        self.refresh_routes().await;
        Ok(route)
    }

    /// Delete a route permanently, then re-fetch routes and domains (the
    /// last route of a domain takes the domain key with it).
    pub async fn delete_route(&self, id: i64) -> Result<(), WorkspaceError> {
        self.client.delete_route(id).await?;
        info!(id, "Route deleted");
        self.refresh_routes().await;
        self.refresh_domains().await;
        Ok(())
    }

    pub async fn force_reconnect(&self, id: i64) -> Result<(), WorkspaceError> {
        self.client.force_reconnect(id).await?;
        info!(id, "Container reconnect requested");
        self.refresh_routes().await;
        Ok(())
    }

    /// Bulk counterpart of [`force_reconnect`](Self::force_reconnect):
    /// re-attach every docker route's container.
    pub async fn reconnect_all(&self) -> Result<(), WorkspaceError> {
        self.client.reconnect_all().await?;
        info!("Bulk container reconnect requested");
        self.refresh_routes().await;
        Ok(())
    }

    pub async fn update_domain_config(
        &self,
        domain: &str,
        config: &str,
    ) -> Result<(), WorkspaceError> {
        self.client.update_domain_config(domain, config).await?;
        info!(domain, "Domain config updated");
        self.refresh_domains().await;
        Ok(())
    }

    pub async fn verify_backends(&self) -> Result<(), WorkspaceError> {
        self.client.verify_backends().await?;
        info!("Backend verification requested");
        self.refresh_routes().await;
        Ok(())
    }

    /// Regenerate and reload the proxy configuration, then converge: the
    /// status view is re-fetched exactly once regardless of the reload's
    /// outcome, and the route list is re-fetched because a reload can change
    /// which routes are considered healthy. The reload's own result is
    /// reported to the caller untouched.
    pub async fn restart_proxy(&self) -> Result<(), RemoteError> {
        let result = self.client.apply_and_reload().await;
        if let Err(ref e) = result {
            warn!(error = %e, "Apply-and-reload reported failure");
        } else {
            info!("Proxy configuration regenerated and reloaded");
        }
        self.refresh_status().await;
        self.refresh_routes().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn refresh_replaces_snapshot_on_success() {
        let view: View<Vec<i32>> = View::new();
        assert!(view.snapshot().await.data.is_none());

        let outcome = view.refresh(|| async { Ok(vec![1, 2]) }).await;
        assert_eq!(outcome, RefreshOutcome::Refreshed);

        let snap = view.snapshot().await;
        assert_eq!(snap.data, Some(vec![1, 2]));
        assert!(!snap.refreshing);
        assert!(snap.last_error.is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_data() {
        let view: View<Vec<i32>> = View::new();
        view.refresh(|| async { Ok(vec![7]) }).await;

        let outcome = view
            .refresh(|| async {
                Err(RemoteError::Transient {
                    reason: "connection refused".to_string(),
                })
            })
            .await;
        assert_eq!(outcome, RefreshOutcome::Failed);

        let snap = view.snapshot().await;
        assert_eq!(snap.data, Some(vec![7]));
        let err = snap.last_error.expect("error recorded");
        assert!(err.contains("connection refused"));
    }

    #[tokio::test]
    async fn next_success_clears_recorded_error() {
        let view: View<i32> = View::new();
        view.refresh(|| async {
            Err(RemoteError::Transient {
                reason: "down".to_string(),
            })
        })
        .await;
        assert!(view.snapshot().await.last_error.is_some());

        view.refresh(|| async { Ok(5) }).await;
        let snap = view.snapshot().await;
        assert_eq!(snap.data, Some(5));
        assert!(snap.last_error.is_none());
    }

    #[tokio::test]
    async fn concurrent_refresh_is_suppressed() {
        let view: Arc<View<i32>> = Arc::new(View::new());
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicU32::new(0));

        let first = {
            let view = Arc::clone(&view);
            let gate = Arc::clone(&gate);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                view.refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    Ok(1)
                })
                .await
            })
        };

        // Wait until the first fetch is actually running.
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second = view
            .refresh(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .await;
        assert_eq!(second, RefreshOutcome::InFlight);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), RefreshOutcome::Refreshed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.snapshot().await.data, Some(1));
    }

    #[tokio::test]
    async fn refresh_allowed_again_after_completion() {
        let view: View<i32> = View::new();
        assert_eq!(
            view.refresh(|| async { Ok(1) }).await,
            RefreshOutcome::Refreshed
        );
        assert_eq!(
            view.refresh(|| async { Ok(2) }).await,
            RefreshOutcome::Refreshed
        );
        assert_eq!(view.snapshot().await.data, Some(2));
    }
}
