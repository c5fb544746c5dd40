//! routectl - control-surface client for an nginx route authority
//!
//! This library drives a remote authority that owns a table of routes
//! (domain + path mapped to a docker container or a static file tree),
//! renders the actual nginx configuration from it, and reloads the proxy. It
//! provides:
//! - A typed route model with a tagged upstream union and a flat wire form
//! - Local, variant-aware validation run before any submission
//! - One HTTP operation per remote capability, with a small error taxonomy
//! - Reconciliation that re-fetches canonical state after every mutation
//! - A proxy-status view with a restart-and-converge operation

pub mod client;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod route;
pub mod status;
pub mod validate;

pub use client::AuthorityClient;
pub use reconcile::Workspace;
pub use route::{ProxyType, Route, Upstream};
