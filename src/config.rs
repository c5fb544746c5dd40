//! Client configuration and the authority's static settings
//!
//! [`ClientConfig`] is this tool's own configuration (where the authority
//! lives, request timeout), loaded from `~/.routectl/config.toml` with
//! environment overrides. [`ServerSettings`] is a read-only model of what
//! `GET /config` returns: the authority's docker and nginx settings, useful
//! for operators inspecting the deployment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Local configuration for the routectl client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the route authority.
    pub api_url: String,

    /// Per-request timeout in seconds. `apply_and_reload` can legitimately
    /// take longer than ordinary calls; a timeout there does not mean the
    /// reload failed server-side.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Default config file location: `~/.routectl/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".routectl").join("config.toml"))
    }

    /// Load from a TOML file. A missing file is not an error; defaults apply.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the effective config: file (if any), then environment
    /// overrides `ROUTECTL_API_URL` and `ROUTECTL_TIMEOUT_SECS`.
    pub fn resolve() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("ROUTECTL_API_URL") {
            if !url.is_empty() {
                config.api_url = url;
            }
        }
        if let Ok(secs) = std::env::var("ROUTECTL_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.timeout_secs = secs;
            }
        }

        Ok(config)
    }
}

/// Docker connection settings on the authority side.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerSettings {
    pub base_url: String,
    /// Shared network the proxy and route containers are attached to.
    pub network: String,
}

/// Nginx render/reload settings on the authority side.
#[derive(Debug, Clone, Deserialize)]
pub struct NginxSettings {
    /// Container running the proxy daemon.
    pub container_id: String,
    pub static_path: String,
    pub config_path: String,
    pub docker_config_file: String,
    pub config_warn_message: String,
    pub private_key_path: String,
    pub certificate_path: String,
    pub letsencrypt_path: String,
}

/// The authority's static configuration, as returned by `GET /config`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub docker: DockerSettings,
    pub nginx: NginxSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let config = ClientConfig::load(Path::new("/nonexistent/routectl.toml")).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config: ClientConfig = toml::from_str(r#"api_url = "http://proxy:9000""#).unwrap();
        assert_eq!(config.api_url, "http://proxy:9000");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn server_settings_decode() {
        // config_warn_message is an nginx comment line, so the literal
        // needs the wider raw-string delimiter.
        let json = r##"{
            "docker": {"base_url": "unix:///var/run/docker.sock", "network": "proxy-net"},
            "nginx": {
                "container_id": "nginx-1",
                "static_path": "/srv/static",
                "config_path": "/etc/nginx/conf.d",
                "docker_config_file": "/etc/nginx/conf.d/docker.conf",
                "config_warn_message": "# managed, do not edit",
                "private_key_path": "/etc/ssl/key.pem",
                "certificate_path": "/etc/ssl/cert.pem",
                "letsencrypt_path": "/etc/letsencrypt"
            }
        }"##;
        let settings: ServerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.docker.network, "proxy-net");
        assert_eq!(settings.nginx.container_id, "nginx-1");
        assert_eq!(settings.nginx.config_warn_message, "# managed, do not edit");
    }
}
