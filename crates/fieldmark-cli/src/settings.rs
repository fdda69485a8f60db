//! Environment-driven sync configuration for the CLI.

use std::env;

use fieldmark_core::sync::{RemoteConfig, DEFAULT_LOCAL_CANDIDATES};
use fieldmark_core::util::normalize_text_option;

/// Backend endpoints resolved from the environment.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Remote database endpoint, when both URL and key are configured.
    pub remote: Option<RemoteConfig>,
    /// Candidate base URLs for the site-LAN fallback server.
    pub local_candidates: Vec<String>,
}

impl SyncSettings {
    pub fn from_env() -> Self {
        let remote_url = normalize_text_option(env::var("FIELDMARK_REMOTE_URL").ok());
        let api_key = normalize_text_option(env::var("FIELDMARK_REMOTE_API_KEY").ok());
        let remote = match (remote_url, api_key) {
            (Some(base_url), Some(api_key)) => Some(RemoteConfig { base_url, api_key }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Ignoring partial remote config: both FIELDMARK_REMOTE_URL and FIELDMARK_REMOTE_API_KEY are required"
                );
                None
            }
            (None, None) => None,
        };

        let local_candidates = normalize_text_option(env::var("FIELDMARK_LOCAL_PEERS").ok())
            .map_or_else(
                || {
                    DEFAULT_LOCAL_CANDIDATES
                        .iter()
                        .map(|&base| base.to_string())
                        .collect()
                },
                |raw| {
                    raw.split(',')
                        .map(|candidate| candidate.trim().to_string())
                        .filter(|candidate| !candidate.is_empty())
                        .collect()
                },
            );

        Self {
            remote,
            local_candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_candidates_cover_loopback() {
        let settings = SyncSettings {
            remote: None,
            local_candidates: DEFAULT_LOCAL_CANDIDATES
                .iter()
                .map(|&base| base.to_string())
                .collect(),
        };
        assert!(settings
            .local_candidates
            .iter()
            .any(|base| base.contains("127.0.0.1")));
    }
}
