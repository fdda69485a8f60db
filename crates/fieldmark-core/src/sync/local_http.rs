//! Local-network fallback adapter.
//!
//! When the remote database is unreachable, a fieldmark-server instance on
//! the site LAN can still relay markings between devices. Candidate base
//! URLs are probed strictly one at a time with a short timeout; the first
//! one answering with a well-formed payload wins and later candidates are
//! never contacted, so a slow loser can't inject a second merge.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;

use crate::error::{Error, Result};
use crate::models::Marking;
use crate::util::{compact_text, normalize_base_url};
use crate::works::group_by_work_order;

use super::adapter::BackendAdapter;
use super::protocol::{MarkingsEnvelope, SyncPayload, SyncRequest, SyncResponse};

const LOCAL_HTTP_TIMEOUT_SECS: u64 = 2;

/// Default probe order for a site-LAN server.
pub const DEFAULT_LOCAL_CANDIDATES: &[&str] =
    &["http://127.0.0.1:8787", "http://localhost:8787"];

/// Site-LAN [`BackendAdapter`] over a small fixed candidate list.
pub struct LocalHttpAdapter {
    candidates: Vec<String>,
    client: reqwest::Client,
    /// Base URL that answered most recently; probed first next time.
    active: Mutex<Option<String>>,
}

impl LocalHttpAdapter {
    pub fn new(candidates: &[String]) -> Result<Self> {
        let candidates: Vec<String> = candidates
            .iter()
            .filter_map(|raw| normalize_base_url(raw))
            .collect();
        if candidates.is_empty() {
            return Err(Error::InvalidInput(
                "At least one http(s) candidate URL is required".to_string(),
            ));
        }

        Ok(Self {
            candidates,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(LOCAL_HTTP_TIMEOUT_SECS))
                .build()?,
            active: Mutex::new(None),
        })
    }

    /// Adapter over [`DEFAULT_LOCAL_CANDIDATES`].
    pub fn with_default_candidates() -> Result<Self> {
        let candidates: Vec<String> = DEFAULT_LOCAL_CANDIDATES
            .iter()
            .map(|&base| base.to_string())
            .collect();
        Self::new(&candidates)
    }

    /// Candidate list with the most recently responsive base URL first.
    fn probe_order(&self) -> Vec<String> {
        let active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let mut order = Vec::with_capacity(self.candidates.len());
        if let Some(preferred) = active {
            order.push(preferred);
        }
        for candidate in &self.candidates {
            if !order.contains(candidate) {
                order.push(candidate.clone());
            }
        }
        order
    }

    fn remember_active(&self, base: &str) {
        *self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(base.to_string());
    }

    /// Try candidates in order, returning the first usable collection.
    async fn probe(&self) -> Result<(String, Vec<Marking>)> {
        for base in self.probe_order() {
            match self.fetch_markings(&base).await {
                Ok(markings) => {
                    self.remember_active(&base);
                    return Ok((base, markings));
                }
                Err(error) => {
                    tracing::debug!(candidate = %base, %error, "Local server candidate not usable");
                }
            }
        }
        Err(Error::Unavailable(
            "no local fallback server responded".to_string(),
        ))
    }

    async fn fetch_markings(&self, base: &str) -> Result<Vec<Marking>> {
        let response = self
            .client
            .get(format!("{base}/api/markings"))
            .send()
            .await?;
        let envelope: MarkingsEnvelope = Self::parse_json(response).await?;
        if !envelope.success {
            return Err(Error::Payload(
                "local server reported success=false".to_string(),
            ));
        }
        Ok(envelope.markings)
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: compact_text(&body),
            });
        }
        serde_json::from_str(&body)
            .map_err(|error| Error::Payload(format!("{error}: {}", compact_text(&body))))
    }
}

#[async_trait]
impl BackendAdapter for LocalHttpAdapter {
    fn name(&self) -> &'static str {
        "local-server"
    }

    async fn load(&self) -> Result<Vec<Marking>> {
        let (_, markings) = self.probe().await?;
        Ok(markings)
    }

    async fn save(&self, markings: &[Marking]) -> Result<()> {
        let (base, _) = self.probe().await?;
        let request = SyncRequest {
            data: SyncPayload {
                works: group_by_work_order(markings),
                markings: markings.to_vec(),
            },
        };

        let response = self
            .client
            .post(format!("{base}/api/sync"))
            .json(&request)
            .send()
            .await?;
        let reply: SyncResponse = Self::parse_json(response).await?;
        if !reply.success {
            return Err(Error::Payload(
                "local server rejected sync payload".to_string(),
            ));
        }
        tracing::debug!(
            markings = reply.stats.markings,
            works = reply.stats.works,
            "Local server accepted sync payload"
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let (base, _) = self.probe().await?;
        let response = self
            .client
            .delete(format!("{base}/api/markings/{id}"))
            .send()
            .await?;
        Self::parse_json::<super::protocol::DeleteResponse>(response).await?;
        Ok(())
    }
}
