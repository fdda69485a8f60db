//! Remote database adapter.
//!
//! Talks to the hosted store through its REST surface: a `markings` table
//! upserted by `id` (last-write-wins at the storage layer as well) and a
//! `device_locations` table upserted by `device_id`. Both are consumed only
//! through the abstract load/save/delete and publish/recent contracts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{DeviceLocation, Marking};
use crate::presence::PresenceStore;
use crate::util::{compact_text, normalize_base_url};

use super::adapter::BackendAdapter;

const REMOTE_HTTP_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the remote store.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Remote-database-backed [`BackendAdapter`] and [`PresenceStore`].
pub struct RemoteStoreAdapter {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for RemoteStoreAdapter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteStoreAdapter")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl RemoteStoreAdapter {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url).ok_or_else(|| {
            Error::InvalidInput("Remote base URL must include http:// or https://".to_string())
        })?;
        if config.api_key.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Remote API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_key: config.api_key.trim().to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REMOTE_HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| {
            Error::Payload(format!("{error}: {}", compact_text(&body)))
        })
    }
}

#[async_trait]
impl BackendAdapter for RemoteStoreAdapter {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load(&self) -> Result<Vec<Marking>> {
        let response = self
            .request(Method::GET, "markings")
            .query(&[("order", "last_modified.desc")])
            .send()
            .await?;
        Self::parse_json(Self::check(response).await?).await
    }

    async fn save(&self, markings: &[Marking]) -> Result<()> {
        // The remote table is keyed by id; records that never got one are
        // stored under their synthesized identity key.
        let rows: Vec<Marking> = markings
            .iter()
            .map(|marking| {
                let mut row = marking.clone();
                if row.id.is_none() {
                    row.id = Some(marking.identity_key());
                }
                row
            })
            .collect();

        let response = self
            .request(Method::POST, "markings")
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&rows)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, "markings")
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for RemoteStoreAdapter {
    async fn publish(&self, location: &DeviceLocation) -> Result<()> {
        let response = self
            .request(Method::POST, "device_locations")
            .query(&[("on_conflict", "device_id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[location])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn recent(&self, since_ms: i64) -> Result<Vec<DeviceLocation>> {
        let response = self
            .request(Method::GET, "device_locations")
            .query(&[
                ("timestamp", format!("gte.{since_ms}")),
                ("order", "timestamp.desc".to_string()),
            ])
            .send()
            .await?;
        Self::parse_json(Self::check(response).await?).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return message.trim().to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        compact_text(trimmed)
    }
}
