//! Wire types for the local fallback server's JSON API.
//!
//! Shared by the server and the local-network adapter so the two sides
//! cannot drift apart.

use serde::{Deserialize, Serialize};

use crate::models::Marking;
use crate::works::WorkSummary;

/// `GET /api/markings` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkingsEnvelope {
    pub success: bool,
    #[serde(default)]
    pub markings: Vec<Marking>,
    pub timestamp: i64,
}

/// `POST /api/markings` request: a batch to merge into the server's set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    #[serde(default)]
    pub markings: Vec<Marking>,
}

/// `POST /api/markings` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
    pub timestamp: i64,
}

/// Full client state carried by a sync exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    #[serde(default)]
    pub markings: Vec<Marking>,
    #[serde(default)]
    pub works: Vec<WorkSummary>,
}

/// `POST /api/sync` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub data: SyncPayload,
}

/// Per-collection counts reported back from a full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub markings: usize,
    pub works: usize,
}

/// `POST /api/sync` response: the merged state plus counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    pub data: SyncPayload,
    pub timestamp: i64,
    pub stats: SyncStats,
}

/// `DELETE /api/markings/{id}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: i64,
}
