use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use fieldmark_core::db::{Database, MarkingStore, SqliteMarkingStore};
use fieldmark_core::merge::merge_markings;
use fieldmark_core::sync::protocol::{
    DeleteResponse, MarkingsEnvelope, MergeRequest, MergeResponse, SyncPayload, SyncRequest,
    SyncResponse, SyncStats,
};
use fieldmark_core::works::group_by_work_order;
use fieldmark_core::{Error as CoreError, Marking};

use crate::error::AppError;

const CORS_MAX_AGE_SECS: u64 = 3600;

#[derive(Clone)]
pub struct AppState {
    db: Arc<tokio::sync::Mutex<Database>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(tokio::sync::Mutex::new(db)),
        }
    }

    /// Merge a batch into the stored collection, returning the new total.
    async fn merge_into_store(&self, incoming: &[Marking]) -> Result<usize, AppError> {
        let db = self.db.lock().await;
        let store = SqliteMarkingStore::new(db.connection());
        let local = store.load_all()?;
        let result = merge_markings(&local, incoming);
        store.replace_all(&result.markings)?;
        Ok(result.markings.len())
    }

    async fn load_all(&self) -> Result<Vec<Marking>, AppError> {
        let db = self.db.lock().await;
        let store = SqliteMarkingStore::new(db.connection());
        Ok(store.load_all()?)
    }
}

pub fn app_router(state: AppState) -> Router {
    // Browser clients call this from arbitrary origins on the site LAN, so
    // CORS is fully open; the preflight response is handled by the layer.
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/markings", get(list_markings))
        .route("/api/markings", post(merge_batch))
        .route("/api/markings/{id}", delete(delete_marking))
        .route("/api/sync", post(full_sync))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .max_age(Duration::from_secs(CORS_MAX_AGE_SECS)),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp_millis(),
    })
}

async fn list_markings(State(state): State<AppState>) -> Result<Json<MarkingsEnvelope>, AppError> {
    let markings = state.load_all().await?;
    Ok(Json(MarkingsEnvelope {
        success: true,
        markings,
        timestamp: Utc::now().timestamp_millis(),
    }))
}

async fn merge_batch(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<MergeResponse>, AppError> {
    let incoming = request.markings.len();
    let count = state.merge_into_store(&request.markings).await?;
    tracing::info!(incoming, total = count, "Merged marking batch");

    Ok(Json(MergeResponse {
        success: true,
        message: format!("Merged {incoming} incoming markings"),
        count,
        timestamp: Utc::now().timestamp_millis(),
    }))
}

async fn full_sync(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    state.merge_into_store(&request.data.markings).await?;
    let markings = state.load_all().await?;
    // Work summaries are derived data; rebuild them from the merged set
    // rather than trusting the client's copy.
    let works = group_by_work_order(&markings);
    let stats = SyncStats {
        markings: markings.len(),
        works: works.len(),
    };
    tracing::info!(markings = stats.markings, works = stats.works, "Full sync exchange");

    Ok(Json(SyncResponse {
        success: true,
        data: SyncPayload { markings, works },
        timestamp: Utc::now().timestamp_millis(),
        stats,
    }))
}

async fn delete_marking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let removed = {
        let db = state.db.lock().await;
        let store = SqliteMarkingStore::new(db.connection());
        store.delete(&id)?
    };
    if !removed {
        return Err(AppError::Core(CoreError::NotFound(id)));
    }

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Deleted marking {id}"),
        timestamp: Utc::now().timestamp_millis(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use fieldmark_core::models::MarkingProperties;

    use super::*;

    fn test_router() -> Router {
        app_router(AppState::new(Database::open_in_memory().unwrap()))
    }

    fn marker(id: &str, lat: f64, modified: i64) -> Marking {
        let mut marking = Marking::new_marker(lat, 139.0, MarkingProperties::default(), "dev-t");
        marking.id = Some(id.to_string());
        marking.timestamp = Some(modified);
        marking.last_modified = Some(modified);
        marking
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn list_markings_starts_empty() {
        let response = test_router()
            .oneshot(Request::get("/api/markings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["markings"], json!([]));
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn merge_batch_applies_last_writer_wins() {
        let router = test_router();

        let older = marker("m-1", 35.0, 100);
        let mut newer = marker("m-1", 35.0, 100);
        newer.last_modified = Some(500);
        newer.properties.product = Some("X".to_string());

        let first = router
            .clone()
            .oneshot(post_json("/api/markings", &json!({"markings": [older]})))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router
            .clone()
            .oneshot(post_json("/api/markings", &json!({"markings": [newer]})))
            .await
            .unwrap();
        let body = body_json(second).await;
        assert_eq!(body["count"], json!(1));

        let listed = router
            .oneshot(Request::get("/api/markings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(listed).await;
        assert_eq!(body["markings"][0]["properties"]["product"], json!("X"));
    }

    #[tokio::test]
    async fn full_sync_returns_merged_state_and_stats() {
        let router = test_router();

        let mut with_work_order = marker("m-1", 35.0, 100);
        with_work_order.properties.work_order = Some("WO-9".to_string());
        let request = json!({
            "data": {
                "markings": [with_work_order, marker("m-2", 36.0, 200)],
                "works": []
            }
        });

        let response = router.oneshot(post_json("/api/sync", &request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["stats"]["markings"], json!(2));
        assert_eq!(body["stats"]["works"], json!(1));
        assert_eq!(body["data"]["works"][0]["workOrder"], json!("WO-9"));
        assert_eq!(body["data"]["markings"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_marking_round_trip() {
        let router = test_router();

        router
            .clone()
            .oneshot(post_json(
                "/api/markings",
                &json!({"markings": [marker("m-9", 35.0, 100)]}),
            ))
            .await
            .unwrap();

        let deleted = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/markings/m-9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);

        let again = router
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/markings/m-9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
        let body = body_json(again).await;
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn preflight_gets_open_cors_headers() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/markings")
                    .header(header::ORIGIN, "http://fieldmark.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
        assert!(headers.contains_key(header::ACCESS_CONTROL_MAX_AGE));
    }

    #[tokio::test]
    async fn malformed_batch_is_rejected_not_crashed() {
        let response = test_router()
            .oneshot(post_json("/api/markings", &json!({"markings": "oops"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
