use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use snapsync_core::db::{Database, ImageRepository, LibSqlImageRepository};
use snapsync_core::models::{ImageUpdate, NewImage, ReconciliationResult};
use snapsync_core::{compare, wire, ImageId, ImageRecord};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    db: Arc<Database>,
    // Serializes read-modify-write paths so updated_at stays monotonic per record
    writes: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Arc<ApiConfig>, db: Database) -> Self {
        Self {
            config,
            db: Arc::new(db),
            writes: Arc::new(Mutex::new(())),
        }
    }

    fn images(&self) -> LibSqlImageRepository<'_> {
        LibSqlImageRepository::new(self.db.connection())
    }
}

pub fn app_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/sync", post(sync))
        .route("/images", get(list_images).post(create_image))
        .route("/images/{id}", put(update_image).delete(delete_image))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    images: u64,
}

async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        images: state.images().count().await?,
    }))
}

async fn sync(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<ReconciliationResult>, AppError> {
    let local = wire::decode_sync_request(payload)?;
    let authoritative = state.images().list_all().await?;
    let result = compare(&authoritative, &local.items);

    tracing::info!(
        endpoint = "sync",
        local = local.items.len(),
        rejected = local.rejected,
        added_or_updated = result.added_or_updated.len(),
        removed = result.removed.len(),
        conflicts = result.conflicts.len(),
        "Reconciled client replica"
    );
    Ok(Json(result))
}

async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<ImageRecord>>, AppError> {
    Ok(Json(state.images().list_all().await?))
}

async fn create_image(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<ImageRecord>), AppError> {
    let new_image: NewImage = parse_body(payload)?;

    let _write = state.writes.lock().await;
    let created = state.images().create(&new_image).await?;
    tracing::info!(endpoint = "create_image", id = %created.id, "Created image");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> Result<Json<ImageRecord>, AppError> {
    let update: ImageUpdate = parse_body(payload)?;
    if update.is_empty() {
        return Err(AppError::bad_request("update must change at least one field"));
    }

    let _write = state.writes.lock().await;
    let updated = state.images().update(ImageId::new(id), &update).await?;
    tracing::info!(
        endpoint = "update_image",
        id = %updated.id,
        updated_at = updated.updated_at,
        "Updated image"
    );
    Ok(Json(updated))
}

async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let _write = state.writes.lock().await;
    state.images().delete(ImageId::new(id)).await?;
    tracing::info!(endpoint = "delete_image", id, "Deleted image");
    Ok(StatusCode::NO_CONTENT)
}

fn parse_body<T: DeserializeOwned>(payload: Value) -> Result<T, AppError> {
    serde_json::from_value(payload).map_err(|error| AppError::bad_request(error.to_string()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use snapsync_core::db::{KeyValueStore, LibSqlKeyValueStore, MemoryKeyValueStore, Schema};
    use snapsync_core::models::SyncResult;
    use snapsync_core::replica::{IMAGES_KEY, LAST_SYNC_KEY};
    use snapsync_core::transport::HttpSyncTransport;
    use snapsync_core::{LocalReplica, SyncCoordinator, SyncStatus};
    use tower::ServiceExt;

    use super::*;

    async fn test_state(body_limit_bytes: usize) -> AppState {
        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: PathBuf::from(":memory:"),
            body_limit_bytes,
        };
        let db = Database::open_in_memory(Schema::Catalog).await.unwrap();
        AppState::new(Arc::new(config), db)
    }

    async fn app() -> Router {
        app_router(test_state(8 * 1024 * 1024).await)
    }

    async fn send(app: &Router, method: Method, uri: &str, payload: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match payload {
            Some(payload) => builder
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        if body.is_empty() {
            return (status, Value::Null);
        }
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn create(app: &Router, filename: &str) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/images",
            Some(json!({"filename": filename, "size": 2048, "mimeType": "image/png"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_reports_image_count() {
        let app = app().await;
        create(&app, "a.png").await;

        let (status, body) = send(&app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["images"], 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn image_crud_round_trip() {
        let app = app().await;
        let created = create(&app, " sunset.png ").await;
        assert_eq!(created["filename"], "sunset.png");
        assert_eq!(created["createdAt"], created["updatedAt"]);
        let id = created["id"].as_i64().unwrap();

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/images/{id}"),
            Some(json!({"filename": "dusk.png"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["filename"], "dusk.png");
        assert_eq!(updated["size"], 2048);
        assert!(updated["updatedAt"].as_i64() > created["updatedAt"].as_i64());

        let (status, listed) = send(&app, Method::GET, "/images", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, json!([updated]));

        let (status, _) = send(&app, Method::DELETE, &format!("/images/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::DELETE, &format!("/images/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("image"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_image_payloads_are_rejected() {
        let app = app().await;

        for payload in [
            json!({"filename": "  ", "size": 1, "mimeType": "image/png"}),
            json!({"filename": "a.png", "size": -1, "mimeType": "image/png"}),
            json!({"filename": "a.png", "size": 1, "mimeType": "png"}),
            json!({"filename": "a.png"}),
        ] {
            let (status, body) = send(&app, Method::POST, "/images", Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string());
        }

        let created = create(&app, "a.png").await;
        let uri = format!("/images/{}", created["id"]);
        let (status, _) = send(&app, Method::PUT, &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::PUT, "/images/999", Some(json!({"size": 3}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_returns_reconciliation_result() {
        let app = app().await;
        let kept = create(&app, "kept.png").await;
        let fresh = create(&app, "fresh.png").await;
        let kept_id = kept["id"].as_i64().unwrap();
        let kept_updated = kept["updatedAt"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            "/sync",
            Some(json!({
                "localImages": [
                    {"id": kept_id, "lastModified": kept_updated - 1, "syncStatus": "pending"},
                    {"id": 999, "lastModified": 5, "syncStatus": "synced"},
                    {"id": 1000, "lastModified": 5, "syncStatus": "pending"},
                    {"lastModified": 5, "syncStatus": "synced"},
                    {"id": 1001, "lastModified": 5, "syncStatus": "deleted"}
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["addedOrUpdated"], json!([fresh]));
        assert_eq!(body["removed"], json!([999]));
        assert_eq!(
            body["conflicts"],
            json!([{
                "id": kept_id,
                "remoteUpdatedAt": kept_updated,
                "localLastModified": kept_updated - 1
            }])
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_rejects_malformed_request_shape() {
        let app = app().await;

        let (status, body) =
            send(&app, Method::POST, "/sync", Some(json!({"images": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("localImages"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_body_is_rejected() {
        let app = app_router(test_state(1024).await);
        let summaries: Vec<Value> = (0..200)
            .map(|id| json!({"id": id, "lastModified": 1, "syncStatus": "synced"}))
            .collect();

        let (status, _) = send(
            &app,
            Method::POST,
            "/sync",
            Some(json!({"localImages": summaries})),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn coordinator_converges_against_live_server() {
        let state = test_state(8 * 1024 * 1024).await;
        let server_state = state.clone();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app_router(server_state)).await.unwrap();
        });

        let first = state
            .images()
            .create(&NewImage {
                filename: "first.png".to_string(),
                size: 10,
                mime_type: "image/png".to_string(),
            })
            .await
            .unwrap();
        state
            .images()
            .create(&NewImage {
                filename: "second.png".to_string(),
                size: 20,
                mime_type: "image/jpeg".to_string(),
            })
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = LibSqlKeyValueStore::open(dir.path().join("replica.db"))
            .await
            .unwrap();
        let replica = Arc::new(LocalReplica::new(store));
        let transport =
            HttpSyncTransport::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        let coordinator = SyncCoordinator::new(replica.clone(), transport);

        assert_eq!(coordinator.run_sync().await, SyncResult::completed(0, 2, 0));
        assert_eq!(coordinator.run_sync().await, SyncResult::completed(0, 0, 0));

        replica.rename(first.id, "edited.png").await.unwrap();
        state.images().delete(first.id).await.unwrap();
        assert_eq!(coordinator.run_sync().await, SyncResult::completed(1, 0, 0));

        let records = replica.load_all().await;
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|record| record.sync_status == SyncStatus::Synced));

        let status = replica.status_summary().await;
        assert_eq!(status.pending, 0);
        assert!(status.last_sync.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_server_fails_round() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let replica = Arc::new(LocalReplica::new(LibSqlKeyValueStore::open_in_memory().await.unwrap()));
        let transport =
            HttpSyncTransport::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let coordinator = SyncCoordinator::new(replica.clone(), transport);

        let result = coordinator.run_sync().await;
        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(replica.last_sync().await, None);
    }

    /// Serve a fixed `/sync` response and return the base URL
    async fn spawn_sync_stub(status: StatusCode, body: &'static str) -> String {
        let router = Router::new().route("/sync", post(move || async move { (status, body) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bad_sync_responses_leave_replica_untouched() {
        let cases = [
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"comparator unavailable"}"#,
                "Sync API error: comparator unavailable (500)",
            ),
            (
                StatusCode::OK,
                "<html>maintenance</html>",
                "Data anomaly: sync response is not valid JSON",
            ),
            (
                StatusCode::OK,
                r#"{"addedOrUpdated":[],"removed":[]}"#,
                "Data anomaly: missing field 'conflicts'",
            ),
        ];

        for (status, body, expected) in cases {
            let store = MemoryKeyValueStore::new();
            store.set(LAST_SYNC_KEY, "77").await.unwrap();
            let replica = Arc::new(LocalReplica::new(store));
            replica
                .upsert(ImageRecord {
                    id: ImageId::new(1),
                    filename: "kept.png".to_string(),
                    size: 10,
                    mime_type: "image/png".to_string(),
                    created_at: 1,
                    updated_at: 2,
                })
                .await;
            replica.mark_pending(ImageId::new(1)).await;

            let before = (
                replica.store().get(IMAGES_KEY).await.unwrap(),
                replica.store().get(LAST_SYNC_KEY).await.unwrap(),
            );

            let transport =
                HttpSyncTransport::new(spawn_sync_stub(status, body).await, Duration::from_secs(5))
                    .unwrap();
            let result = SyncCoordinator::new(replica.clone(), transport).run_sync().await;

            assert!(!result.success);
            let error = result.error.unwrap();
            assert!(error.starts_with(expected), "{error}");

            let after = (
                replica.store().get(IMAGES_KEY).await.unwrap(),
                replica.store().get(LAST_SYNC_KEY).await.unwrap(),
            );
            assert_eq!(after, before);
        }
    }
}
