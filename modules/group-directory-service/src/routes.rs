//! Axum route handlers for the group directory API.

use crate::backup::SnapshotRotator;
use crate::config::Config;
use crate::dashboard;
use crate::error::UploadError;
use crate::store::GroupStore;
use crate::uploads;
use crate::worker;
use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use group_directory_types::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use walkdir::WalkDir;

pub struct AppState {
    pub store: Arc<GroupStore>,
    pub rotator: Arc<SnapshotRotator>,
    pub config: Config,
    pub start_time: Instant,
    pub last_backup_at: Arc<Mutex<Option<String>>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    // Leave room for the text fields around a maximum-size image.
    let body_limit = state.config.max_upload_bytes + 64 * 1024;
    let uploads = ServeDir::new(&state.config.uploads_dir);

    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/health", get(health))
        .route("/api/backups", get(list_backups).post(create_backup))
        .nest_service("/uploads", uploads)
        .fallback(get(dashboard::dashboard))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

// GET /api/groups?q=
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GroupQuery>,
) -> Json<Vec<GroupEntry>> {
    Json(state.store.search(query.q.as_deref()))
}

// POST /api/groups (multipart with optional image, or JSON without one)
pub async fn create_group(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let uploads_dir = &state.config.uploads_dir;
    let form = if is_json_request(&req) {
        match Json::<NewGroup>::from_request(req, &()).await {
            Ok(Json(mut form)) => {
                // JSON clients cannot upload, so they cannot reference one either.
                form.image_file = None;
                form
            }
            Err(rejection) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Malformed JSON body: {}", rejection.body_text()),
                );
            }
        }
    } else {
        let multipart = match Multipart::from_request(req, &()).await {
            Ok(multipart) => multipart,
            Err(rejection) => return rejection.into_response(),
        };
        match uploads::read_group_form(multipart, uploads_dir, state.config.max_upload_bytes).await {
            Ok(form) => form,
            Err(UploadError::TooLarge(limit)) => {
                return error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("Image exceeds the {} byte limit", limit),
                );
            }
            Err(UploadError::BodyTooLarge(msg)) => {
                return error_response(StatusCode::PAYLOAD_TOO_LARGE, msg);
            }
            Err(UploadError::Multipart(msg)) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Malformed form: {}", msg));
            }
            Err(e) => {
                log::error!("Error storing upload: {}", e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save group");
            }
        }
    };

    let image_file = form.image_file.clone();
    match state.store.append(form) {
        Ok(group) => (
            StatusCode::OK,
            Json(CreateGroupResponse {
                success: true,
                group,
            }),
        )
            .into_response(),
        Err(e) => {
            if let Some(name) = image_file {
                uploads::remove_upload(uploads_dir, &name).await;
            }
            if e.is_validation() {
                error_response(StatusCode::BAD_REQUEST, e.to_string())
            } else {
                log::error!("Error saving group: {}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save group")
            }
        }
    }
}

// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let data_dir = state.config.data_dir.clone();
    let disk_space = tokio::task::spawn_blocking(move || dir_size(&data_dir))
        .await
        .unwrap_or(0);

    Json(HealthStatus {
        status: "healthy".to_string(),
        groups_count: state.store.count(),
        disk_space,
        uptime_secs: state.start_time.elapsed().as_secs(),
        last_backup_at: state.last_backup_at.lock().await.clone(),
    })
}

// GET /api/backups
pub async fn list_backups(State(state): State<Arc<AppState>>) -> Response {
    match state.rotator.list() {
        Ok(snapshots) => (StatusCode::OK, Json(snapshots)).into_response(),
        Err(e) => {
            log::error!("Error listing backups: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list backups")
        }
    }
}

// POST /api/backups
pub async fn create_backup(State(state): State<Arc<AppState>>) -> Response {
    match worker::run_once(state.rotator.clone(), state.last_backup_at.clone()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            log::error!("[BACKUP] Backup failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

fn is_json_request(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(msg))).into_response()
}

/// Summed size of the regular files under `path`.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use tower::ServiceExt;

    const BOUNDARY: &str = "group-directory-test-boundary";

    struct TestApp {
        _dir: tempfile::TempDir,
        config: Config,
        app: Router,
    }

    fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_data_dir(&dir.path().join("data"));
        configure(&mut config);

        let store = Arc::new(GroupStore::open(&config.data_file).unwrap());
        let rotator = Arc::new(SnapshotRotator::from_config(&config));
        let state = Arc::new(AppState {
            store,
            rotator,
            config: config.clone(),
            start_time: Instant::now(),
            last_backup_at: Arc::new(Mutex::new(None)),
        });
        TestApp {
            _dir: dir,
            config,
            app: router(state),
        }
    }

    fn test_app() -> TestApp {
        test_app_with(|_| {})
    }

    fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn post_group(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Request<Body> {
        http::Request::builder()
            .method("POST")
            .uri("/api/groups")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields, image)))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, bytes) = send(app, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn upload_count(config: &Config) -> usize {
        std::fs::read_dir(&config.uploads_dir)
            .map(|d| d.count())
            .unwrap_or(0)
    }

    const ALICE: [(&str, &str); 3] = [
        ("username", "alice"),
        ("groupName", "Dev Chat"),
        ("groupLink", "https://chat.whatsapp.com/abc123"),
    ];

    #[tokio::test]
    async fn test_create_then_list() {
        let t = test_app();

        let (status, body) = send_json(&t.app, post_group(&ALICE, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["group"]["groupName"], "Dev Chat");
        assert_eq!(
            body["group"]["imagePath"],
            "https://www.gravatar.com/avatar/aa9368dc5f927032173460a5f7983124?d=identicon&s=200"
        );

        let (status, body) = send_json(&t.app, get("/api/groups")).await;
        assert_eq!(status, StatusCode::OK);
        let groups = body.as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["username"], "alice");
        assert!(!groups[0]["id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_image_serves_upload() {
        let t = test_app();
        let png = b"\x89PNG\r\n\x1a\nfake image bytes";

        let (status, body) =
            send_json(&t.app, post_group(&ALICE, Some(("logo.png", png.as_slice())))).await;
        assert_eq!(status, StatusCode::OK);
        let image_path = body["group"]["imagePath"].as_str().unwrap().to_string();
        assert!(image_path.starts_with("/uploads/"));
        assert!(image_path.ends_with(".png"));
        assert_eq!(upload_count(&t.config), 1);

        let (status, bytes) = send(&t.app, get(&image_path)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, png.to_vec());

        let (_, listed) = send_json(&t.app, get("/api/groups")).await;
        assert_eq!(listed[0]["imagePath"], image_path.as_str());
    }

    #[tokio::test]
    async fn test_empty_file_input_falls_back_to_avatar() {
        let t = test_app();
        let (status, body) = send_json(&t.app, post_group(&ALICE, Some(("", b"".as_slice())))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            body["group"]["imagePath"]
                .as_str()
                .unwrap()
                .starts_with("https://www.gravatar.com/avatar/")
        );
        assert_eq!(upload_count(&t.config), 0);
    }

    #[tokio::test]
    async fn test_missing_field_is_rejected_and_upload_removed() {
        let t = test_app();
        let fields = [
            ("username", "alice"),
            ("groupName", "  "),
            ("groupLink", "https://chat.whatsapp.com/abc"),
        ];

        let (status, body) =
            send_json(&t.app, post_group(&fields, Some(("logo.png", b"img".as_slice())))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "All fields are required");
        assert_eq!(upload_count(&t.config), 0);

        let (_, listed) = send_json(&t.app, get("/api/groups")).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_link_is_rejected() {
        let t = test_app();
        let fields = [
            ("username", "alice"),
            ("groupName", "Dev Chat"),
            ("groupLink", "http://chat.whatsapp.com/x"),
        ];
        let (status, body) = send_json(&t.app, post_group(&fields, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid WhatsApp link format");
    }

    fn post_json(body: serde_json::Value) -> Request<Body> {
        http::Request::builder()
            .method("POST")
            .uri("/api/groups")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_json_create_then_list() {
        let t = test_app();
        let (status, body) = send_json(
            &t.app,
            post_json(serde_json::json!({
                "username": "alice",
                "groupName": "Dev Chat",
                "groupLink": "https://chat.whatsapp.com/abc123"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            body["group"]["imagePath"],
            "https://www.gravatar.com/avatar/aa9368dc5f927032173460a5f7983124?d=identicon&s=200"
        );

        let (_, listed) = send_json(&t.app, get("/api/groups")).await;
        let groups = listed.as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["groupName"], "Dev Chat");
        assert_eq!(groups[0]["id"], body["group"]["id"]);
    }

    #[tokio::test]
    async fn test_json_create_cannot_reference_an_upload() {
        let t = test_app();
        let (status, body) = send_json(
            &t.app,
            post_json(serde_json::json!({
                "username": "alice",
                "groupName": "Dev Chat",
                "groupLink": "https://chat.whatsapp.com/abc123",
                "imageFile": "../groups.json"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            body["group"]["imagePath"]
                .as_str()
                .unwrap()
                .starts_with("https://www.gravatar.com/avatar/")
        );
    }

    #[tokio::test]
    async fn test_json_missing_field_is_a_validation_error() {
        let t = test_app();
        let (status, body) = send_json(
            &t.app,
            post_json(serde_json::json!({
                "username": "alice",
                "groupLink": "https://chat.whatsapp.com/abc123"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "All fields are required");
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let t = test_app();
        let req = http::Request::builder()
            .method("POST")
            .uri("/api/groups")
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::from("{\"username\": "))
            .unwrap();
        let (status, body) = send_json(&t.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Malformed JSON body"));

        let (_, listed) = send_json(&t.app, get("/api/groups")).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_form_body_is_payload_too_large() {
        let t = test_app_with(|c| c.max_upload_bytes = 16);
        let padding = "x".repeat(128 * 1024);
        let fields = [
            ("username", padding.as_str()),
            ("groupName", "Dev Chat"),
            ("groupLink", "https://chat.whatsapp.com/abc123"),
        ];

        let (status, body) =
            send_json(&t.app, post_group(&fields, Some(("logo.png", b"img".as_slice())))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].is_string());
        assert_eq!(upload_count(&t.config), 0);
    }

    #[tokio::test]
    async fn test_oversized_image_is_rejected() {
        let t = test_app_with(|c| c.max_upload_bytes = 16);
        let big = vec![7u8; 64];

        let (status, body) =
            send_json(&t.app, post_group(&ALICE, Some(("big.png", big.as_slice())))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].as_str().unwrap().contains("16 byte limit"));
        assert_eq!(upload_count(&t.config), 0);
    }

    #[tokio::test]
    async fn test_search_filters_case_insensitively() {
        let t = test_app();
        send(&t.app, post_group(&ALICE, None)).await;
        let hiking = [
            ("username", "Bob"),
            ("groupName", "Hiking Club"),
            ("groupLink", "https://chat.whatsapp.com/hike"),
        ];
        send(&t.app, post_group(&hiking, None)).await;

        let (_, body) = send_json(&t.app, get("/api/groups?q=DEV")).await;
        let groups = body.as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["groupName"], "Dev Chat");

        let (_, body) = send_json(&t.app, get("/api/groups?q=bob")).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send_json(&t.app, get("/api/groups?q=nothing")).await;
        assert!(body.as_array().unwrap().is_empty());

        let (_, body) = send_json(&t.app, get("/api/groups?q=")).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_health_reports_count_and_size() {
        let t = test_app();
        send(&t.app, post_group(&ALICE, None)).await;

        let (status, body) = send_json(&t.app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["groupsCount"], 1);
        assert!(body["diskSpace"].as_u64().unwrap() > 0);
        assert!(body["lastBackupAt"].is_null());
    }

    #[tokio::test]
    async fn test_backup_endpoints() {
        let t = test_app();
        send(&t.app, post_group(&ALICE, None)).await;

        let req = http::Request::builder()
            .method("POST")
            .uri("/api/backups")
            .body(Body::empty())
            .unwrap();
        let (status, report) = send_json(&t.app, req).await;
        assert_eq!(status, StatusCode::OK);
        let snapshot = report["snapshot"].as_str().unwrap().to_string();
        assert!(snapshot.starts_with("groups-"));

        let (status, listed) = send_json(&t.app, get("/api/backups")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["name"], snapshot.as_str());

        let copy = std::fs::read(t.config.backup_dir.join(&snapshot)).unwrap();
        assert_eq!(copy, std::fs::read(&t.config.data_file).unwrap());

        let (_, health) = send_json(&t.app, get("/api/health")).await;
        assert!(health["lastBackupAt"].is_string());
    }

    #[tokio::test]
    async fn test_dashboard_escapes_content() {
        let t = test_app();
        let fields = [
            ("username", "mallory"),
            ("groupName", "<script>alert(1)</script>"),
            ("groupLink", "https://chat.whatsapp.com/x"),
        ];
        send(&t.app, post_group(&fields, None)).await;

        for uri in ["/", "/some/client/route"] {
            let (status, bytes) = send(&t.app, get(uri)).await;
            assert_eq!(status, StatusCode::OK);
            let html = String::from_utf8(bytes).unwrap();
            assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
            assert!(!html.contains("<script>alert(1)</script>"));
        }
    }

    #[test]
    fn test_dir_size_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), [0u8; 10]).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("b"), [0u8; 5]).unwrap();
        assert_eq!(dir_size(dir.path()), 15);
        assert_eq!(dir_size(&dir.path().join("missing")), 0);
    }
}
