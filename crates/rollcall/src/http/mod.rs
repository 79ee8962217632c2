//! HTTP surface for rollcall.
//!
//! Form routes follow post/redirect/get: a rejected secret or confirmation
//! redirects back to the form with a `notice` query parameter. The JSON
//! attendance endpoint always answers 200 with a status tag unless the store
//! itself fails.

pub mod pages;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Form, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::{Enrollment, RegistrationForm, Registry};

/// Path prefix the image directory is served under.
pub const QR_ROUTE: &str = "/static/qrcodes";

/// Transient message shown on a page after a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The shared secret was wrong.
    IncorrectPassword,
    /// The reset confirmation text was not `DELETE`.
    ConfirmRequired,
    /// The roll number cannot be used as an identifier prefix.
    InvalidRoll,
    /// The roll number matched an existing registration.
    Duplicate,
    /// A student was registered.
    Added,
    /// All data was deleted.
    Deleted,
}

impl Notice {
    /// Query-string value for this notice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncorrectPassword => "incorrect_password",
            Self::ConfirmRequired => "confirm_required",
            Self::InvalidRoll => "invalid_roll",
            Self::Duplicate => "duplicate",
            Self::Added => "added",
            Self::Deleted => "deleted",
        }
    }

    /// Parse a query-string value; unknown values are ignored.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [
            Self::IncorrectPassword,
            Self::ConfirmRequired,
            Self::InvalidRoll,
            Self::Duplicate,
            Self::Added,
            Self::Deleted,
        ]
        .into_iter()
        .find(|n| n.as_str() == value)
    }

    /// Text shown to the user.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::IncorrectPassword => "Incorrect password!",
            Self::ConfirmRequired => "You must type DELETE to confirm!",
            Self::InvalidRoll => "Roll number may not contain path separators.",
            Self::Duplicate => "Duplicate! Showing existing QR.",
            Self::Added => "Student added & QR generated!",
            Self::Deleted => "All QR codes and data deleted successfully!",
        }
    }

    fn class(self) -> &'static str {
        match self {
            Self::IncorrectPassword | Self::InvalidRoll => "err",
            Self::ConfirmRequired | Self::Duplicate => "",
            Self::Added | Self::Deleted => "ok",
        }
    }

    fn redirect(self, path: &str) -> Response {
        Redirect::to(&format!("{path}?notice={}", self.as_str())).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct NoticeQuery {
    notice: Option<String>,
}

impl NoticeQuery {
    fn notice(&self) -> Option<Notice> {
        self.notice.as_deref().and_then(Notice::parse)
    }
}

#[derive(Debug, Deserialize)]
struct ResetForm {
    password: String,
    confirm_text: String,
}

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    registry: Arc<Mutex<Registry>>,
    qr_dir: PathBuf,
    download_name: String,
}

impl AppState {
    /// Wrap `registry` for sharing between requests.
    #[must_use]
    pub fn new(registry: Registry, config: &Config) -> Self {
        let qr_dir = registry.images().dir().to_path_buf();
        Self {
            registry: Arc::new(Mutex::new(registry)),
            qr_dir,
            download_name: config.storage.attendance_file.clone(),
        }
    }

    /// Run `op` against the registry on the blocking pool, one at a time.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || {
            let mut guard = registry
                .lock()
                .map_err(|_| Error::internal("registry lock poisoned"))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| Error::internal(format!("registry task failed: {e}")))?
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let images = ServeDir::new(&state.qr_dir);
    Router::new()
        .route("/", get(home_handler))
        .route("/add_user", get(add_user_page).post(add_user_handler))
        .route("/delete_all", get(delete_all_page).post(delete_all_handler))
        .route("/download_csv", get(download_csv_handler))
        .route("/scan", get(scan_handler))
        .route("/mark_attendance", post(mark_attendance_handler))
        .nest_service(QR_ROUTE, images)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home_handler(Query(query): Query<NoticeQuery>) -> Html<String> {
    Html(pages::landing(query.notice()))
}

async fn add_user_page(Query(query): Query<NoticeQuery>) -> Html<String> {
    Html(pages::add_user(query.notice(), None))
}

async fn add_user_handler(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> Response {
    match state.run(move |registry| registry.register(&form)).await {
        Ok(Enrollment::Created { image, .. }) => {
            Html(pages::add_user(Some(Notice::Added), Some(&image))).into_response()
        }
        Ok(Enrollment::Duplicate { image, .. }) => {
            Html(pages::add_user(Some(Notice::Duplicate), Some(&image))).into_response()
        }
        Err(Error::Unauthorized) => Notice::IncorrectPassword.redirect("/add_user"),
        Err(Error::Validation { .. }) => Notice::InvalidRoll.redirect("/add_user"),
        Err(err) => err.into_response(),
    }
}

async fn delete_all_page(Query(query): Query<NoticeQuery>) -> Html<String> {
    Html(pages::delete_all(query.notice()))
}

async fn delete_all_handler(
    State(state): State<AppState>,
    Form(form): Form<ResetForm>,
) -> Response {
    let result = state
        .run(move |registry| registry.reset(&form.password, &form.confirm_text))
        .await;
    match result {
        Ok(_) => Notice::Deleted.redirect("/"),
        Err(Error::Unauthorized) => Notice::IncorrectPassword.redirect("/delete_all"),
        Err(Error::Validation { .. }) => Notice::ConfirmRequired.redirect("/delete_all"),
        Err(err) => err.into_response(),
    }
}

async fn download_csv_handler(State(state): State<AppState>) -> Result<Response> {
    let bytes = state
        .run(|registry| registry.store().export_attendance_csv())
        .await?;
    let disposition = format!("attachment; filename=\"{}\"", state.download_name);
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn scan_handler() -> Html<String> {
    Html(pages::scan())
}

/// Accepts any body; a missing, non-string or unparsable `qr_data` is
/// reported as "No QR data received".
async fn mark_attendance_handler(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let qr_data = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("qr_data").and_then(|d| d.as_str()).map(str::to_string));
    debug!("mark_attendance qr_data={qr_data:?}");

    let now = chrono::Local::now().naive_local();
    let outcome = state
        .run(move |registry| registry.mark_attendance(qr_data.as_deref(), now))
        .await?;
    Ok(Json(outcome).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::LOCATION, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    use crate::registry::{MarkOutcome, MarkStatus};

    fn test_app() -> (TempDir, Config, Router) {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());
        let registry = Registry::open(&config).unwrap();
        let app = build_router(AppState::new(registry, &config));
        (dir, config, app)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Response) {
        let response = app.clone().oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_post(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn mark(app: &Router, qr_data: &str) -> MarkOutcome {
        let (status, response) =
            send(app, json_post("/mark_attendance", &json!({ "qr_data": qr_data }))).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    async fn register_alice(app: &Router, config: &Config) -> String {
        let (status, response) = send(
            app,
            form_post(
                "/add_user",
                "password=admin123&name=Alice&roll=R1&dept=CS&year=2&section=A",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(&pages::escape(Notice::Added.message())));

        let students = std::fs::read_to_string(config.students_path()).unwrap();
        let row = students.lines().nth(1).unwrap();
        let roll_no = row.split(',').next().unwrap().to_string();
        assert!(html.contains(&format!("/static/qrcodes/{roll_no}.png")));
        roll_no
    }

    #[test]
    fn test_notice_roundtrip() {
        for notice in [
            Notice::IncorrectPassword,
            Notice::ConfirmRequired,
            Notice::InvalidRoll,
            Notice::Duplicate,
            Notice::Added,
            Notice::Deleted,
        ] {
            assert_eq!(Notice::parse(notice.as_str()), Some(notice));
        }
        assert_eq!(Notice::parse("bogus"), None);
    }

    #[tokio::test]
    async fn test_pages_render() {
        let (_dir, _config, app) = test_app();
        for uri in ["/", "/add_user", "/delete_all", "/scan"] {
            let (status, response) =
                send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(body_text(response).await.contains("<html"));
        }
    }

    #[tokio::test]
    async fn test_notice_is_rendered_from_query() {
        let (_dir, _config, app) = test_app();
        let (_, response) = send(
            &app,
            Request::get("/add_user?notice=incorrect_password")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert!(body_text(response)
            .await
            .contains(&pages::escape(Notice::IncorrectPassword.message())));
    }

    #[tokio::test]
    async fn test_register_mark_and_repeat() {
        let (_dir, config, app) = test_app();
        let roll_no = register_alice(&app, &config).await;
        assert!(config.qr_dir().join(format!("{roll_no}.png")).is_file());

        let first = mark(&app, &roll_no).await;
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            json!({"status": "success", "message": "Attendance marked for Alice"})
        );

        let second = mark(&app, &roll_no).await;
        assert_eq!(
            serde_json::to_value(&second).unwrap(),
            json!({"status": "exists", "message": "Alice already marked!"})
        );

        let attendance = std::fs::read_to_string(config.attendance_path()).unwrap();
        assert_eq!(attendance.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_registration_shows_existing_image() {
        let (_dir, config, app) = test_app();
        let roll_no = register_alice(&app, &config).await;

        let (status, response) = send(
            &app,
            form_post(
                "/add_user",
                "password=admin123&name=Alice&roll=R1&dept=CS&year=2&section=A",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(&pages::escape(Notice::Duplicate.message())));
        assert!(html.contains(&format!("{roll_no}.png")));

        let students = std::fs::read_to_string(config.students_path()).unwrap();
        assert_eq!(students.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_wrong_password_redirects_with_notice() {
        let (_dir, config, app) = test_app();
        let (status, response) = send(
            &app,
            form_post(
                "/add_user",
                "password=nope&name=Alice&roll=R1&dept=CS&year=2&section=A",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/add_user?notice=incorrect_password"
        );
        let students = std::fs::read_to_string(config.students_path()).unwrap();
        assert_eq!(students.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_mark_unknown_and_malformed() {
        let (_dir, _config, app) = test_app();

        let unknown = mark(&app, "R9_zzzzz").await;
        assert_eq!(unknown.message, "Student not found for QR R9_zzzzz");

        for body in [json!({}), json!({"qr_data": 42}), json!({"qr_data": ""})] {
            let (status, response) = send(&app, json_post("/mark_attendance", &body)).await;
            assert_eq!(status, StatusCode::OK);
            let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(value, json!({"status": "error", "message": "No QR data received"}));
        }

        let (status, _) = send(
            &app,
            Request::post("/mark_attendance")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_all_flow() {
        let (_dir, config, app) = test_app();
        let roll_no = register_alice(&app, &config).await;
        mark(&app, &roll_no).await;

        let (status, response) = send(
            &app,
            form_post("/delete_all", "password=admin123&confirm_text=delete"),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/delete_all?notice=confirm_required"
        );
        assert!(config.qr_dir().join(format!("{roll_no}.png")).exists());

        let (status, response) = send(
            &app,
            form_post("/delete_all", "password=wrong&confirm_text=DELETE"),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/delete_all?notice=incorrect_password"
        );

        let (status, response) = send(
            &app,
            form_post("/delete_all", "password=admin123&confirm_text=DELETE"),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/?notice=deleted");

        assert_eq!(
            std::fs::read_to_string(config.students_path()).unwrap(),
            "Roll No,Name,Dept,Year,Section\n"
        );
        assert_eq!(
            std::fs::read_to_string(config.attendance_path()).unwrap(),
            "Roll No,Name,Dept,Year,Section,Timestamp\n"
        );
        assert_eq!(std::fs::read_dir(config.qr_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_csv() {
        let (_dir, config, app) = test_app();
        let roll_no = register_alice(&app, &config).await;
        mark(&app, &roll_no).await;

        let (status, response) = send(
            &app,
            Request::get("/download_csv").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"attendance.csv\""
        );
        let text = body_text(response).await;
        assert!(text.starts_with("Roll No,Name,Dept,Year,Section,Timestamp\n"));
        assert!(text.contains(&format!("{roll_no},Alice,CS,2,A,")));
    }

    #[tokio::test]
    async fn test_serves_generated_image() {
        let (_dir, config, app) = test_app();
        let roll_no = register_alice(&app, &config).await;

        let (status, response) = send(
            &app,
            Request::get(format!("{QR_ROUTE}/{roll_no}.png"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.starts_with(b"\x89PNG"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_marks_record_once() {
        let (_dir, config, app) = test_app();
        let roll_no = register_alice(&app, &config).await;

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let app = app.clone();
                let roll_no = roll_no.clone();
                tokio::spawn(async move { mark(&app, &roll_no).await })
            })
            .collect();

        let mut statuses = Vec::new();
        for task in tasks {
            statuses.push(task.await.unwrap().status);
        }

        let count = |status| statuses.iter().filter(|s| **s == status).count();
        assert_eq!(count(MarkStatus::Success), 1);
        assert_eq!(count(MarkStatus::Exists), 15);
        let attendance = std::fs::read_to_string(config.attendance_path()).unwrap();
        assert_eq!(attendance.lines().count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_create_one_student() {
        let (_dir, config, app) = test_app();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move {
                    let (status, response) = send(
                        &app,
                        form_post(
                            "/add_user",
                            "password=admin123&name=Bob&roll=R7&dept=EE&year=1&section=C",
                        ),
                    )
                    .await;
                    assert_eq!(status, StatusCode::OK);
                    body_text(response).await
                })
            })
            .collect();

        let mut bodies = Vec::new();
        for task in tasks {
            bodies.push(task.await.unwrap());
        }

        let added = pages::escape(Notice::Added.message());
        let duplicate = pages::escape(Notice::Duplicate.message());
        assert_eq!(bodies.iter().filter(|b| b.contains(&added)).count(), 1);
        assert_eq!(bodies.iter().filter(|b| b.contains(&duplicate)).count(), 7);

        let students = std::fs::read_to_string(config.students_path()).unwrap();
        assert_eq!(students.lines().count(), 2);
        assert_eq!(std::fs::read_dir(config.qr_dir()).unwrap().count(), 1);
    }
}
