// In-process stand-in for the todo backend, served on an ephemeral port.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskchat_lib::config::ClientConfig;
use taskchat_lib::state::AppState;
use taskchat_lib::storage::{CredentialStore, MemoryCredentialStore};
use tokio::net::TcpListener;

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";
pub const USER_ID: &str = "user-1";

#[derive(Default)]
pub struct Backend {
    /// Token the backend currently accepts.
    pub valid_token: Mutex<String>,
    pub tasks: Mutex<Vec<Value>>,
    pub next_id: Mutex<u32>,
    /// `(method path, bearer)` for every request received.
    pub requests: Mutex<Vec<(String, Option<String>)>>,
    /// Whether `/auth/session` echoes the session or answers with nulls.
    pub echo_session: Mutex<bool>,
    pub fail_signout: Mutex<bool>,
    pub delay: Mutex<Option<Duration>>,
}

impl Backend {
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<(String, Option<String>)> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn revoke_tokens(&self) {
        *self.valid_token.lock().unwrap() = "rotated".to_string();
    }
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    pub backend: Arc<Backend>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let backend = Arc::new(Backend::default());
        *backend.valid_token.lock().unwrap() = "tok-1".to_string();
        *backend.echo_session.lock().unwrap() = true;

        let app = Router::new()
            .route("/api/auth/signin", post(signin))
            .route("/api/auth/signup", post(signup))
            .route("/api/auth/signout", post(signout))
            .route("/api/auth/session", get(session))
            .route("/api/tasks", get(list_tasks).post(create_task))
            .route(
                "/api/tasks/:id",
                get(get_task).put(update_task).delete(delete_task),
            )
            .route("/api/tasks/:id/complete", patch(toggle_task))
            .route("/api/:user_id/chat", post(chat))
            .route("/api/:user_id/conversations", get(list_conversations))
            .route("/api/:user_id/conversations/:id", get(get_conversation))
            .route("/api/chatkit/session", post(chatkit_session))
            .with_state(backend.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind TCP listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend failed");
        });

        Self { addr, backend }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url())
            .unwrap()
            .with_timeout(Duration::from_secs(5))
            .with_persistence(false)
    }

    pub fn app_state(&self) -> (AppState, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let state = AppState::new(self.config(), store.clone() as Arc<dyn CredentialStore>);
        (state, store)
    }
}

type Shared = State<Arc<Backend>>;

fn now() -> String {
    // Naive ISO timestamps, as the real backend emits them
    chrono::Utc::now()
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn user_json() -> Value {
    json!({
        "id": USER_ID,
        "email": EMAIL,
        "name": "Ada",
        "createdAt": "2025-01-01T00:00:00"
    })
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn record(backend: &Backend, what: &str, headers: &HeaderMap) {
    backend
        .requests
        .lock()
        .unwrap()
        .push((what.to_string(), bearer(headers)));
    let delay = *backend.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

fn authorized(backend: &Backend, headers: &HeaderMap) -> bool {
    bearer(headers).as_deref() == Some(backend.valid_token.lock().unwrap().as_str())
}

async fn signin(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&backend, "POST /auth/signin", &headers).await;
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        let token = backend.valid_token.lock().unwrap().clone();
        Json(json!({ "user": user_json(), "accessToken": token })).into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn signup(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&backend, "POST /auth/signup", &headers).await;
    if body["email"] == EMAIL {
        return error(StatusCode::BAD_REQUEST, "Email already registered");
    }
    if body["email"] == "broken@example.com" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response();
    }
    Json(json!({
        "user": {
            "id": "user-2",
            "email": body["email"],
            "name": body["name"],
            "createdAt": now()
        },
        "accessToken": "tok-new"
    }))
    .into_response()
}

async fn signout(State(backend): Shared, headers: HeaderMap) -> Response {
    record(&backend, "POST /auth/signout", &headers).await;
    if *backend.fail_signout.lock().unwrap() {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "signout exploded");
    }
    Json(json!({ "ok": true })).into_response()
}

async fn session(State(backend): Shared, headers: HeaderMap) -> Response {
    record(&backend, "GET /auth/session", &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    if *backend.echo_session.lock().unwrap() {
        let token = backend.valid_token.lock().unwrap().clone();
        Json(json!({ "user": user_json(), "accessToken": token })).into_response()
    } else {
        Json(json!({ "user": null, "accessToken": null })).into_response()
    }
}

async fn list_tasks(State(backend): Shared, headers: HeaderMap) -> Response {
    record(&backend, "GET /tasks", &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    Json(Value::Array(backend.tasks.lock().unwrap().clone())).into_response()
}

async fn create_task(
    State(backend): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&backend, "POST /tasks", &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let title = body["title"].as_str().unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Title is required");
    }
    let id = {
        let mut next = backend.next_id.lock().unwrap();
        *next += 1;
        format!("task-{}", *next)
    };
    let stamp = now();
    let task = json!({
        "id": id,
        "title": title,
        "description": body.get("description").cloned().unwrap_or(Value::Null),
        "completed": false,
        "created_at": stamp,
        "updated_at": stamp
    });
    backend.tasks.lock().unwrap().insert(0, task.clone());
    (StatusCode::CREATED, Json(task)).into_response()
}

fn with_task<F>(backend: &Backend, id: &str, f: F) -> Response
where
    F: FnOnce(&mut Vec<Value>, usize) -> Response,
{
    match id {
        "forbidden" => return error(StatusCode::FORBIDDEN, "You do not have access to this task"),
        "boom" => return error(StatusCode::INTERNAL_SERVER_ERROR, "database on fire"),
        "conflict" => return error(StatusCode::CONFLICT, "Task is locked"),
        _ => {}
    }
    let mut tasks = backend.tasks.lock().unwrap();
    match tasks.iter().position(|t| t["id"] == id) {
        Some(index) => f(&mut tasks, index),
        None => error(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn get_task(State(backend): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    record(&backend, &format!("GET /tasks/{}", id), &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    with_task(&backend, &id, |tasks, i| Json(tasks[i].clone()).into_response())
}

async fn update_task(
    State(backend): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    record(&backend, &format!("PUT /tasks/{}", id), &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    with_task(&backend, &id, |tasks, i| {
        let task = &mut tasks[i];
        if let Some(title) = body.get("title").and_then(Value::as_str) {
            task["title"] = json!(title);
        }
        if let Some(description) = body.get("description") {
            task["description"] = description.clone();
        }
        task["updated_at"] = json!(now());
        Json(task.clone()).into_response()
    })
}

async fn delete_task(
    State(backend): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    record(&backend, &format!("DELETE /tasks/{}", id), &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    with_task(&backend, &id, |tasks, i| {
        tasks.remove(i);
        StatusCode::NO_CONTENT.into_response()
    })
}

async fn toggle_task(
    State(backend): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    record(&backend, &format!("PATCH /tasks/{}/complete", id), &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    with_task(&backend, &id, |tasks, i| {
        let task = &mut tasks[i];
        let completed = task["completed"].as_bool().unwrap_or(false);
        task["completed"] = json!(!completed);
        Json(task.clone()).into_response()
    })
}

async fn chat(
    State(backend): Shared,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    record(&backend, &format!("POST /{}/chat", user_id), &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    if user_id != USER_ID {
        return error(StatusCode::FORBIDDEN, "Forbidden");
    }
    let conversation_id = body["conversation_id"].as_str().unwrap_or("conv-new").to_string();
    Json(json!({
        "conversation_id": conversation_id,
        "response": format!("You said: {}", body["message"].as_str().unwrap_or_default()),
        "tool_calls": [{ "name": "list_tasks", "result": "0 tasks" }]
    }))
    .into_response()
}

async fn list_conversations(
    State(backend): Shared,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Response {
    record(&backend, &format!("GET /{}/conversations", user_id), &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    Json(json!([
        { "id": "conv-1", "created_at": now(), "updated_at": now() }
    ]))
    .into_response()
}

async fn get_conversation(
    State(backend): Shared,
    headers: HeaderMap,
    Path((user_id, id)): Path<(String, String)>,
) -> Response {
    record(&backend, &format!("GET /{}/conversations/{}", user_id, id), &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    if id != "conv-1" {
        return error(StatusCode::NOT_FOUND, "Conversation not found");
    }
    Json(json!({
        "id": "conv-1",
        "created_at": now(),
        "updated_at": now(),
        "messages": [
            { "id": "m-1", "role": "user", "content": "add buy milk", "created_at": now() },
            { "id": "m-2", "role": "assistant", "content": "Done.", "created_at": now() }
        ]
    }))
    .into_response()
}

async fn chatkit_session(State(backend): Shared, headers: HeaderMap) -> Response {
    record(&backend, "POST /chatkit/session", &headers).await;
    if !authorized(&backend, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    Json(json!({ "client_secret": "ck-secret" })).into_response()
}
