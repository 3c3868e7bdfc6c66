// Shared fixture: an in-process backend speaking the triage HTTP API.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::cookie::Cookie;
use actix_web::dev::ServerHandle;
use actix_web::{web, App, Error, HttpRequest, HttpResponse, HttpServer};
use async_stream::stream;
use serde::Deserialize;
use serde_json::{json, Value};

use triage_client::{BackendClient, ClientConfig};

pub const SESSION_COOKIE: &str = "access_token";
pub const SESSION_TOKEN: &str = "token-123";
pub const PASSWORD: &str = "correct horse";

/// Mutable state behind the fixture server, inspected by tests after each call.
#[derive(Debug, Default)]
pub struct Backend {
    pub total_threads: usize,
    pub indexed_emails: u64,
    pub index_calls: usize,
    pub chat_messages: Vec<String>,
    pub replies: Vec<(String, Value)>,
    pub signups: Vec<Value>,
    pub page_requests: Vec<(u32, u32)>,
    pub sync_polls: usize,
    pub sync_done_after: usize,
    pub sync_error: Option<String>,
}

impl Backend {
    pub fn with_threads(total_threads: usize) -> Self {
        Backend { total_threads, indexed_emails: 12, ..Default::default() }
    }
}

type Shared = web::Data<Mutex<Backend>>;

pub struct TestBackend {
    pub state: Arc<Mutex<Backend>>,
    pub client: BackendClient,
    handle: ServerHandle,
}

impl TestBackend {
    pub fn state(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.state.lock().unwrap()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

/// Starts the fixture on an ephemeral port and returns a client pointed at it. The
/// base URL carries a trailing `/api` to exercise normalisation.
pub async fn start(backend: Backend) -> TestBackend {
    let _ = env_logger::builder().is_test(true).try_init();

    let state = Arc::new(Mutex::new(backend));
    let data: Shared = web::Data::from(state.clone());
    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    let config = ClientConfig::new(&format!("http://{}/api/", addr)).unwrap();
    TestBackend { state, client: BackendClient::new(config).unwrap(), handle }
}

/// Like [`start`], with the client already holding a session cookie.
pub async fn start_signed_in(backend: Backend) -> TestBackend {
    let test_backend = start(backend).await;
    test_backend.client.login("ada@example.com", PASSWORD).await.unwrap();
    test_backend
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/mail/threads", web::get().to(list_threads))
        .route("/mail/thread/{id}", web::get().to(get_thread))
        .route("/mail/thread/{id}/reply", web::post().to(reply))
        .route("/chat/stream", web::post().to(chat_stream))
        .route("/chat/status", web::get().to(chat_status))
        .route("/chat/index", web::post().to(chat_index))
        .route("/auth/me", web::get().to(me))
        .route("/auth/login", web::post().to(login))
        .route("/auth/logout", web::post().to(logout))
        .route("/auth/signup/complete", web::post().to(complete_signup))
        .route("/sync/status", web::get().to(sync_status));
}

pub fn thread_json(id: usize) -> Value {
    json!({
        "id": id,
        "subject": format!("Thread {}", id),
        "lastMessageDate": "2024-05-01T09:00:00Z",
        "brief": format!("Brief for thread {}", id),
        "done": false,
        "inboxStatus": true,
        "emails": [{
            "id": id * 10,
            "threadId": id,
            "subject": format!("Thread {}", id),
            "sentAt": "2024-05-01T09:00:00Z",
            "receivedAt": "2024-05-01T09:00:05Z",
            "labels": ["UNREAD", "INBOX"],
            "body": "<p>Hello <b>there</b></p>",
            "from_address": { "id": 1, "address": "grace@example.com", "name": "Grace Hopper" },
            "to_addresses": [{ "id": 2, "address": "ada@example.com", "name": "Ada Lovelace" }]
        }]
    })
}

fn is_signed_in(req: &HttpRequest) -> bool {
    req.cookie(SESSION_COOKIE).map_or(false, |c| c.value() == SESSION_TOKEN)
}

fn not_authenticated() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({ "detail": "Not authenticated" }))
}

#[derive(Deserialize)]
struct PageQuery {
    page: u32,
    limit: u32,
}

async fn list_threads(req: HttpRequest, state: Shared, query: web::Query<PageQuery>) -> HttpResponse {
    if !is_signed_in(&req) {
        return not_authenticated();
    }
    let mut backend = state.lock().unwrap();
    backend.page_requests.push((query.page, query.limit));
    let start = (query.page.saturating_sub(1) * query.limit) as usize + 1;
    let end = ((query.page * query.limit) as usize).min(backend.total_threads);
    let threads: Vec<Value> = (start..=end).map(thread_json).collect();
    HttpResponse::Ok().json(threads)
}

async fn get_thread(path: web::Path<String>) -> HttpResponse {
    match path.parse::<usize>() {
        Ok(id) if id < 1000 => HttpResponse::Ok().json(thread_json(id)),
        _ => HttpResponse::NotFound().json(json!({ "detail": "Thread not found" })),
    }
}

async fn reply(state: Shared, path: web::Path<String>, body: web::Json<Value>) -> HttpResponse {
    if body.get("subject").and_then(Value::as_str).map_or(true, str::is_empty) {
        return HttpResponse::UnprocessableEntity().json(json!({
            "detail": [{ "loc": ["body", "subject"], "msg": "subject must not be empty" }]
        }));
    }
    state.lock().unwrap().replies.push((path.into_inner(), body.into_inner()));
    HttpResponse::Ok().json(json!({ "status": "sent" }))
}

async fn chat_stream(req: HttpRequest, state: Shared, body: web::Json<Value>) -> HttpResponse {
    if !is_signed_in(&req) {
        return not_authenticated();
    }
    let message = body.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
    state.lock().unwrap().chat_messages.push(message.clone());

    if message == "fail" {
        return HttpResponse::InternalServerError()
            .content_type("text/plain")
            .body("upstream exploded");
    }

    let final_frame = json!({
        "type": "final",
        "data": {
            "answer": format!("You asked: {}", message),
            "sources": [{
                "email_id": 30,
                "thread_id": 3,
                "subject": "Thread 3",
                "from_address": "grace@example.com",
                "from_name": "Grace Hopper",
                "sent_at": "2024-05-01T09:00:00Z"
            }]
        }
    })
    .to_string();
    let (head, tail) = final_frame.split_at(final_frame.len() / 2);
    let (head, tail) = (head.to_string(), format!("{}\n", tail));

    // The final frame is split across chunks so the client has to reassemble it.
    let frames = stream! {
        yield Ok::<_, Error>(web::Bytes::from_static(b"{\"type\":\"progress\",\"data\":null}\n"));
        actix_web::rt::time::sleep(Duration::from_millis(5)).await;
        yield Ok(web::Bytes::from(head));
        actix_web::rt::time::sleep(Duration::from_millis(5)).await;
        yield Ok(web::Bytes::from(tail));
    };

    HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .streaming(frames)
}

async fn chat_status(state: Shared) -> HttpResponse {
    let backend = state.lock().unwrap();
    let status = if backend.indexed_emails > 0 { "ready" } else { "not_ready" };
    HttpResponse::Ok().json(json!({
        "indexed_emails": backend.indexed_emails,
        "ai_enabled": true,
        "status": status
    }))
}

async fn chat_index(state: Shared) -> HttpResponse {
    let mut backend = state.lock().unwrap();
    backend.index_calls += 1;
    backend.indexed_emails = 5;
    HttpResponse::Ok().json(json!({ "indexed": 5 }))
}

async fn me(req: HttpRequest) -> HttpResponse {
    if !is_signed_in(&req) {
        return not_authenticated();
    }
    HttpResponse::Ok().json(json!({ "id": 7, "email": "ada@example.com", "name": "Ada Lovelace" }))
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(body: web::Json<Credentials>) -> HttpResponse {
    if body.email == "locked@example.com" {
        return HttpResponse::Forbidden().json(json!({ "detail": "Account locked" }));
    }
    if body.password != PASSWORD {
        // A bare 401 with no body.
        return HttpResponse::Unauthorized().finish();
    }
    let cookie = Cookie::build(SESSION_COOKIE, SESSION_TOKEN).path("/").http_only(true).finish();
    HttpResponse::Ok().cookie(cookie).json(json!({ "message": "Logged in" }))
}

async fn logout() -> HttpResponse {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    HttpResponse::Ok().cookie(cookie).json(json!({ "message": "Logged out" }))
}

async fn complete_signup(state: Shared, body: web::Json<Value>) -> HttpResponse {
    state.lock().unwrap().signups.push(body.into_inner());
    HttpResponse::Ok().json(json!({ "message": "Sync started" }))
}

async fn sync_status(req: HttpRequest, state: Shared) -> HttpResponse {
    if !is_signed_in(&req) {
        return not_authenticated();
    }
    let mut backend = state.lock().unwrap();
    backend.sync_polls += 1;
    if let Some(error) = backend.sync_error.clone() {
        return HttpResponse::Ok().json(json!({ "state": "error", "error": error }));
    }
    if backend.sync_polls > backend.sync_done_after {
        HttpResponse::Ok().json(json!({ "state": "done", "processed": "42" }))
    } else {
        HttpResponse::Ok().json(json!({ "state": "running", "processed": backend.sync_polls.to_string() }))
    }
}
