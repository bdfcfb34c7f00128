use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use api_adapters::{build_router, AppState, RouterConfig};
use auth_adapters::{Argon2Hasher, MemorySessionStore};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use services::{Forum, ForumPolicy, Ports};
use storage_adapters::{
    LocalMediaStore, MemoryAccountRepository, MemoryCommentRepository, MemoryLikeRepository,
    MemoryThreadRepository,
};
use tower::ServiceExt;

const BOUNDARY: &str = "forum-test-boundary";

fn app() -> Router {
    static N: AtomicUsize = AtomicUsize::new(0);
    let upload_dir = std::env::temp_dir().join(format!(
        "forum-handlers-{}-{}",
        std::process::id(),
        N.fetch_add(1, Ordering::Relaxed)
    ));
    let accounts = Arc::new(MemoryAccountRepository::new());
    let threads = Arc::new(MemoryThreadRepository::new());
    let comments = Arc::new(MemoryCommentRepository::new());
    let ports = Ports {
        likes: Arc::new(MemoryLikeRepository::new(
            accounts.clone(),
            threads.clone(),
            comments.clone(),
        )),
        accounts,
        threads,
        comments,
        sessions: Arc::new(MemorySessionStore::default()),
        hasher: Arc::new(Argon2Hasher::from_costs(1024, 1, 1).unwrap()),
        media: Arc::new(LocalMediaStore::new(&upload_dir, "/uploads")),
    };
    let forum = Forum::new(ports, ForumPolicy::default());
    let config = RouterConfig {
        upload_dir,
        ..RouterConfig::default()
    };
    build_router(AppState::new(forum), &config)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn multipart(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn sign_up(app: &Router, username: &str) {
    let creds = json!({ "username": username, "password": "pw" });
    let (status, _) = send(app, json_request(Method::PUT, "/server/createAccount", creds.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app, json_request(Method::POST, "/server/login", creds)).await;
    assert_eq!(status, StatusCode::OK);
}

async fn new_thread(app: &Router, title: &str) {
    let (status, body) = send(
        app,
        multipart(
            "/server/createThread",
            &[("username", "alice"), ("password", "pw"), ("title", title), ("text", "first post")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

async fn comment(app: &Router, thread: &str, post_parent: bool, parent_id: &str, text: &str) -> String {
    let flag = if post_parent { "true" } else { "false" };
    let (status, body) = send(
        app,
        multipart(
            "/server/createComment",
            &[
                ("username", "alice"),
                ("password", "pw"),
                ("post_id", thread),
                ("post_parent", flag),
                ("parent_id", parent_id),
                ("text", text),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn account_lifecycle() {
    let app = app();
    let (_, logged_in) = send(&app, get("/server/isLoggedIn?username=alice")).await;
    assert_eq!(logged_in, json!(false));

    sign_up(&app, "alice").await;
    let (_, logged_in) = send(&app, get("/server/isLoggedIn?username=alice")).await;
    assert_eq!(logged_in, json!(true));

    let (status, body) = send(
        &app,
        json_request(Method::PUT, "/server/createAccount", json!({ "username": "alice", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Username 'alice' taken" }));

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/server/logout", json!({ "username": "alice", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, logged_in) = send(&app, get("/server/isLoggedIn?username=alice")).await;
    assert_eq!(logged_in, json!(false));
}

#[tokio::test]
async fn nested_comments_round_trip() {
    let app = app();
    sign_up(&app, "alice").await;
    new_thread(&app, "Hello World").await;

    let top = comment(&app, "Hello World", true, "Hello World", "top").await;
    assert_eq!(top, "1-Hello_World");
    let reply = comment(&app, "Hello World", false, &top, "reply").await;
    assert_eq!(reply, "2-Hello_World");

    let (status, body) = send(&app, get("/server/getComments?post_id=Hello%20World")).await;
    assert_eq!(status, StatusCode::OK);
    let comments = body["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["comment_id"], "1-Hello World");
    assert_eq!(comments[0]["children"][0]["comment_body"], "reply");
    assert_eq!(comments[0]["children"][0]["time"], "Just now");

    let (_, thread) = send(&app, get("/server/getThread?post_id=Hello%20World")).await;
    assert_eq!(thread["posts"], 3);
    assert_eq!(thread["post_body"], "first post");
}

#[tokio::test]
async fn mutations_require_a_session() {
    let app = app();
    let (status, body) = send(
        &app,
        multipart(
            "/server/createThread",
            &[("username", "ghost"), ("password", "pw"), ("title", "Hi"), ("text", "x")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, multipart("/server/createThread", &[("title", "Hi")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You must be logged in for this operation.");
}

#[tokio::test]
async fn missing_thread_is_404_with_envelope() {
    let app = app();
    let (status, body) = send(&app, get("/server/getThread?post_id=Nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Nope"));

    let (status, _) = send(&app, get("/server/getComments")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_pages_and_orders() {
    let app = app();
    sign_up(&app, "alice").await;
    for title in ["One", "Two", "Three"] {
        new_thread(&app, title).await;
    }
    comment(&app, "One", true, "One", "bump my post count").await;

    let (_, total) = send(&app, get("/server/numThreads")).await;
    assert_eq!(total, json!(3));

    let (_, page) = send(&app, get("/server/dumpThreads?amount=2&page=2&order=posts")).await;
    assert_eq!(page.as_array().unwrap().len(), 1);

    let (_, all) = send(&app, get("/server/dumpThreads?amount=All&order=posts")).await;
    assert_eq!(all[0]["title"], "One");
    assert_eq!(all[0]["posts"], 2);

    let (status, _) = send(&app, get("/server/dumpThreads?order=sideways")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn likes_toggle_and_reject_ambiguous_targets() {
    let app = app();
    sign_up(&app, "alice").await;
    new_thread(&app, "Likeable").await;

    let like = json!({ "username": "alice", "password": "pw", "thread": "Likeable" });
    let (status, _) = send(&app, json_request(Method::POST, "/server/updateLikeCount", like.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (_, thread) = send(&app, get("/server/getThread?post_id=Likeable")).await;
    assert_eq!(thread["likes"], 1);

    send(&app, json_request(Method::POST, "/server/updateLikeCount", like)).await;
    let (_, thread) = send(&app, get("/server/getThread?post_id=Likeable")).await;
    assert_eq!(thread["likes"], 0);

    let both = json!({ "username": "alice", "password": "pw", "thread": "Likeable", "comment": "1-Likeable" });
    let (status, _) = send(&app, json_request(Method::POST, "/server/updateLikeCount", both)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_thread_cascades() {
    let app = app();
    sign_up(&app, "alice").await;
    new_thread(&app, "Doomed").await;
    let top = comment(&app, "Doomed", true, "Doomed", "bye").await;

    let (status, _) = send(
        &app,
        json_request(
            Method::DELETE,
            "/server/deleteComment",
            json!({ "username": "alice", "password": "pw", "commentID": top }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, get("/server/getComments?post_id=Doomed")).await;
    assert_eq!(body["comments"][0]["author"], "[DELETED]");

    let (status, _) = send(
        &app,
        json_request(
            Method::DELETE,
            "/server/deleteThread",
            json!({ "username": "alice", "password": "pw", "title": "Doomed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, get("/server/getComments?post_id=Doomed")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get("/server/getThread?post_id=Doomed")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_are_exposed() {
    let app = app();
    send(&app, get("/server/numThreads")).await;
    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("route=\"/server/numThreads\""));
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = app();
    let response = app.clone().oneshot(get("/server/numThreads")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
