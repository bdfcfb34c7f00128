//! # Axum server
//!
//! Routes mirror the `/server/*` API of the forum front end. Uploaded images
//! are served as static files under the media URL prefix.

pub mod error;
pub mod forms;
pub mod handlers;
pub mod metrics;
pub mod state;

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Request};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info_span;

pub use error::ApiError;
pub use metrics::Metrics;
pub use state::AppState;

const REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub upload_dir: PathBuf,
    /// Where `upload_dir` is served, e.g. `/uploads`
    pub url_prefix: String,
    pub max_body_bytes: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            url_prefix: "/uploads".into(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

pub fn build_router(state: AppState, config: &RouterConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID);

    let api = Router::new()
        .route("/server/createAccount", put(handlers::create_account))
        .route("/server/login", post(handlers::login))
        .route("/server/logout", post(handlers::logout))
        .route("/server/isLoggedIn", get(handlers::is_logged_in))
        .route("/server/getThread", get(handlers::get_thread))
        .route("/server/getComments", get(handlers::get_comments))
        .route("/server/dumpThreads", get(handlers::dump_threads))
        .route("/server/numThreads", get(handlers::num_threads))
        .route("/server/deleteThread", delete(handlers::delete_thread))
        .route("/server/deleteComment", delete(handlers::delete_comment))
        .route("/server/createThread", post(handlers::create_thread))
        .route("/server/createComment", post(handlers::create_comment))
        .route("/server/updateLikeCount", post(handlers::update_like_count))
        .route("/metrics", get(metrics::render))
        .route_layer(middleware::from_fn_with_state(state.clone(), metrics::track));

    api.nest_service(&config.url_prefix, ServeDir::new(&config.upload_dir))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    let id = req
                        .headers()
                        .get(REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    info_span!("http", method = %req.method(), uri = %req.uri(), request_id = %id)
                }))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
