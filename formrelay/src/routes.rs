use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{CleanupPolicy, ServerConfig};
use crate::error::Error;
use crate::handlers;
use crate::mail::{Envelope, Mailer};
use crate::staging::Stager;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct Context {
    pub mailer: Arc<dyn Mailer>,
    pub stager: Stager,
    pub envelope: Arc<Envelope>,
    pub cleanup: CleanupPolicy,
}

impl Context {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        stager: Stager,
        envelope: Envelope,
        cleanup: CleanupPolicy,
    ) -> Self {
        Context {
            mailer,
            stager,
            envelope: Arc::new(envelope),
            cleanup,
        }
    }
}

type Allowlist = Arc<Vec<HeaderValue>>;

pub fn router(ctx: Context, config: &ServerConfig) -> Router {
    let origins: Vec<HeaderValue> = config
        .origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unusable origin in allowlist");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins.clone()))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/backend/apply",
            post(handlers::apply).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/backend/contact", post(handlers::contact))
        .with_state(ctx)
        .layer(middleware::from_fn_with_state(
            Arc::new(origins),
            reject_foreign_origin,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Browsers always send `Origin` on cross-origin requests; anything outside
/// the allowlist is refused before it reaches a handler. Requests without
/// the header pass through.
async fn reject_foreign_origin(
    State(allowed): State<Allowlist>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        if !allowed.iter().any(|candidate| candidate == origin) {
            let origin = String::from_utf8_lossy(origin.as_bytes()).into_owned();
            tracing::warn!(%origin, "rejected request from disallowed origin");
            return Error::ForbiddenOrigin(origin).into_response();
        }
    }
    next.run(request).await
}
