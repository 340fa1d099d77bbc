//! Webhook Server
//!
//! HTTP endpoint receiving GitHub webhook deliveries:
//! - `GET /health`
//! - `POST /webhook`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::github::RepositoryGateway;
use crate::juggler::LabelJuggler;
use crate::webhook::{self, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};

/// Server state shared across handlers
pub struct AppState<G> {
    /// Evaluation pipeline
    pub juggler: LabelJuggler<G>,

    /// Webhook secret; deliveries are not authenticated when None
    pub webhook_secret: Option<String>,
}

impl<G> AppState<G> {
    /// Create new server state
    pub fn new(juggler: LabelJuggler<G>, webhook_secret: Option<String>) -> Self {
        Self {
            juggler,
            webhook_secret,
        }
    }
}

/// Body returned for every webhook delivery
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `evaluated`, `ignored`, `not_found`, or `error`
    pub status: &'static str,

    /// Delivery ID echoed from the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,

    /// Node IDs of removed labels
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,

    /// Whether removals were only computed
    pub dry_run: bool,

    /// Error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookResponse {
    fn new(status: &'static str, delivery: Option<String>) -> Self {
        Self {
            status,
            delivery,
            removed: Vec::new(),
            dry_run: false,
            message: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// HTTP status reported for a failed evaluation
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::NotFound(_) => StatusCode::ACCEPTED,
        Error::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Mutation(_) | Error::GitHubApi(_) | Error::GraphQl(_) => StatusCode::BAD_GATEWAY,
        Error::Json(_) => StatusCode::BAD_REQUEST,
        Error::InvalidSignature => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the HTTP router
pub fn build_router<G: RepositoryGateway + 'static>(state: Arc<AppState<G>>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler::<G>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C
///
/// # Errors
/// Returns an error if binding or serving fails
pub async fn run_server<G: RepositoryGateway + 'static>(
    state: Arc<AppState<G>>,
    addr: SocketAddr,
) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("label-juggler listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("label-juggler stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn webhook_handler<G: RepositoryGateway + 'static>(
    State(state): State<Arc<AppState<G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let delivery = header(&headers, DELIVERY_HEADER).map(str::to_string);

    if let Some(secret) = &state.webhook_secret {
        let verified = header(&headers, SIGNATURE_HEADER)
            .is_some_and(|signature| webhook::verify_signature(&body, signature, secret));
        if !verified {
            warn!(?delivery, "Rejected delivery with invalid signature");
            let response = WebhookResponse::new("error", delivery)
                .with_message(Error::InvalidSignature.to_string());
            return (StatusCode::UNAUTHORIZED, Json(response)).into_response();
        }
    }

    let Some(event_name) = header(&headers, EVENT_HEADER) else {
        let response = WebhookResponse::new("error", delivery)
            .with_message(format!("missing {EVENT_HEADER} header"));
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    };

    let event = match webhook::parse_event(event_name, &body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!(?delivery, event = event_name, "Ignored delivery");
            return (
                StatusCode::ACCEPTED,
                Json(WebhookResponse::new("ignored", delivery)),
            )
                .into_response();
        }
        Err(e) => {
            warn!(?delivery, event = event_name, "Malformed payload: {}", e);
            let response = WebhookResponse::new("error", delivery).with_message(e.to_string());
            return (status_for(&e), Json(response)).into_response();
        }
    };

    let target = event.target();
    match state.juggler.handle_event(&event).await {
        Ok(evaluation) => {
            debug!(?delivery, %target, removed = evaluation.removed.len(), "Evaluated");
            let mut response = WebhookResponse::new("evaluated", delivery);
            response.removed = evaluation.removed_ids();
            response.dry_run = evaluation.dry_run;
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(Error::NotFound(what)) => {
            debug!(?delivery, %target, "Labelable vanished before evaluation: {}", what);
            (
                StatusCode::ACCEPTED,
                Json(WebhookResponse::new("not_found", delivery)),
            )
                .into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(?delivery, %target, "Evaluation failed: {}", e);
            } else {
                warn!(?delivery, %target, "Evaluation failed: {}", e);
            }
            let response = WebhookResponse::new("error", delivery).with_message(e.to_string());
            (status, Json(response)).into_response()
        }
    }
}
