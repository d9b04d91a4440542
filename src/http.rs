//! HTTP server: gateway webhook and Prometheus metrics.
//!
//! `POST /` receives gateway events. The event is decoded before the
//! response is sent, then dispatched on its own task so the gateway is
//! never held up by handlers. `GET /metrics` serves Prometheus text.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use cqbot_proto::Event;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

use crate::app::App;
use crate::security::signature;

#[derive(Clone)]
struct HttpState {
    app: App,
    secret: Option<String>,
}

/// Builds the router. With a `secret`, every event must be signed.
pub fn router(app: App, secret: Option<String>) -> Router {
    Router::new()
        .route("/", post(handle_event))
        .route("/metrics", get(metrics_handler))
        .with_state(HttpState { app, secret })
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn handle_event(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = &state.secret {
        let header = headers
            .get(signature::HEADER)
            .and_then(|v| v.to_str().ok());
        match header {
            Some(header) if signature::verify(secret, &body, header) => {}
            Some(_) => {
                warn!("Invalid webhook signature");
                return reject(StatusCode::FORBIDDEN);
            }
            None => {
                warn!("Missing X-Signature header");
                return reject(StatusCode::UNAUTHORIZED);
            }
        }
    }

    let event = match Event::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Undecodable webhook body");
            return reject(StatusCode::BAD_REQUEST);
        }
    };
    debug!(post_type = event.post_type(), "Webhook event accepted");

    let app = state.app.clone();
    tokio::spawn(async move { app.dispatch_event(event).await });
    StatusCode::OK
}

fn reject(status: StatusCode) -> StatusCode {
    crate::metrics::record_webhook_rejected(status.as_u16());
    status
}

/// Serves the router on `0.0.0.0:port` until the listener fails.
pub async fn serve(app: App, port: u16, secret: Option<String>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, router(app, secret)).await
}
