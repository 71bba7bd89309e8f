use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use form_eth_auth::{authenticate, AuthContext, AuthError, AuthRequest, AuthResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Healthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: option_env!("CARGO_PKG_VERSION").map(String::from),
    })
}

/// `POST /api/eth-auth`
///
/// Body rejections from the `Json` extractor (bad JSON, wrong content type,
/// missing fields) are reported as malformed requests.
pub async fn eth_auth(
    State(ctx): State<AuthContext>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(request) = payload.map_err(|rejection| {
        log::warn!("ETH_AUTH: Rejected request body: {}", rejection.body_text());
        AuthError::MalformedRequest(rejection.body_text())
    })?;

    match authenticate(&ctx, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            if e.status_code().is_server_error() {
                log::error!("ETH_AUTH: Login failed: {}", e);
            } else {
                log::info!("ETH_AUTH: Login rejected ({}): {}", e.kind(), e);
            }
            Err(e)
        }
    }
}

/// Logs every request with its outcome and latency
pub async fn activity_logger(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    log::info!(
        "ACTIVITY: {} {} -> {} in {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not_found", "message": "The requested resource wasn't found." })),
    )
}

pub fn app(ctx: AuthContext) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/eth-auth", post(eth_auth))
        .fallback(not_found)
        .with_state(ctx)
        .layer(middleware::from_fn(activity_logger))
}

/// Serve the API until the listener fails
pub async fn serve(ctx: AuthContext, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let router = app(ctx);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Running eth auth API server at {}", addr);

    if let Err(e) = axum::serve(listener, router).await {
        log::error!("Error serving eth auth API server: {e}");
        return Err(Box::new(e));
    }

    Ok(())
}
