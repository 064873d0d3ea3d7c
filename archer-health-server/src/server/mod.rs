pub mod auth;
mod config;
mod connect;
mod gate;
mod meals;
mod water;

use crate::server::auth::AuthCtx;
use archer_health_shared::api;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    extract::{Extension, State},
    http::{Method, StatusCode, header},
    routing::{get, post, put},
};
pub use config::AppConfig;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info_span;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: crate::storage::Store,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, store: crate::storage::Store) -> Self {
        Self {
            config,
            store,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/auth-enabled", get(api_auth_enabled))
        .route("/api/sync-user", post(api_sync_user))
        .route(
            "/api/generate-connection-code",
            post(connect::api_generate_connection_code),
        )
        .route(
            "/api/redeem-connection-code",
            post(connect::api_redeem_connection_code),
        )
        .route(
            "/api/meals",
            get(meals::api_list_meals).post(meals::api_create_meal),
        )
        .route("/api/todays-meals", get(meals::api_todays_meals))
        .route("/api/water/goal", put(water::api_set_water_goal))
        .route("/api/water/daily-goals", post(water::api_upsert_daily_goal))
        .with_state(state.clone());

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            subject = tracing::field::Empty
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .merge(api_routes)
        .merge(water::hydration_router(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::enforce_gate,
        ))
        .layer(trace)
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for the web frontend dev server if configured

    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    // Put into request extensions for trace layer & handlers
    req.extensions_mut().insert(ReqId(rid.clone()));
    // Call next
    let mut resp = next.run(req).await;
    // Set header on response
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn api_auth_enabled(State(state): State<AppState>) -> Json<api::AuthEnabledDto> {
    Json(api::AuthEnabledDto {
        enabled: state.config.session_jwt_secret.is_some(),
    })
}

/// Provisions (or refreshes) the user row for the verified subject. This is
/// the only endpoint that creates users; everything else expects the row to
/// exist already.
async fn api_sync_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::SyncUserReq>,
) -> Result<Json<api::UserProfileDto>, AppError> {
    let user = state
        .store
        .upsert_user(&auth.claims.sub, body.display_name.as_deref())
        .await
        .map_err(AppError::internal)?;
    Ok(Json(user_profile_dto(user)))
}

fn user_profile_dto(user: crate::storage::models::User) -> api::UserProfileDto {
    api::UserProfileDto {
        id: user.id,
        subject: user.subject,
        display_name: user.display_name,
        water_goal_oz: user.water_goal_oz,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized
    }
    fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".into(),
                "unauthorized",
                None,
            ),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        // Log any error responses at ERROR level for troubleshooting
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else {
            tracing::error!(status = %status, kind = kind, message = %msg, "request failed");
        }
        let body = axum::Json(ErrorBody { error: msg });
        (status, body).into_response()
    }
}
