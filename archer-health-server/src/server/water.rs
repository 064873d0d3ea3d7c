use std::str::FromStr;

use archer_health_shared::api;
use archer_health_shared::domain::{self, GoalDate};
use axum::{
    Json, Router,
    extract::{Extension, Query, State},
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use super::auth::{self, AuthCtx};
use super::{AppError, AppState, connect};

/// The hydration lookup is fetched cross-origin by the deployed companion
/// app, so it gets its own router with permissive CORS. The layer also
/// answers OPTIONS preflights itself with an empty body.
pub(super) fn hydration_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/api/water/hydration-goals", get(api_hydration_goals))
        .with_state(state)
        .layer(cors)
}

#[derive(Deserialize)]
pub(super) struct HydrationQuery {
    date: Option<String>,
}

/// Resolves the caller's hydration goal for one day: per-date override
/// first, then the stored default (ounces, converted), then the fixed
/// fallback. The bearer credential is a connection code, not a session
/// token, and reading it here does not invalidate it.
pub(super) async fn api_hydration_goals(
    State(state): State<AppState>,
    Query(query): Query<HydrationQuery>,
    headers: HeaderMap,
) -> Result<Json<api::HydrationGoalsDto>, AppError> {
    // Missing, malformed, and unknown codes are all 401; the response does
    // not distinguish them.
    let code = auth::bearer_token(&headers).ok_or_else(AppError::unauthorized)?;
    let user = state
        .store
        .find_user_by_active_code(code, connect::code_cutoff())
        .await
        .map_err(AppError::internal)?
        .ok_or_else(AppError::unauthorized)?;

    let date = match query.date.as_deref() {
        Some(raw) => GoalDate::from_str(raw).map_err(|e| AppError::bad_request(e.to_string()))?,
        None => GoalDate::today_utc(),
    };
    let override_ml = state
        .store
        .get_daily_goal(user.id, date.as_str())
        .await
        .map_err(AppError::internal)?;
    let (water_goal, daily_goal) = match override_ml {
        Some(ml) => (ml, true),
        None => match user.water_goal_oz {
            Some(oz) => (domain::oz_to_ml(oz), false),
            None => (domain::DEFAULT_WATER_GOAL_ML, false),
        },
    };
    Ok(Json(api::HydrationGoalsDto {
        water_goal,
        water_goal_unit: "ml".to_string(),
        daily_goal,
    }))
}

pub(super) async fn api_set_water_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::WaterGoalReq>,
) -> Result<Json<api::UserProfileDto>, AppError> {
    if !body.goal_oz.is_finite() || body.goal_oz <= 0.0 {
        return Err(AppError::bad_request("goalOz must be a positive number"));
    }
    let user = auth::resolve_user(&state, &auth).await?;
    let updated = state
        .store
        .set_water_goal(user.id, body.goal_oz)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(super::user_profile_dto(updated)))
}

pub(super) async fn api_upsert_daily_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::DailyGoalReq>,
) -> Result<Json<api::DailyGoalDto>, AppError> {
    let date = GoalDate::from_str(&body.date).map_err(|e| AppError::bad_request(e.to_string()))?;
    if !body.goal_ml.is_finite() || body.goal_ml <= 0.0 {
        return Err(AppError::bad_request("goalMl must be a positive number"));
    }
    let user = auth::resolve_user(&state, &auth).await?;
    let row = state
        .store
        .upsert_daily_goal(user.id, date.as_str(), body.goal_ml)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(api::DailyGoalDto {
        date: row.date,
        goal_ml: row.goal_ml,
    }))
}
