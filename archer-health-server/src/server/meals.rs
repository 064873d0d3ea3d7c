use archer_health_shared::api;
use axum::{
    Json,
    extract::{Extension, State},
};
use chrono::{Duration, NaiveTime, Utc};

use super::auth::{self, AuthCtx};
use super::{AppError, AppState};
use crate::storage::models::{Meal, MealFood};
use crate::storage::{NewFoodData, NewMealData};

pub(super) async fn api_create_meal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::NewMealReq>,
) -> Result<Json<api::MealDto>, AppError> {
    let user = auth::resolve_user(&state, &auth).await?;
    if body.foods.is_empty() {
        return Err(AppError::bad_request("at least one food item is required"));
    }
    let data = NewMealData {
        name: body.name.clone(),
        total_calories: macro_field(body.total_calories.as_ref(), "totalCalories")?,
        total_protein: macro_field(body.total_protein.as_ref(), "totalProtein")?,
        total_carbs: macro_field(body.total_carbs.as_ref(), "totalCarbs")?,
        total_fat: macro_field(body.total_fat.as_ref(), "totalFat")?,
        is_public: body.is_public.unwrap_or(false),
        image_url: body.image_url.clone(),
        foods: body
            .foods
            .iter()
            .map(|f| NewFoodData {
                name: f.name.clone(),
                quantity: f.quantity,
                unit: f.unit.clone(),
                calories: f.calories,
            })
            .collect(),
    };
    let (meal, foods) = state
        .store
        .insert_meal(user.id, data)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(meal_dto(meal, foods)))
}

pub(super) async fn api_list_meals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<api::MealDto>>, AppError> {
    let user = auth::resolve_user(&state, &auth).await?;
    let rows = state
        .store
        .list_meals(user.id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(
        rows.into_iter().map(|(m, f)| meal_dto(m, f)).collect(),
    ))
}

pub(super) async fn api_todays_meals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<api::TodaysMealsDto>, AppError> {
    let user = auth::resolve_user(&state, &auth).await?;
    let today = Utc::now().date_naive();
    let start = today.and_time(NaiveTime::MIN);
    let end = start + Duration::days(1);
    let rows = state
        .store
        .list_meals_between(user.id, start, end)
        .await
        .map_err(AppError::internal)?;
    let meal_entries: Vec<api::MealDto> = rows.into_iter().map(|(m, f)| meal_dto(m, f)).collect();
    let total_calories = meal_entries.iter().map(|m| m.total_calories).sum();
    Ok(Json(api::TodaysMealsDto {
        total_calories,
        meal_entries,
        date: today.format("%Y-%m-%d").to_string(),
    }))
}

/// Macro totals arrive from web forms as either JSON numbers or numeric
/// strings; both are accepted, anything else is rejected.
fn macro_field(value: Option<&serde_json::Value>, name: &str) -> Result<f64, AppError> {
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::bad_request(format!("{name} must be a number")))
}

fn meal_dto(meal: Meal, foods: Vec<MealFood>) -> api::MealDto {
    api::MealDto {
        id: meal.id,
        name: meal.name,
        foods: foods
            .into_iter()
            .map(|f| api::FoodItemDto {
                name: f.name,
                quantity: f.quantity,
                unit: f.unit,
                calories: f.calories,
            })
            .collect(),
        total_calories: meal.total_calories,
        total_protein: meal.total_protein,
        total_carbs: meal.total_carbs,
        total_fat: meal.total_fat,
        is_public: meal.is_public,
        image_url: meal.image_url,
        created_at: chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(
            meal.created_at,
            chrono::Utc,
        )
        .to_rfc3339(),
    }
}
