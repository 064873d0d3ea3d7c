use serde::{Deserialize, Serialize};

pub mod endpoints;
#[cfg(feature = "rest-client")]
pub mod rest;

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthEnabledDto {
    pub enabled: bool,
}

// User profile
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncUserReq {
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileDto {
    pub id: i32,
    pub subject: String,
    pub display_name: Option<String>,
    pub water_goal_oz: Option<f64>,
}

// Connection code
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCodeResp {
    pub connection_code: String,
}

/// Field presence is validated by the handler, not serde; a missing field
/// reports 400 regardless of the other one.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemReq {
    pub connection_code: Option<String>,
    pub archer_aqua_user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResp {
    pub success: bool,
    pub archer_health_user_id: i32,
}

// Hydration
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationGoalsDto {
    pub water_goal: f64,
    /// Always `"ml"`; the server converts ounce-denominated defaults.
    pub water_goal_unit: String,
    /// True when a per-date goal override supplied the value.
    pub daily_goal: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterGoalReq {
    pub goal_oz: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyGoalReq {
    pub date: String,
    pub goal_ml: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyGoalDto {
    pub date: String,
    pub goal_ml: f64,
}

// Meals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItemDto {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub calories: Option<f64>,
}

/// Macro totals arrive as `serde_json::Value` so the handler can accept
/// either JSON numbers or numeric strings and reject anything else itself.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMealReq {
    pub name: Option<String>,
    #[serde(default)]
    pub foods: Vec<FoodItemDto>,
    #[serde(default)]
    pub total_calories: Option<serde_json::Value>,
    #[serde(default)]
    pub total_protein: Option<serde_json::Value>,
    #[serde(default)]
    pub total_carbs: Option<serde_json::Value>,
    #[serde(default)]
    pub total_fat: Option<serde_json::Value>,
    pub is_public: Option<bool>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealDto {
    pub id: i32,
    pub name: Option<String>,
    pub foods: Vec<FoodItemDto>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub is_public: bool,
    pub image_url: Option<String>,
    pub created_at: String, // RFC3339 UTC
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaysMealsDto {
    pub total_calories: f64,
    pub meal_entries: Vec<MealDto>,
    pub date: String, // YYYY-MM-DD UTC
}
