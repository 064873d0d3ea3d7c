use crate::storage::schema::{daily_goals, meal_foods, meals, users};
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub subject: String,
    pub display_name: Option<String>,
    pub water_goal_oz: Option<f64>,
    pub connection_code: Option<String>,
    pub connection_code_issued_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub subject: &'a str,
    pub display_name: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = daily_goals)]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct DailyGoal {
    pub id: i32,
    pub user_id: i32,
    pub date: String,
    pub goal_ml: f64,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = daily_goals)]
pub struct NewDailyGoal<'a> {
    pub user_id: i32,
    pub date: &'a str,
    pub goal_ml: f64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = meals)]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct Meal {
    pub id: i32,
    pub user_id: i32,
    pub name: Option<String>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub is_public: bool,
    pub image_url: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = meals)]
pub struct NewMeal<'a> {
    pub user_id: i32,
    pub name: Option<&'a str>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub is_public: bool,
    pub image_url: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = meal_foods)]
#[diesel(belongs_to(Meal, foreign_key = meal_id))]
pub struct MealFood {
    pub id: i32,
    pub meal_id: i32,
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub calories: Option<f64>,
}

#[derive(Insertable)]
#[diesel(table_name = meal_foods)]
pub struct NewMealFood<'a> {
    pub meal_id: i32,
    pub name: &'a str,
    pub quantity: Option<f64>,
    pub unit: Option<&'a str>,
    pub calories: Option<f64>,
}
