pub mod models;
pub mod schema;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{DailyGoal, Meal, MealFood, NewDailyGoal, NewMeal, NewMealFood, NewUser, User};
use std::collections::HashMap;

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Column values for a meal plus its line items, collected by the handler
/// before the insert.
#[derive(Debug, Clone)]
pub struct NewMealData {
    pub name: Option<String>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub is_public: bool,
    pub image_url: Option<String>,
    pub foods: Vec<NewFoodData>,
}

#[derive(Debug, Clone)]
pub struct NewFoodData {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub calories: Option<f64>,
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store { pool })
    }

    /// Creates the user row for an identity-provider subject, or refreshes
    /// the display name of an existing one. Idempotent.
    pub async fn upsert_user(
        &self,
        subject: &str,
        display_name: Option<&str>,
    ) -> Result<User, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let subject_owned = subject.to_string();
        let name_owned = display_name.map(|s| s.to_string());
        tokio::task::spawn_blocking(move || -> Result<User, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<User, StorageError> {
                let existing = u::users
                    .filter(u::subject.eq(&subject_owned))
                    .first::<User>(conn)
                    .optional()?;
                match existing {
                    Some(user) => match name_owned.as_deref() {
                        Some(name) => Ok(diesel::update(u::users.find(user.id))
                            .set(u::display_name.eq(name))
                            .returning(User::as_returning())
                            .get_result(conn)?),
                        None => Ok(user),
                    },
                    None => {
                        let new_user = NewUser {
                            subject: &subject_owned,
                            display_name: name_owned.as_deref(),
                        };
                        Ok(diesel::insert_into(u::users)
                            .values(&new_user)
                            .returning(User::as_returning())
                            .get_result(conn)?)
                    }
                }
            })
        })
        .await?
    }

    pub async fn get_user_by_subject(&self, subject: &str) -> Result<Option<User>, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let subject_owned = subject.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<User>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(u::users
                .filter(u::subject.eq(&subject_owned))
                .first::<User>(&mut conn)
                .optional()?)
        })
        .await?
    }

    /// Unconditionally overwrites the user's connection code; any previous
    /// unredeemed code stops matching from this point on.
    pub async fn set_connection_code(
        &self,
        user_id: i32,
        code: &str,
        issued_at: NaiveDateTime,
    ) -> Result<(), StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let code_owned = code.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            diesel::update(u::users.find(user_id))
                .set((
                    u::connection_code.eq(&code_owned),
                    u::connection_code_issued_at.eq(issued_at),
                ))
                .execute(&mut conn)?;
            Ok(())
        })
        .await?
    }

    /// Redeem in a single conditional UPDATE keyed on the current code value
    /// and the expiry cutoff. Clearing and resolving happen atomically, so
    /// concurrent redemptions of the same code cannot both succeed.
    pub async fn redeem_connection_code(
        &self,
        code: &str,
        issued_after: NaiveDateTime,
    ) -> Result<Option<User>, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let code_owned = code.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<User>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(diesel::update(
                u::users
                    .filter(u::connection_code.eq(&code_owned))
                    .filter(u::connection_code_issued_at.ge(issued_after)),
            )
            .set((
                u::connection_code.eq(None::<String>),
                u::connection_code_issued_at.eq(None::<NaiveDateTime>),
            ))
            .returning(User::as_returning())
            .get_result::<User>(&mut conn)
            .optional()?)
        })
        .await?
    }

    /// Read-only resolution of a live connection code, used by the
    /// hydration lookup. Does not invalidate the code.
    pub async fn find_user_by_active_code(
        &self,
        code: &str,
        issued_after: NaiveDateTime,
    ) -> Result<Option<User>, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let code_owned = code.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<User>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(u::users
                .filter(u::connection_code.eq(&code_owned))
                .filter(u::connection_code_issued_at.ge(issued_after))
                .first::<User>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn set_water_goal(&self, user_id: i32, goal_oz: f64) -> Result<User, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<User, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(diesel::update(u::users.find(user_id))
                .set(u::water_goal_oz.eq(goal_oz))
                .returning(User::as_returning())
                .get_result(&mut conn)?)
        })
        .await?
    }

    pub async fn upsert_daily_goal(
        &self,
        user_id: i32,
        date: &str,
        goal_ml: f64,
    ) -> Result<DailyGoal, StorageError> {
        use schema::daily_goals::dsl as dg;
        let pool = self.pool.clone();
        let date_owned = date.to_string();
        tokio::task::spawn_blocking(move || -> Result<DailyGoal, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new_row = NewDailyGoal {
                user_id,
                date: &date_owned,
                goal_ml,
            };
            diesel::insert_into(dg::daily_goals)
                .values(&new_row)
                .on_conflict((dg::user_id, dg::date))
                .do_update()
                .set(dg::goal_ml.eq(goal_ml))
                .execute(&mut conn)?;
            Ok(dg::daily_goals
                .filter(dg::user_id.eq(user_id))
                .filter(dg::date.eq(&date_owned))
                .first::<DailyGoal>(&mut conn)?)
        })
        .await?
    }

    /// Exact-date match only; no range semantics.
    pub async fn get_daily_goal(
        &self,
        user_id: i32,
        date: &str,
    ) -> Result<Option<f64>, StorageError> {
        use schema::daily_goals::dsl as dg;
        let pool = self.pool.clone();
        let date_owned = date.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<f64>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(dg::daily_goals
                .filter(dg::user_id.eq(user_id))
                .filter(dg::date.eq(&date_owned))
                .select(dg::goal_ml)
                .first::<f64>(&mut conn)
                .optional()?)
        })
        .await?
    }

    /// Inserts the meal and its line items in one transaction; nothing is
    /// persisted when any part fails.
    pub async fn insert_meal(
        &self,
        user_id: i32,
        data: NewMealData,
    ) -> Result<(Meal, Vec<MealFood>), StorageError> {
        use schema::{meal_foods, meals};
        if data.foods.is_empty() {
            return Err(StorageError::InvalidInput(
                "meal requires at least one food item".to_string(),
            ));
        }
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<(Meal, Vec<MealFood>), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<(Meal, Vec<MealFood>), StorageError> {
                let new_meal = NewMeal {
                    user_id,
                    name: data.name.as_deref(),
                    total_calories: data.total_calories,
                    total_protein: data.total_protein,
                    total_carbs: data.total_carbs,
                    total_fat: data.total_fat,
                    is_public: data.is_public,
                    image_url: data.image_url.as_deref(),
                    created_at: chrono::Utc::now().naive_utc(),
                };
                let meal: Meal = diesel::insert_into(meals::table)
                    .values(&new_meal)
                    .returning(Meal::as_returning())
                    .get_result(conn)?;
                for food in &data.foods {
                    let row = NewMealFood {
                        meal_id: meal.id,
                        name: &food.name,
                        quantity: food.quantity,
                        unit: food.unit.as_deref(),
                        calories: food.calories,
                    };
                    diesel::insert_into(meal_foods::table)
                        .values(&row)
                        .execute(conn)?;
                }
                let foods = meal_foods::table
                    .filter(meal_foods::meal_id.eq(meal.id))
                    .order(meal_foods::id.asc())
                    .load::<MealFood>(conn)?;
                Ok((meal, foods))
            })
        })
        .await?
    }

    /// All meals owned by the user, newest first.
    pub async fn list_meals(&self, user_id: i32) -> Result<Vec<(Meal, Vec<MealFood>)>, StorageError> {
        use schema::meals::dsl as m;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<(Meal, Vec<MealFood>)>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let rows = m::meals
                .filter(m::user_id.eq(user_id))
                .order((m::created_at.desc(), m::id.desc()))
                .load::<Meal>(&mut conn)?;
            attach_foods(&mut conn, rows)
        })
        .await?
    }

    /// Meals owned by the user with `from <= created_at < to`, newest first.
    pub async fn list_meals_between(
        &self,
        user_id: i32,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<(Meal, Vec<MealFood>)>, StorageError> {
        use schema::meals::dsl as m;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<(Meal, Vec<MealFood>)>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let rows = m::meals
                .filter(m::user_id.eq(user_id))
                .filter(m::created_at.ge(from))
                .filter(m::created_at.lt(to))
                .order((m::created_at.desc(), m::id.desc()))
                .load::<Meal>(&mut conn)?;
            attach_foods(&mut conn, rows)
        })
        .await?
    }
}

fn attach_foods(
    conn: &mut SqliteConnection,
    rows: Vec<Meal>,
) -> Result<Vec<(Meal, Vec<MealFood>)>, StorageError> {
    use schema::meal_foods::dsl as mf;
    let ids: Vec<i32> = rows.iter().map(|meal| meal.id).collect();
    let foods = mf::meal_foods
        .filter(mf::meal_id.eq_any(&ids))
        .order(mf::id.asc())
        .load::<MealFood>(conn)?;
    let mut by_meal: HashMap<i32, Vec<MealFood>> = HashMap::new();
    for food in foods {
        by_meal.entry(food.meal_id).or_default().push(food);
    }
    Ok(rows
        .into_iter()
        .map(|meal| {
            let foods = by_meal.remove(&meal.id).unwrap_or_default();
            (meal, foods)
        })
        .collect())
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    // Ignore the result rows; Diesel's execute is fine for PRAGMAs
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    Ok(())
}
