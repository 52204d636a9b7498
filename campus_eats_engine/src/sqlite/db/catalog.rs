use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{FoodItem, Lounge, NewFoodItem, NewLounge},
    traits::MarketplaceError,
};

pub async fn insert_lounge(lounge: NewLounge, conn: &mut SqliteConnection) -> Result<Lounge, MarketplaceError> {
    let lounge: Lounge = sqlx::query_as(
        r#"
            INSERT INTO lounges (owner_id, name) VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(lounge.owner_id)
    .bind(lounge.name)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Lounge '{}' registered with id {}", lounge.name, lounge.id);
    Ok(lounge)
}

pub async fn fetch_lounge(lounge_id: i64, conn: &mut SqliteConnection) -> Result<Option<Lounge>, sqlx::Error> {
    let lounge =
        sqlx::query_as("SELECT * FROM lounges WHERE id = $1").bind(lounge_id).fetch_optional(conn).await?;
    Ok(lounge)
}

pub async fn insert_food(food: NewFoodItem, conn: &mut SqliteConnection) -> Result<FoodItem, MarketplaceError> {
    let food: FoodItem = sqlx::query_as(
        r#"
            INSERT INTO foods (lounge_id, name, price, estimated_time, is_available)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(food.lounge_id)
    .bind(food.name)
    .bind(food.price.value())
    .bind(food.estimated_time)
    .bind(food.is_available)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Food '{}' added to lounge #{} at {}", food.name, food.lounge_id, food.price);
    Ok(food)
}

pub async fn fetch_food(food_id: i64, conn: &mut SqliteConnection) -> Result<Option<FoodItem>, sqlx::Error> {
    let food = sqlx::query_as("SELECT * FROM foods WHERE id = $1").bind(food_id).fetch_optional(conn).await?;
    Ok(food)
}

pub async fn set_availability(
    food_id: i64,
    available: bool,
    conn: &mut SqliteConnection,
) -> Result<FoodItem, MarketplaceError> {
    let result: Option<FoodItem> = sqlx::query_as(
        "UPDATE foods SET is_available = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(available)
    .bind(food_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::FoodNotFound(food_id))
}
