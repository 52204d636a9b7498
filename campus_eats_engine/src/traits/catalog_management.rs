use crate::{
    db_types::{FoodItem, Lounge, NewFoodItem, NewLounge},
    traits::MarketplaceError,
};

/// The minimal catalog surface the core flows need: seeding lounges and menu items, and toggling
/// availability. The full vendor/catalog CRUD lives outside this crate.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn add_lounge(&self, lounge: NewLounge) -> Result<Lounge, MarketplaceError>;

    async fn add_food(&self, food: NewFoodItem) -> Result<FoodItem, MarketplaceError>;

    async fn set_food_availability(&self, food_id: i64, available: bool) -> Result<FoodItem, MarketplaceError>;
}
