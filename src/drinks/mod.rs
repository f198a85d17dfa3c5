//! The drinks menu: model, storage and HTTP handlers.

pub mod api;
pub mod model;
pub mod store;

pub use api::ApiError;
pub use model::{Drink, Ingredient};
pub use store::{DrinkStore, StoreError};
