//! In-memory drink storage.
//!
//! State lives behind a `tokio::sync::RwLock` and is lost on restart. Ids are assigned in increasing order and never
//! reused; titles are unique.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::info;

use super::model::{Drink, DrinkPatch, Ingredient};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("drink {0} not found")]
    NotFound(u64),
    #[error("a drink titled {0:?} already exists")]
    DuplicateTitle(String),
    #[error("invalid drink: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Default)]
struct Inner {
    last_id: u64,
    drinks: BTreeMap<u64, Drink>,
}

impl Inner {
    fn title_taken(&self, title: &str, except: Option<u64>) -> bool {
        self.drinks
            .values()
            .any(|drink| drink.title == title && Some(drink.id) != except)
    }
}

#[derive(Debug, Default)]
pub struct DrinkStore {
    inner: RwLock<Inner>,
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Invalid("title must not be empty"));
    }
    Ok(())
}

fn validate_recipe(recipe: &[Ingredient]) -> Result<(), StoreError> {
    if recipe.is_empty() {
        return Err(StoreError::Invalid("recipe must have at least one ingredient"));
    }
    if recipe.iter().any(|ingredient| ingredient.parts == 0) {
        return Err(StoreError::Invalid("ingredient parts must be positive"));
    }
    Ok(())
}

impl DrinkStore {
    /// All drinks, ordered by id.
    pub async fn list(&self) -> Vec<Drink> {
        self.inner.read().await.drinks.values().cloned().collect()
    }

    pub async fn get(&self, id: u64) -> Result<Drink, StoreError> {
        self.inner
            .read()
            .await
            .drinks
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    pub async fn insert(
        &self,
        title: String,
        recipe: Vec<Ingredient>,
    ) -> Result<Drink, StoreError> {
        validate_title(&title)?;
        validate_recipe(&recipe)?;

        let mut inner = self.inner.write().await;
        if inner.title_taken(&title, None) {
            return Err(StoreError::DuplicateTitle(title));
        }
        inner.last_id += 1;
        let drink = Drink {
            id: inner.last_id,
            title,
            recipe,
        };
        inner.drinks.insert(drink.id, drink.clone());
        Ok(drink)
    }

    /// Replaces the title and/or the recipe of an existing drink.
    ///
    /// An unknown id is reported before anything about the patch itself.
    pub async fn update(&self, id: u64, patch: DrinkPatch) -> Result<Drink, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.drinks.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }

        if patch.is_empty() {
            return Err(StoreError::Invalid("nothing to update"));
        }
        let recipe = patch.recipe.map(Vec::<Ingredient>::from);
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        if let Some(recipe) = &recipe {
            validate_recipe(recipe)?;
        }
        if let Some(title) = &patch.title {
            if inner.title_taken(title, Some(id)) {
                return Err(StoreError::DuplicateTitle(title.clone()));
            }
        }

        let drink = inner.drinks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(title) = patch.title {
            drink.title = title;
        }
        if let Some(recipe) = recipe {
            drink.recipe = recipe;
        }
        Ok(drink.clone())
    }

    pub async fn delete(&self, id: u64) -> Result<Drink, StoreError> {
        self.inner
            .write()
            .await
            .drinks
            .remove(&id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Adds a glass of water so a fresh menu isn't empty. Does nothing if the title is already taken.
    pub async fn seed(&self) {
        let water = vec![Ingredient {
            name: "water".to_string(),
            color: "blue".to_string(),
            parts: 1,
        }];
        if self.insert("water".to_string(), water).await.is_ok() {
            info!("seeded sample drink");
        }
    }
}
