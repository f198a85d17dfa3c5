//! HTTP handlers for the drinks menu.
//!
//! Handlers behind an [`AuthorizationLayer`](crate::AuthorizationLayer) take the verified [`Claims`] as their first
//! argument. Failures other than authorization use the same envelope as [`AuthError`](crate::AuthError).

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    model::{Drink, DrinkPatch, NewDrink},
    store::{DrinkStore, StoreError},
};
use crate::Claims;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    BadRequest,
    NotFound,
    Unprocessable,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::BadRequest => "bad request",
            ApiError::NotFound => "resource not found",
            ApiError::Unprocessable => "unprocessable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let body = Json(json!({
            "success": false,
            "error": status_code.as_u16(),
            "message": self.message(),
        }));
        (status_code, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        debug!(error = %err, "drink store rejected request");
        match err {
            StoreError::NotFound(_) => ApiError::NotFound,
            StoreError::DuplicateTitle(_) | StoreError::Invalid(_) => ApiError::Unprocessable,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "rejected request body");
        match rejection {
            JsonRejection::JsonDataError(_) => ApiError::Unprocessable,
            _ => ApiError::BadRequest,
        }
    }
}

// Ids are integers; anything else names no drink.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound
    }
}

/// Public menu in the short representation.
pub async fn list_drinks(State(store): State<Arc<DrinkStore>>) -> Json<Value> {
    let drinks = store.list().await;
    let short: Vec<_> = drinks.iter().map(Drink::short).collect();
    Json(json!({
        "success": true,
        "drinks": short,
        "total_drinks": drinks.len(),
    }))
}

/// Full menu including ingredient names.
pub async fn list_drinks_detail(_claims: Claims, State(store): State<Arc<DrinkStore>>) -> Json<Value> {
    let drinks = store.list().await;
    let long: Vec<_> = drinks.iter().map(Drink::long).collect();
    Json(json!({
        "success": true,
        "drinks": long,
        "total_drinks": drinks.len(),
    }))
}

pub async fn create_drink(
    claims: Claims,
    State(store): State<Arc<DrinkStore>>,
    payload: Result<Json<NewDrink>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(new_drink) = payload?;
    let drink = store
        .insert(new_drink.title, new_drink.recipe.into())
        .await?;
    info!(id = drink.id, title = %drink.title, subject = claims.subject(), "drink added");
    Ok(Json(json!({
        "success": true,
        "message": "Drink successfully added to the database!",
        "drinks": [drink.long()],
    })))
}

pub async fn update_drink(
    claims: Claims,
    State(store): State<Arc<DrinkStore>>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<DrinkPatch>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let drink = store.update(id, patch).await?;
    info!(id, subject = claims.subject(), "drink updated");
    Ok(Json(json!({
        "success": true,
        "message": "Drink successfully updated in the database!",
        "drinks": [drink.long()],
    })))
}

pub async fn delete_drink(
    claims: Claims,
    State(store): State<Arc<DrinkStore>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let drink = store.delete(id).await?;
    info!(id, title = %drink.title, subject = claims.subject(), "drink deleted");
    Ok(Json(json!({
        "success": true,
        "delete": id,
        "message": "Drink deleted successfully!",
    })))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
