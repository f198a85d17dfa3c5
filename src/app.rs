//! Router wiring: which routes exist and which permission guards each of them.

use std::sync::Arc;

use axum::{
    extract::FromRef,
    handler::Handler,
    routing::{get, patch},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    drinks::{api, DrinkStore},
    Guard, TokenVerifier,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DrinkStore>,
    pub verifier: Arc<TokenVerifier>,
}

impl FromRef<AppState> for Arc<DrinkStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

pub fn router(state: AppState) -> Router {
    let guard = |permission: &str| Guard::new(state.verifier.clone(), permission).layer();

    Router::new()
        .route(
            "/drinks",
            get(api::list_drinks).post(api::create_drink.layer(guard("post:drinks"))),
        )
        .route(
            "/drinks-detail",
            get(api::list_drinks_detail.layer(guard("get:drinks-detail"))),
        )
        .route(
            "/drinks/:id",
            patch(api::update_drink.layer(guard("patch:drinks")))
                .delete(api::delete_drink.layer(guard("delete:drinks"))),
        )
        .fallback(api::not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
