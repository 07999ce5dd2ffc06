//! API routes
//!
//! Outfit routes are nested under `/api` by [`crate::server::build_router`];
//! health endpoints stay at the root.

pub mod health;

use axum::Router;
use domain_outfit::{OutfitResult, handlers};

use crate::state::AppState;

/// Outfit extraction and recommendation routes
pub fn routes(state: &AppState) -> OutfitResult<Router> {
    Ok(handlers::router(state.finder()?))
}
