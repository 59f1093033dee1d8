//! Route modules for the BITS server

pub mod bits;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .merge(bits::router(state))
}
