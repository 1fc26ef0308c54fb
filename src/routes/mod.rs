use axum::{middleware, Router};
use crate::{
    middleware::auth_guard::require_auth,
    state::AppState,
};

mod admin;
mod auth;
mod complexes;
mod reservations;

/// Build the full `/api/v1` router.
///
/// Public auth and browsing routes are left unprotected; every other route
/// is wrapped in the session-based [`require_auth`] middleware.
pub fn all_routes(state: AppState) -> Router<AppState> {
    let auth_mw = middleware::from_fn_with_state(state, require_auth);
    Router::new()
        .merge(auth::router())
        .merge(complexes::public_router())    // public - no auth required
        .merge(reservations::public_router())
        .merge(
            Router::new()
                .merge(complexes::router())
                .merge(reservations::router())
                .merge(admin::router())
                .route_layer(auth_mw),
        )
}
