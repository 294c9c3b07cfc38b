pub mod routes;
pub mod state;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

use axum::Router;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    routes::router(state)
}
