use axum::{routing::get, Router};

pub mod categories;
pub mod products;
pub mod stock;
pub mod stores;
pub mod system;
pub mod transfers;

/// Router for all authenticated (tenant-scoped) endpoints, mounted at `/api/v1`.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/stores", stores::router())
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/transfers", transfers::router())
}
