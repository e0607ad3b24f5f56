//! HTTP API application wiring (Axum router + middleware stack).
//!
//! - `routes/`: HTTP handlers, one file per resource
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{body::Body, http::Request, routing::get, Extension, Router};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use motico_auth::{Hs256JwtValidator, JwtValidator};
use motico_infra::{InMemoryDatabase, InventoryServices};
use motico_infra::config::{PaginationConfig, ServerConfig};
use motico_inventory::NameRules;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(
    services: Arc<InventoryServices>,
    jwt: Arc<dyn JwtValidator>,
    server: &ServerConfig,
) -> Router {
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: tenant header first, then the bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::tenant_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", protected)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(middleware::handle_panic))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &Request<Body>| {
                            tracing::info_span!(
                                "http_request",
                                method = %req.method(),
                                path = %req.uri().path(),
                                request_id = tracing::field::Empty,
                                tenant_id = tracing::field::Empty,
                            )
                        })
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(axum::middleware::from_fn(middleware::request_id_middleware))
                .layer(TimeoutLayer::new(server.write_timeout()))
                .layer(RequestBodyTimeoutLayer::new(server.read_timeout())),
        )
}

/// Router over a fresh in-memory database with default limits.
pub fn build_in_memory_app(jwt_secret: &str) -> Router {
    build_in_memory_app_with(jwt_secret, &ServerConfig::default())
}

pub fn build_in_memory_app_with(jwt_secret: &str, server: &ServerConfig) -> Router {
    let services = InventoryServices::new(
        Arc::new(InMemoryDatabase::new()),
        NameRules::default(),
        PaginationConfig::default(),
    );
    build_app(
        Arc::new(services),
        Arc::new(Hs256JwtValidator::new(jwt_secret)),
        server,
    )
}
