//! HTTP API: routing, middleware, and request/response mapping.

pub mod app;
pub mod context;
pub mod middleware;
