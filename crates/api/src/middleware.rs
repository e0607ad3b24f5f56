//! Request middleware.
//!
//! Applied outermost first:
//! 1. Panic recovery (500 JSON instead of a dropped connection)
//! 2. `TraceLayer` (one span per request)
//! 3. Request ID (propagate or generate `x-request-id`)
//! 4. Tenant context (`X-Tenant-ID`, `/api/v1` only)
//! 5. Bearer auth (`/api/v1` only)

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::Span;
use uuid::Uuid;

use motico_auth::JwtValidator;
use motico_core::TenantId;

use crate::app::errors::json_error;
use crate::context::{PrincipalContext, TenantContext};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Reuse an upstream `x-request-id` or mint one, record it on the request
/// span, and echo it on the response.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::now_v7().to_string(), String::from);

    Span::current().record("request_id", request_id.as_str());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Require a UUID `X-Tenant-ID` header and expose it as [`TenantContext`].
pub async fn tenant_middleware(mut req: Request, next: Next) -> Response {
    let tenant_id = match extract_tenant(req.headers()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    Span::current().record("tenant_id", tracing::field::display(tenant_id));
    req.extensions_mut().insert(TenantContext::new(tenant_id));
    next.run(req).await
}

/// Verify the bearer token and bind the principal to the request.
///
/// The token's `tenant_id` must match the tenant header; a token for one
/// tenant can never be replayed against another.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            return json_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "invalid or expired token",
            );
        }
    };

    let header_tenant = req.extensions().get::<TenantContext>().map(|t| t.tenant_id());
    match header_tenant {
        Some(tenant_id) if tenant_id == claims.tenant_id => {}
        Some(_) => {
            return json_error(
                StatusCode::FORBIDDEN,
                "tenant_mismatch",
                "token was not issued for this tenant",
            );
        }
        None => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "missing_tenant",
                "X-Tenant-ID header is required",
            );
        }
    }

    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.email));
    next.run(req).await
}

/// Turn a handler panic into the standard error body.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = detail, "handler panicked");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, Response> {
    let raw = headers
        .get(TENANT_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            json_error(
                StatusCode::BAD_REQUEST,
                "missing_tenant",
                "X-Tenant-ID header is required",
            )
        })?;

    raw.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_tenant",
            "X-Tenant-ID must be a UUID",
        )
    })
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let unauthorized = |message: &'static str| {
        json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
    };

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("authorization header is required"))?;

    let header = header
        .to_str()
        .map_err(|_| unauthorized("invalid authorization header format"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("invalid authorization header format"))?
        .trim();

    if token.is_empty() {
        return Err(unauthorized("invalid authorization header format"));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::header::AUTHORIZATION;

    use super::*;

    #[test]
    fn bearer_requires_scheme_and_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn tenant_header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        let missing = extract_tenant(&headers).unwrap_err();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        headers.insert(TENANT_ID_HEADER, HeaderValue::from_static("tenant-1"));
        let invalid = extract_tenant(&headers).unwrap_err();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let tenant = TenantId::new();
        headers.insert(
            TENANT_ID_HEADER,
            HeaderValue::from_str(&tenant.to_string()).unwrap(),
        );
        assert_eq!(extract_tenant(&headers).unwrap(), tenant);
    }
}
