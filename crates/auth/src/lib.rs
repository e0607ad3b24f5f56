//! `motico-auth`: bearer-token authentication, decoupled from HTTP.
//!
//! Tokens are HS256 JWTs carrying the principal and the tenant it acts for.

pub mod claims;
pub mod jwt;
pub mod principal;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{AuthError, Hs256JwtIssuer, Hs256JwtValidator, JwtValidator};
pub use principal::PrincipalId;
