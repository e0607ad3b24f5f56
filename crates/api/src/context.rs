use motico_auth::PrincipalId;
use motico_core::TenantId;

/// Tenant the request acts for, taken from `X-Tenant-ID`.
///
/// Present on every `/api/v1` request; handlers scope every call with it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated caller, from the verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    email: Option<String>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, email: Option<String>) -> Self {
        Self {
            principal_id,
            email,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
