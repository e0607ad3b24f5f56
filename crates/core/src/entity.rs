//! Entity trait: identity + tenant ownership.

use crate::id::TenantId;

/// Entity marker + minimal interface.
///
/// Every entity in this system is partitioned by tenant; storage adapters key
/// records by `(tenant_id(), id())`.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Returns the owning tenant.
    fn tenant_id(&self) -> TenantId;
}
