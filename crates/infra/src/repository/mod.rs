//! Tenant-scoped persistence contracts.
//!
//! Every method takes the tenant explicitly; implementations must include it
//! in every lookup so cross-tenant access is impossible. Methods documented as
//! atomic must perform their check and write as one unit against concurrent
//! callers (a conditional write or a transaction holding a row lock).

use async_trait::async_trait;
use serde::Serialize;

use motico_core::{CategoryId, ProductId, StoreId, TenantId, TransferId};
use motico_inventory::{
    Category, Product, ProductFilter, ProductWithStock, Stock, Store, Transfer, TransferFilter,
    TransferTransition,
};

use crate::config::PaginationConfig;
use crate::error::InventoryResult;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDatabase;
pub use postgres::PgDatabase;

/// Offset pagination parameters (1-based page numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Missing or zero `limit` uses the configured default; larger values are
    /// capped at the configured maximum. Missing or zero `page` means page 1.
    pub fn new(page: Option<u32>, limit: Option<u32>, config: &PaginationConfig) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(config.max_limit),
            _ => config.default_limit,
        };
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// One page of results plus the total count across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    /// Never below 1, so an empty listing still reports one page.
    pub fn total_pages(&self) -> u64 {
        self.total
            .div_ceil(u64::from(self.request.limit.max(1)))
            .max(1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }
}

/// Stock rows, keyed by `(tenant, product)`.
#[async_trait]
pub trait StockRepository: Send + Sync {
    async fn get(&self, tenant_id: TenantId, product_id: ProductId)
    -> InventoryResult<Option<Stock>>;

    /// Atomic. Creates the row (reserved = 0) when missing.
    async fn set_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> InventoryResult<Stock>;

    /// Atomic. Creates the row when missing and `delta >= 0`.
    async fn adjust_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
    ) -> InventoryResult<Stock>;

    /// Atomic conditional increment: succeeds only if `available >= amount`,
    /// otherwise (or when no row exists) `InsufficientStock`.
    async fn reserve(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        amount: i64,
    ) -> InventoryResult<Stock>;

    /// Atomic decrement floored at zero; `NotFound` when no row exists.
    async fn release(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        amount: i64,
    ) -> InventoryResult<Stock>;
}

/// Read-only store lookups used to validate transfer endpoints.
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    async fn get_store(&self, tenant_id: TenantId, store_id: StoreId)
    -> InventoryResult<Option<Store>>;
}

#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn get(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<Option<Transfer>>;

    /// Newest first.
    async fn list(
        &self,
        tenant_id: TenantId,
        filter: TransferFilter,
        page: PageRequest,
    ) -> InventoryResult<Page<Transfer>>;

    /// Atomic. Reserves `transfer.quantity` of its product and persists the
    /// pending transfer; both happen or neither does.
    async fn insert_reserving(&self, transfer: &Transfer) -> InventoryResult<()>;

    /// Atomic. Overwrites the transfer only while it is still pending
    /// (`TransferNotPending` otherwise). Does not touch stock.
    async fn update_pending(&self, transfer: &Transfer) -> InventoryResult<()>;

    /// Atomic. Applies a terminal transition under a row lock and releases
    /// the reserved quantity in the same unit.
    async fn transition(
        &self,
        tenant_id: TenantId,
        id: TransferId,
        transition: TransferTransition,
    ) -> InventoryResult<Transfer>;

    /// Atomic. Deletes the transfer only while pending. Does not touch stock.
    async fn delete_pending(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<()>;
}

#[async_trait]
pub trait StoreRepository: StoreDirectory {
    async fn list(&self, tenant_id: TenantId, page: PageRequest) -> InventoryResult<Page<Store>>;
    async fn insert(&self, store: &Store) -> InventoryResult<()>;
    async fn update(&self, store: &Store) -> InventoryResult<()>;
    async fn delete(&self, tenant_id: TenantId, id: StoreId) -> InventoryResult<()>;
    async fn exists_by_name(&self, tenant_id: TenantId, name: &str) -> InventoryResult<bool>;
    async fn has_products(&self, tenant_id: TenantId, id: StoreId) -> InventoryResult<bool>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn get(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<Option<Category>>;
    async fn list(&self, tenant_id: TenantId, page: PageRequest)
    -> InventoryResult<Page<Category>>;
    async fn insert(&self, category: &Category) -> InventoryResult<()>;
    async fn update(&self, category: &Category) -> InventoryResult<()>;
    async fn delete(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<()>;
    async fn exists_by_name(&self, tenant_id: TenantId, name: &str) -> InventoryResult<bool>;
    async fn has_products(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<bool>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get(
        &self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> InventoryResult<Option<ProductWithStock>>;

    async fn list(
        &self,
        tenant_id: TenantId,
        filter: ProductFilter,
        page: PageRequest,
    ) -> InventoryResult<Page<ProductWithStock>>;

    async fn insert(&self, product: &Product) -> InventoryResult<()>;
    async fn update(&self, product: &Product) -> InventoryResult<()>;
    async fn delete(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<()>;

    /// SKUs are unique per `(tenant, store)`.
    async fn exists_by_sku(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
        sku: &str,
    ) -> InventoryResult<bool>;

    /// A stock row with `quantity > 0` exists.
    async fn has_stock(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<bool>;
    async fn has_transfers(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<bool>;
}

/// Everything a complete backend provides.
pub trait InventoryDatabase:
    StockRepository
    + StoreRepository
    + TransferRepository
    + CategoryRepository
    + ProductRepository
    + 'static
{
}

impl<T> InventoryDatabase for T where
    T: StockRepository
        + StoreRepository
        + TransferRepository
        + CategoryRepository
        + ProductRepository
        + 'static
{
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PaginationConfig {
        PaginationConfig {
            default_limit: 20,
            max_limit: 100,
        }
    }

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(PageRequest::new(None, None, &cfg()).limit, 20);
        assert_eq!(PageRequest::new(None, Some(0), &cfg()).limit, 20);
        assert_eq!(PageRequest::new(None, Some(500), &cfg()).limit, 100);
        assert_eq!(PageRequest::new(None, Some(7), &cfg()).limit, 7);
    }

    #[test]
    fn offset_follows_page_number() {
        let req = PageRequest::new(Some(3), Some(10), &cfg());
        assert_eq!(req.offset(), 20);
        assert_eq!(PageRequest::new(Some(0), Some(10), &cfg()).offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<u8> = Page {
            items: vec![],
            total: 21,
            request: PageRequest::new(None, Some(10), &cfg()),
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn empty_page_reports_one_page() {
        let page: Page<u8> = Page {
            items: vec![],
            total: 0,
            request: PageRequest::new(None, None, &cfg()),
        };
        assert_eq!(page.total_pages(), 1);
    }
}
