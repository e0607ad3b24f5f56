//! Per-product on-hand and reserved counts.
//!
//! The ledger validates amounts up front so obviously bad requests never
//! reach the repository; the repository re-checks the rules atomically.

use std::sync::Arc;

use tracing::{info, instrument};

use motico_core::{DomainError, ProductId, TenantId};
use motico_inventory::Stock;
use motico_inventory::stock::ensure_positive;

use crate::error::InventoryResult;
use crate::repository::StockRepository;

#[derive(Clone)]
pub struct StockLedger {
    stock: Arc<dyn StockRepository>,
}

impl StockLedger {
    pub fn new(stock: Arc<dyn StockRepository>) -> Self {
        Self { stock }
    }

    /// `NotFound("stock")` when the product has never been stocked.
    pub async fn get_by_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> InventoryResult<Stock> {
        self.stock
            .get(tenant_id, product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("stock").into())
    }

    /// Overwrite the on-hand quantity, creating the row when missing.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn set_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> InventoryResult<Stock> {
        if quantity < 0 {
            return Err(DomainError::InvalidQuantity.into());
        }
        let stock = self
            .stock
            .set_quantity(tenant_id, product_id, quantity)
            .await?;
        info!(quantity = stock.quantity, "stock quantity set");
        Ok(stock)
    }

    /// Apply a signed delta to the on-hand quantity.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn adjust_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
    ) -> InventoryResult<Stock> {
        let stock = self
            .stock
            .adjust_quantity(tenant_id, product_id, delta)
            .await?;
        info!(delta, quantity = stock.quantity, "stock quantity adjusted");
        Ok(stock)
    }

    /// Hold `amount` units against available stock.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn reserve(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        amount: i64,
    ) -> InventoryResult<Stock> {
        ensure_positive(amount)?;
        let stock = self.stock.reserve(tenant_id, product_id, amount).await?;
        info!(amount, reserved = stock.reserved_quantity, "stock reserved");
        Ok(stock)
    }

    /// Give back up to `amount` reserved units; never goes below zero.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn release(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        amount: i64,
    ) -> InventoryResult<Stock> {
        ensure_positive(amount)?;
        let stock = self.stock.release(tenant_id, product_id, amount).await?;
        info!(amount, reserved = stock.reserved_quantity, "stock released");
        Ok(stock)
    }
}
