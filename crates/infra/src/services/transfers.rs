//! Transfer lifecycle: create (reserve), update, complete/cancel (release),
//! delete, and queries.
//!
//! ```text
//!            create (reserves stock)
//!                     |
//!                     v
//!                 +---------+
//!   update ---->  | pending |  ----> delete (no stock change)
//!                 +---------+
//!                  |       |
//!        complete  |       |  cancel
//!    (release)     v       v  (release)
//!          +-----------+ +-----------+
//!          | completed | | cancelled |
//!          +-----------+ +-----------+
//! ```
//!
//! Completing a transfer releases the reservation at the source; it does not
//! move on-hand units to the destination store.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use motico_core::{DomainError, StoreId, TenantId, TransferId};
use motico_inventory::{NewTransfer, Transfer, TransferFilter, TransferPatch, TransferTransition};

use crate::config::PaginationConfig;
use crate::error::InventoryResult;
use crate::repository::{Page, PageRequest, StockRepository, StoreDirectory, TransferRepository};

#[derive(Clone)]
pub struct TransferOrchestrator {
    transfers: Arc<dyn TransferRepository>,
    stores: Arc<dyn StoreDirectory>,
    stock: Arc<dyn StockRepository>,
    pagination: PaginationConfig,
}

impl TransferOrchestrator {
    pub fn new(
        transfers: Arc<dyn TransferRepository>,
        stores: Arc<dyn StoreDirectory>,
        stock: Arc<dyn StockRepository>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            transfers,
            stores,
            stock,
            pagination,
        }
    }

    /// Both stores must exist and belong to `tenant_id`.
    ///
    /// A missing or foreign store is `InvalidTransferStores`; a failed lookup
    /// propagates as-is.
    async fn validate_stores(
        &self,
        tenant_id: TenantId,
        from: StoreId,
        to: StoreId,
    ) -> InventoryResult<()> {
        for store_id in [from, to] {
            match self.stores.get_store(tenant_id, store_id).await? {
                Some(store) if store.tenant_id == tenant_id => {}
                _ => return Err(DomainError::InvalidTransferStores.into()),
            }
        }
        Ok(())
    }

    /// Open a pending transfer and reserve its quantity at the source.
    #[instrument(
        skip(self, draft),
        fields(tenant_id = %draft.tenant_id, product_id = %draft.product_id, quantity = draft.quantity),
        err
    )]
    pub async fn create(&self, draft: NewTransfer) -> InventoryResult<Transfer> {
        draft.validate()?;
        self.validate_stores(draft.tenant_id, draft.from_store_id, draft.to_store_id)
            .await?;

        let stock = self
            .stock
            .get(draft.tenant_id, draft.product_id)
            .await?
            .ok_or(DomainError::not_found("stock"))?;
        if stock.available() < draft.quantity {
            return Err(DomainError::InsufficientStock.into());
        }

        let transfer = Transfer::open(draft, Utc::now())?;
        // Re-checks availability atomically; a concurrent reservation between
        // the read above and this write still surfaces as InsufficientStock.
        self.transfers.insert_reserving(&transfer).await?;

        info!(transfer_id = %transfer.id, "transfer created");
        Ok(transfer)
    }

    pub async fn get_by_id(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<Transfer> {
        self.transfers
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("transfer").into())
    }

    /// Newest first. Missing or zero `limit` uses the configured default.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        filter: TransferFilter,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> InventoryResult<Page<Transfer>> {
        let request = PageRequest::new(page, limit, &self.pagination);
        self.transfers.list(tenant_id, filter, request).await
    }

    /// Patch a pending transfer. The reservation is left as created.
    #[instrument(skip(self, patch), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: TransferId,
        patch: TransferPatch,
    ) -> InventoryResult<Transfer> {
        let mut transfer = self.get_by_id(tenant_id, id).await?;
        transfer.ensure_pending()?;

        if let Some((from, to)) = patch.store_pair(&transfer) {
            self.validate_stores(tenant_id, from, to).await?;
        }
        // Complete and cancel release against this product's stock row.
        if let Some(product_id) = patch.product_id.filter(|p| *p != transfer.product_id) {
            self.stock
                .get(tenant_id, product_id)
                .await?
                .ok_or(DomainError::not_found("stock"))?;
        }

        transfer.apply_patch(&patch, Utc::now())?;
        self.transfers.update_pending(&transfer).await?;

        info!("transfer updated");
        Ok(transfer)
    }

    /// Mark a pending transfer completed and release its reservation.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    pub async fn complete(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<Transfer> {
        let transfer = self
            .transfers
            .transition(tenant_id, id, TransferTransition::Complete)
            .await?;
        info!(quantity = transfer.quantity, "transfer completed");
        Ok(transfer)
    }

    /// Mark a pending transfer cancelled and release its reservation.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    pub async fn cancel(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<Transfer> {
        let transfer = self
            .transfers
            .transition(tenant_id, id, TransferTransition::Cancel)
            .await?;
        info!(quantity = transfer.quantity, "transfer cancelled");
        Ok(transfer)
    }

    /// Remove a pending transfer. The reservation is not released.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    pub async fn delete(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<()> {
        self.transfers.delete_pending(tenant_id, id).await?;
        info!("transfer deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use motico_core::ProductId;
    use motico_inventory::{NameRules, NewStore, Store, TransferStatus};

    use super::*;
    use crate::error::InventoryError;
    use crate::repository::{InMemoryDatabase, StoreRepository};

    struct Fixture {
        db: Arc<InMemoryDatabase>,
        transfers: TransferOrchestrator,
        tenant: TenantId,
        product: ProductId,
        a: StoreId,
        b: StoreId,
    }

    async fn store(db: &InMemoryDatabase, tenant: TenantId, name: &str) -> StoreId {
        let store = Store::create(
            NewStore {
                tenant_id: tenant,
                name: name.to_string(),
                address: None,
            },
            &NameRules::default(),
            Utc::now(),
        )
        .unwrap();
        db.insert(&store).await.unwrap();
        store.id
    }

    async fn fixture(on_hand: i64) -> Fixture {
        let db = Arc::new(InMemoryDatabase::new());
        let tenant = TenantId::new();
        let product = ProductId::new();
        let a = store(&db, tenant, "North").await;
        let b = store(&db, tenant, "South").await;
        db.set_quantity(tenant, product, on_hand).await.unwrap();

        let transfers = TransferOrchestrator::new(
            db.clone(),
            db.clone(),
            db.clone(),
            PaginationConfig::default(),
        );
        Fixture {
            db,
            transfers,
            tenant,
            product,
            a,
            b,
        }
    }

    impl Fixture {
        fn draft(&self, quantity: i64) -> NewTransfer {
            NewTransfer {
                tenant_id: self.tenant,
                product_id: self.product,
                from_store_id: self.a,
                to_store_id: self.b,
                quantity,
                notes: None,
            }
        }

        async fn reserved(&self) -> i64 {
            StockRepository::get(&*self.db, self.tenant, self.product)
                .await
                .unwrap()
                .unwrap()
                .reserved_quantity
        }
    }

    fn domain(err: InventoryError) -> DomainError {
        err.as_domain().cloned().expect("domain error")
    }

    #[tokio::test]
    async fn create_reserves_and_complete_releases() {
        let f = fixture(100).await;

        let transfer = f.transfers.create(f.draft(30)).await.unwrap();
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(f.reserved().await, 30);

        let done = f.transfers.complete(f.tenant, transfer.id).await.unwrap();
        assert_eq!(done.status, TransferStatus::Completed);
        assert_eq!(f.reserved().await, 0);

        let stock = StockRepository::get(&*f.db, f.tenant, f.product)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stock.quantity, 100);
    }

    #[tokio::test]
    async fn cancel_releases_and_is_sticky() {
        let f = fixture(100).await;
        let transfer = f.transfers.create(f.draft(40)).await.unwrap();

        let cancelled = f.transfers.cancel(f.tenant, transfer.id).await.unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);
        assert_eq!(f.reserved().await, 0);

        let err = f.transfers.complete(f.tenant, transfer.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::TransferAlreadyCancelled);
        let err = f.transfers.cancel(f.tenant, transfer.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::TransferAlreadyCancelled);
    }

    #[tokio::test]
    async fn create_over_available_is_insufficient() {
        let f = fixture(50).await;
        f.transfers.create(f.draft(40)).await.unwrap();

        let err = f.transfers.create(f.draft(20)).await.unwrap_err();
        assert_eq!(domain(err), DomainError::InsufficientStock);
        assert_eq!(f.reserved().await, 40);
    }

    #[tokio::test]
    async fn create_rejects_same_store_before_quantity() {
        let f = fixture(50).await;
        let mut draft = f.draft(0);
        draft.to_store_id = f.a;

        let err = f.transfers.create(draft).await.unwrap_err();
        assert_eq!(domain(err), DomainError::InvalidTransferStores);
    }

    #[tokio::test]
    async fn create_rejects_foreign_store() {
        let f = fixture(50).await;
        let foreign = store(&f.db, TenantId::new(), "Elsewhere").await;
        let mut draft = f.draft(5);
        draft.to_store_id = foreign;

        let err = f.transfers.create(draft).await.unwrap_err();
        assert_eq!(domain(err), DomainError::InvalidTransferStores);
        assert_eq!(f.reserved().await, 0);
    }

    #[tokio::test]
    async fn create_without_stock_row_is_not_found() {
        let f = fixture(10).await;
        let mut draft = f.draft(5);
        draft.product_id = ProductId::new();

        let err = f.transfers.create(draft).await.unwrap_err();
        assert_eq!(domain(err), DomainError::not_found("stock"));
    }

    #[tokio::test]
    async fn update_changes_pending_transfer_without_touching_stock() {
        let f = fixture(100).await;
        let transfer = f.transfers.create(f.draft(30)).await.unwrap();

        let patch = TransferPatch {
            quantity: Some(70),
            notes: Some("rush".to_string()),
            ..TransferPatch::default()
        };
        let updated = f.transfers.update(f.tenant, transfer.id, patch).await.unwrap();
        assert_eq!(updated.quantity, 70);
        assert_eq!(updated.notes.as_deref(), Some("rush"));
        assert_eq!(f.reserved().await, 30);

        let stored = f.transfers.get_by_id(f.tenant, transfer.id).await.unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn update_validates_changed_store_pair() {
        let f = fixture(100).await;
        let transfer = f.transfers.create(f.draft(10)).await.unwrap();

        let swap_to_same = TransferPatch {
            to_store_id: Some(f.a),
            ..TransferPatch::default()
        };
        let err = f
            .transfers
            .update(f.tenant, transfer.id, swap_to_same)
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::InvalidTransferStores);

        let unknown = TransferPatch {
            from_store_id: Some(StoreId::new()),
            ..TransferPatch::default()
        };
        let err = f
            .transfers
            .update(f.tenant, transfer.id, unknown)
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::InvalidTransferStores);
    }

    #[tokio::test]
    async fn update_to_unstocked_product_is_rejected() {
        let f = fixture(10).await;
        let transfer = f.transfers.create(f.draft(10)).await.unwrap();

        let patch = TransferPatch {
            product_id: Some(ProductId::new()),
            ..TransferPatch::default()
        };
        let err = f
            .transfers
            .update(f.tenant, transfer.id, patch)
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::not_found("stock"));

        let stored = f.transfers.get_by_id(f.tenant, transfer.id).await.unwrap();
        assert_eq!(stored.product_id, f.product);

        let cancelled = f.transfers.cancel(f.tenant, transfer.id).await.unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);
        assert_eq!(f.reserved().await, 0);
    }

    #[tokio::test]
    async fn update_to_stocked_product_is_allowed() {
        let f = fixture(10).await;
        let transfer = f.transfers.create(f.draft(5)).await.unwrap();
        let other = ProductId::new();
        f.db.set_quantity(f.tenant, other, 3).await.unwrap();

        let patch = TransferPatch {
            product_id: Some(other),
            ..TransferPatch::default()
        };
        let updated = f.transfers.update(f.tenant, transfer.id, patch).await.unwrap();
        assert_eq!(updated.product_id, other);
    }

    #[tokio::test]
    async fn terminal_transfers_cannot_be_updated_or_deleted() {
        let f = fixture(100).await;
        let transfer = f.transfers.create(f.draft(10)).await.unwrap();
        f.transfers.complete(f.tenant, transfer.id).await.unwrap();

        let err = f
            .transfers
            .update(f.tenant, transfer.id, TransferPatch::default())
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::TransferNotPending);

        let err = f.transfers.delete(f.tenant, transfer.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::TransferNotPending);
    }

    #[tokio::test]
    async fn delete_keeps_reservation() {
        let f = fixture(100).await;
        let transfer = f.transfers.create(f.draft(25)).await.unwrap();

        f.transfers.delete(f.tenant, transfer.id).await.unwrap();
        assert_eq!(f.reserved().await, 25);

        let err = f.transfers.get_by_id(f.tenant, transfer.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::not_found("transfer"));
    }

    #[tokio::test]
    async fn other_tenants_see_nothing() {
        let f = fixture(100).await;
        let transfer = f.transfers.create(f.draft(10)).await.unwrap();
        let stranger = TenantId::new();

        let err = f.transfers.get_by_id(stranger, transfer.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::not_found("transfer"));
        let err = f.transfers.complete(stranger, transfer.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::not_found("transfer"));

        let page = f
            .transfers
            .list(stranger, TransferFilter::default(), None, None)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_store() {
        let f = fixture(100).await;
        let first = f.transfers.create(f.draft(10)).await.unwrap();
        f.transfers.create(f.draft(10)).await.unwrap();
        f.transfers.complete(f.tenant, first.id).await.unwrap();

        let completed = TransferFilter {
            status: Some(TransferStatus::Completed),
            store_id: None,
        };
        let page = f.transfers.list(f.tenant, completed, None, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, first.id);

        let by_destination = TransferFilter {
            status: None,
            store_id: Some(f.b),
        };
        let page = f
            .transfers
            .list(f.tenant, by_destination, Some(1), Some(1))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_pages(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_complete_and_cancel_release_once() {
        let f = fixture(100).await;
        let transfer = f.transfers.create(f.draft(60)).await.unwrap();

        let complete = {
            let transfers = f.transfers.clone();
            let (tenant, id) = (f.tenant, transfer.id);
            tokio::spawn(async move { transfers.complete(tenant, id).await })
        };
        let cancel = {
            let transfers = f.transfers.clone();
            let (tenant, id) = (f.tenant, transfer.id);
            tokio::spawn(async move { transfers.cancel(tenant, id).await })
        };

        let results = [complete.await.unwrap(), cancel.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(f.reserved().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_overreserve() {
        let f = fixture(100).await;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let transfers = f.transfers.clone();
                let draft = f.draft(30);
                tokio::spawn(async move { transfers.create(draft).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert_eq!(domain(e), DomainError::InsufficientStock),
            }
        }
        assert_eq!(created, 3);
        assert_eq!(f.reserved().await, 90);
    }
}
