//! Postgres-backed inventory database.
//!
//! ## Atomicity
//!
//! - `reserve` is a single conditional `UPDATE ... WHERE quantity -
//!   reserved_quantity >= $amount`; concurrent reservers serialize on the row
//!   lock Postgres takes for the update and the predicate is re-evaluated.
//! - `set_quantity`/`adjust_quantity` seed a zero row if needed, lock it with
//!   `SELECT ... FOR UPDATE` and apply the domain rule inside one transaction.
//!   A rejected rule rolls the seed back.
//! - Transfer create/complete/cancel run the transfer write and the stock
//!   write in one transaction.
//! - `update_pending`/`delete_pending` are conditional on `status = 'pending'`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | InventoryError |
//! |------------|----------------------|----------------|
//! | Database (unique violation) | `23505` | `Domain(Conflict)` |
//! | Database (foreign key violation) | `23503` | `Domain(Conflict)` |
//! | Database (other) | Any other | `Storage` |
//! | PoolTimedOut / PoolClosed / Io / Tls | N/A | `Unavailable` |
//! | Other | N/A | `Storage` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use motico_core::{
    CategoryId, DomainError, ProductId, StockId, StoreId, TenantId, TransferId,
};
use motico_inventory::stock::ensure_positive;
use motico_inventory::{
    Category, Product, ProductFilter, ProductWithStock, Stock, StockSummary, Store, Transfer,
    TransferFilter, TransferStatus, TransferTransition,
};

use super::{
    CategoryRepository, Page, PageRequest, ProductRepository, StockRepository, StoreDirectory,
    StoreRepository, TransferRepository,
};
use crate::error::{InventoryError, InventoryResult};

/// Postgres-backed implementation of every repository trait.
///
/// Every query includes `tenant_id` in the WHERE clause; composite foreign
/// keys on `(tenant_id, id)` keep references inside one tenant.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self, operation: &'static str) -> InventoryResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Explain a conditional transfer write that matched no row.
    async fn pending_miss(&self, tenant_id: TenantId, id: TransferId) -> InventoryError {
        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM transfers WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await;

        match status {
            Ok(Some(_)) => DomainError::TransferNotPending.into(),
            Ok(None) => DomainError::not_found("transfer").into(),
            Err(e) => map_sqlx_error("transfer_status", e),
        }
    }

    /// Seed a zero row when missing, then lock it for the rest of `tx`.
    async fn lock_or_seed_stock(
        tx: &mut Transaction<'static, Postgres>,
        tenant_id: TenantId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> InventoryResult<Stock> {
        sqlx::query(
            r#"
            INSERT INTO stock (id, tenant_id, product_id, quantity, reserved_quantity, created_at, updated_at)
            VALUES ($1, $2, $3, 0, 0, $4, $4)
            ON CONFLICT (tenant_id, product_id) DO NOTHING
            "#,
        )
        .bind(StockId::new().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("seed_stock", e))?;

        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, tenant_id, product_id, quantity, reserved_quantity, created_at, updated_at
            FROM stock
            WHERE tenant_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stock", e))?;

        Ok(row.into())
    }

    async fn write_stock(
        tx: &mut Transaction<'static, Postgres>,
        stock: &Stock,
    ) -> InventoryResult<()> {
        sqlx::query(
            r#"
            UPDATE stock
            SET quantity = $1, reserved_quantity = $2, updated_at = $3
            WHERE tenant_id = $4 AND id = $5
            "#,
        )
        .bind(stock.quantity)
        .bind(stock.reserved_quantity)
        .bind(stock.updated_at)
        .bind(stock.tenant_id.as_uuid())
        .bind(stock.id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_stock", e))?;
        Ok(())
    }

    /// Lock-or-seed, apply `rule`, write back, commit.
    async fn mutate_stock(
        &self,
        operation: &'static str,
        tenant_id: TenantId,
        product_id: ProductId,
        rule: impl FnOnce(&mut Stock, DateTime<Utc>) -> Result<(), DomainError> + Send,
    ) -> InventoryResult<Stock> {
        let now = Utc::now();
        let mut tx = self.begin(operation).await?;

        let mut stock = Self::lock_or_seed_stock(&mut tx, tenant_id, product_id, now).await?;
        // Dropping `tx` on error rolls back the seed.
        rule(&mut stock, now)?;
        Self::write_stock(&mut tx, &stock).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(stock)
    }
}

/// Conditional reservation; `None` when the predicate (or the row) is missing.
async fn reserve_with<'e, E: PgExecutor<'e>>(
    executor: E,
    tenant_id: TenantId,
    product_id: ProductId,
    amount: i64,
) -> Result<Option<StockRow>, sqlx::Error> {
    sqlx::query_as::<_, StockRow>(
        r#"
        UPDATE stock
        SET reserved_quantity = reserved_quantity + $1, updated_at = NOW()
        WHERE tenant_id = $2 AND product_id = $3 AND (quantity - reserved_quantity) >= $1
        RETURNING id, tenant_id, product_id, quantity, reserved_quantity, created_at, updated_at
        "#,
    )
    .bind(amount)
    .bind(tenant_id.as_uuid())
    .bind(product_id.as_uuid())
    .fetch_optional(executor)
    .await
}

/// Release floored at zero; `None` when no row exists.
async fn release_with<'e, E: PgExecutor<'e>>(
    executor: E,
    tenant_id: TenantId,
    product_id: ProductId,
    amount: i64,
) -> Result<Option<StockRow>, sqlx::Error> {
    sqlx::query_as::<_, StockRow>(
        r#"
        UPDATE stock
        SET reserved_quantity = GREATEST(0, reserved_quantity - $1), updated_at = NOW()
        WHERE tenant_id = $2 AND product_id = $3
        RETURNING id, tenant_id, product_id, quantity, reserved_quantity, created_at, updated_at
        "#,
    )
    .bind(amount)
    .bind(tenant_id.as_uuid())
    .bind(product_id.as_uuid())
    .fetch_optional(executor)
    .await
}

fn limit_offset(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.limit),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[async_trait]
impl StockRepository for PgDatabase {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> InventoryResult<Option<Stock>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, tenant_id, product_id, quantity, reserved_quantity, created_at, updated_at
            FROM stock
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_stock", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn set_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> InventoryResult<Stock> {
        self.mutate_stock("set_stock_quantity", tenant_id, product_id, |stock, now| {
            stock.set_quantity(quantity, now)
        })
        .await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn adjust_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
    ) -> InventoryResult<Stock> {
        // A seeded zero row makes a first negative delta fail as InsufficientStock.
        self.mutate_stock("adjust_stock_quantity", tenant_id, product_id, |stock, now| {
            stock.adjust(delta, now)
        })
        .await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn reserve(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        amount: i64,
    ) -> InventoryResult<Stock> {
        ensure_positive(amount)?;
        reserve_with(&self.pool, tenant_id, product_id, amount)
            .await
            .map_err(|e| map_sqlx_error("reserve_stock", e))?
            .map(Into::into)
            .ok_or_else(|| DomainError::InsufficientStock.into())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn release(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        amount: i64,
    ) -> InventoryResult<Stock> {
        ensure_positive(amount)?;
        release_with(&self.pool, tenant_id, product_id, amount)
            .await
            .map_err(|e| map_sqlx_error("release_stock", e))?
            .map(Into::into)
            .ok_or_else(|| DomainError::not_found("stock").into())
    }
}

#[async_trait]
impl StoreDirectory for PgDatabase {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, store_id = %store_id), err)]
    async fn get_store(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
    ) -> InventoryResult<Option<Store>> {
        let row = sqlx::query_as::<_, StoreRow>(
            r#"
            SELECT id, tenant_id, name, address, created_at, updated_at
            FROM stores
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_store", e))?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl StoreRepository for PgDatabase {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list(&self, tenant_id: TenantId, page: PageRequest) -> InventoryResult<Page<Store>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, StoreRow>(
            r#"
            SELECT id, tenant_id, name, address, created_at, updated_at
            FROM stores
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stores", e))?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_stores", e))?;

        Ok(Page {
            items: rows.into_iter().map(Into::into).collect(),
            total: total(count),
            request: page,
        })
    }

    #[instrument(skip(self, store), fields(tenant_id = %store.tenant_id, store_id = %store.id), err)]
    async fn insert(&self, store: &Store) -> InventoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stores (id, tenant_id, name, address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(store.id.as_uuid())
        .bind(store.tenant_id.as_uuid())
        .bind(&store.name)
        .bind(&store.address)
        .bind(store.created_at)
        .bind(store.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_store", e))?;
        Ok(())
    }

    #[instrument(skip(self, store), fields(tenant_id = %store.tenant_id, store_id = %store.id), err)]
    async fn update(&self, store: &Store) -> InventoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stores
            SET name = $3, address = $4, updated_at = $5
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(store.tenant_id.as_uuid())
        .bind(store.id.as_uuid())
        .bind(&store.name)
        .bind(&store.address)
        .bind(store.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_store", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("store").into());
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, store_id = %id), err)]
    async fn delete(&self, tenant_id: TenantId, id: StoreId) -> InventoryResult<()> {
        let result = sqlx::query("DELETE FROM stores WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_store", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("store").into());
        }
        Ok(())
    }

    async fn exists_by_name(&self, tenant_id: TenantId, name: &str) -> InventoryResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM stores WHERE tenant_id = $1 AND name = $2)",
        )
        .bind(tenant_id.as_uuid())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("store_exists_by_name", e))
    }

    async fn has_products(&self, tenant_id: TenantId, id: StoreId) -> InventoryResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE tenant_id = $1 AND store_id = $2)",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("store_has_products", e))
    }
}

#[async_trait]
impl CategoryRepository for PgDatabase {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, category_id = %id), err)]
    async fn get(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, tenant_id, name, description, created_at, updated_at
            FROM categories
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_category", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> InventoryResult<Page<Category>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, tenant_id, name, description, created_at, updated_at
            FROM categories
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE tenant_id = $1")
                .bind(tenant_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("count_categories", e))?;

        Ok(Page {
            items: rows.into_iter().map(Into::into).collect(),
            total: total(count),
            request: page,
        })
    }

    #[instrument(skip(self, category), fields(tenant_id = %category.tenant_id, category_id = %category.id), err)]
    async fn insert(&self, category: &Category) -> InventoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, tenant_id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(category.tenant_id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    #[instrument(skip(self, category), fields(tenant_id = %category.tenant_id, category_id = %category.id), err)]
    async fn update(&self, category: &Category) -> InventoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET name = $3, description = $4, updated_at = $5
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(category.tenant_id.as_uuid())
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_category", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("category").into());
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, category_id = %id), err)]
    async fn delete(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("category").into());
        }
        Ok(())
    }

    async fn exists_by_name(&self, tenant_id: TenantId, name: &str) -> InventoryResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE tenant_id = $1 AND name = $2)",
        )
        .bind(tenant_id.as_uuid())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("category_exists_by_name", e))
    }

    async fn has_products(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE tenant_id = $1 AND category_id = $2)",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("category_has_products", e))
    }
}

#[async_trait]
impl ProductRepository for PgDatabase {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %id), err)]
    async fn get(
        &self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> InventoryResult<Option<ProductWithStock>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.tenant_id, p.store_id, p.category_id, p.name, p.description,
                   p.sku, p.price, p.created_at, p.updated_at,
                   s.quantity AS stock_quantity, s.reserved_quantity AS stock_reserved
            FROM products p
            LEFT JOIN stock s ON s.tenant_id = p.tenant_id AND s.product_id = p.id
            WHERE p.tenant_id = $1 AND p.id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list(
        &self,
        tenant_id: TenantId,
        filter: ProductFilter,
        page: PageRequest,
    ) -> InventoryResult<Page<ProductWithStock>> {
        let (limit, offset) = limit_offset(page);
        let store_id = filter.store_id.map(Uuid::from);
        let category_id = filter.category_id.map(Uuid::from);

        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.tenant_id, p.store_id, p.category_id, p.name, p.description,
                   p.sku, p.price, p.created_at, p.updated_at,
                   s.quantity AS stock_quantity, s.reserved_quantity AS stock_reserved
            FROM products p
            LEFT JOIN stock s ON s.tenant_id = p.tenant_id AND s.product_id = p.id
            WHERE p.tenant_id = $1
              AND ($2::uuid IS NULL OR p.store_id = $2)
              AND ($3::uuid IS NULL OR p.category_id = $3)
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(store_id)
        .bind(category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM products
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR store_id = $2)
              AND ($3::uuid IS NULL OR category_id = $3)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(store_id)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_products", e))?;

        Ok(Page {
            items: rows.into_iter().map(Into::into).collect(),
            total: total(count),
            request: page,
        })
    }

    #[instrument(skip(self, product), fields(tenant_id = %product.tenant_id, product_id = %product.id), err)]
    async fn insert(&self, product: &Product) -> InventoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, tenant_id, store_id, category_id, name, description, sku, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.tenant_id.as_uuid())
        .bind(product.store_id.as_uuid())
        .bind(product.category_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(product.price)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(tenant_id = %product.tenant_id, product_id = %product.id), err)]
    async fn update(&self, product: &Product) -> InventoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET store_id = $3, category_id = $4, name = $5, description = $6,
                sku = $7, price = $8, updated_at = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(product.tenant_id.as_uuid())
        .bind(product.id.as_uuid())
        .bind(product.store_id.as_uuid())
        .bind(product.category_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(product.price)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("product").into());
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %id), err)]
    async fn delete(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("product").into());
        }
        Ok(())
    }

    async fn exists_by_sku(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
        sku: &str,
    ) -> InventoryResult<bool> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM products WHERE tenant_id = $1 AND store_id = $2 AND sku = $3
            )
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(store_id.as_uuid())
        .bind(sku)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_exists_by_sku", e))
    }

    async fn has_stock(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<bool> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM stock WHERE tenant_id = $1 AND product_id = $2 AND quantity > 0
            )
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_has_stock", e))
    }

    async fn has_transfers(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM transfers WHERE tenant_id = $1 AND product_id = $2)",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_has_transfers", e))
    }
}

#[async_trait]
impl TransferRepository for PgDatabase {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    async fn get(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<Option<Transfer>> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, tenant_id, product_id, from_store_id, to_store_id, quantity, status,
                   notes, created_at, updated_at
            FROM transfers
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transfer", e))?;

        row.map(Transfer::try_from).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list(
        &self,
        tenant_id: TenantId,
        filter: TransferFilter,
        page: PageRequest,
    ) -> InventoryResult<Page<Transfer>> {
        let (limit, offset) = limit_offset(page);
        let status = filter.status.map(|s| s.as_str());
        let store_id = filter.store_id.map(Uuid::from);

        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, tenant_id, product_id, from_store_id, to_store_id, quantity, status,
                   notes, created_at, updated_at
            FROM transfers
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR from_store_id = $3 OR to_store_id = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(status)
        .bind(store_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transfers", e))?;

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM transfers
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR from_store_id = $3 OR to_store_id = $3)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(status)
        .bind(store_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_transfers", e))?;

        let items = rows
            .into_iter()
            .map(Transfer::try_from)
            .collect::<InventoryResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total: total(count),
            request: page,
        })
    }

    #[instrument(
        skip(self, transfer),
        fields(
            tenant_id = %transfer.tenant_id,
            transfer_id = %transfer.id,
            product_id = %transfer.product_id,
            quantity = transfer.quantity
        ),
        err
    )]
    async fn insert_reserving(&self, transfer: &Transfer) -> InventoryResult<()> {
        let mut tx = self.begin("insert_transfer").await?;

        // Reserve first: a lost race leaves nothing to roll back but the tx.
        reserve_with(&mut *tx, transfer.tenant_id, transfer.product_id, transfer.quantity)
            .await
            .map_err(|e| map_sqlx_error("reserve_stock", e))?
            .ok_or(DomainError::InsufficientStock)?;

        sqlx::query(
            r#"
            INSERT INTO transfers
                (id, tenant_id, product_id, from_store_id, to_store_id, quantity, status,
                 notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(transfer.id.as_uuid())
        .bind(transfer.tenant_id.as_uuid())
        .bind(transfer.product_id.as_uuid())
        .bind(transfer.from_store_id.as_uuid())
        .bind(transfer.to_store_id.as_uuid())
        .bind(transfer.quantity)
        .bind(transfer.status.as_str())
        .bind(&transfer.notes)
        .bind(transfer.created_at)
        .bind(transfer.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transfer", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_transfer", e))?;
        Ok(())
    }

    #[instrument(skip(self, transfer), fields(tenant_id = %transfer.tenant_id, transfer_id = %transfer.id), err)]
    async fn update_pending(&self, transfer: &Transfer) -> InventoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transfers
            SET product_id = $3, from_store_id = $4, to_store_id = $5, quantity = $6,
                notes = $7, updated_at = $8
            WHERE tenant_id = $1 AND id = $2 AND status = 'pending'
            "#,
        )
        .bind(transfer.tenant_id.as_uuid())
        .bind(transfer.id.as_uuid())
        .bind(transfer.product_id.as_uuid())
        .bind(transfer.from_store_id.as_uuid())
        .bind(transfer.to_store_id.as_uuid())
        .bind(transfer.quantity)
        .bind(&transfer.notes)
        .bind(transfer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_transfer", e))?;

        if result.rows_affected() == 0 {
            return Err(self.pending_miss(transfer.tenant_id, transfer.id).await);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    async fn transition(
        &self,
        tenant_id: TenantId,
        id: TransferId,
        transition: TransferTransition,
    ) -> InventoryResult<Transfer> {
        let now = Utc::now();
        let mut tx = self.begin("transition_transfer").await?;

        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, tenant_id, product_id, from_store_id, to_store_id, quantity, status,
                   notes, created_at, updated_at
            FROM transfers
            WHERE tenant_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_transfer", e))?
        .ok_or(DomainError::not_found("transfer"))?;

        let mut transfer = Transfer::try_from(row)?;
        transition.apply(&mut transfer, now)?;

        sqlx::query(
            r#"
            UPDATE transfers
            SET status = $3, updated_at = $4
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(transfer.status.as_str())
        .bind(transfer.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("transition_transfer", e))?;

        release_with(&mut *tx, tenant_id, transfer.product_id, transfer.quantity)
            .await
            .map_err(|e| map_sqlx_error("release_stock", e))?
            .ok_or(DomainError::not_found("stock"))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("transition_transfer", e))?;
        Ok(transfer)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %id), err)]
    async fn delete_pending(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<()> {
        let result = sqlx::query(
            "DELETE FROM transfers WHERE tenant_id = $1 AND id = $2 AND status = 'pending'",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_transfer", e))?;

        if result.rows_affected() == 0 {
            return Err(self.pending_miss(tenant_id, id).await);
        }
        Ok(())
    }
}

// -------------------------
// Row mapping
// -------------------------

#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    tenant_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    reserved_quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for Stock {
    fn from(row: StockRow) -> Self {
        Stock {
            id: StockId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            product_id: ProductId::from_uuid(row.product_id),
            quantity: row.quantity,
            reserved_quantity: row.reserved_quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StoreRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Store {
            id: StoreId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: CategoryId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    tenant_id: Uuid,
    store_id: Uuid,
    category_id: Uuid,
    name: String,
    description: Option<String>,
    sku: Option<String>,
    price: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    stock_quantity: Option<i64>,
    stock_reserved: Option<i64>,
}

impl From<ProductRow> for ProductWithStock {
    fn from(row: ProductRow) -> Self {
        let stock = match (row.stock_quantity, row.stock_reserved) {
            (Some(quantity), Some(reserved_quantity)) => Some(StockSummary {
                quantity,
                reserved_quantity,
                available_quantity: (quantity - reserved_quantity).max(0),
            }),
            _ => None,
        };
        ProductWithStock {
            product: Product {
                id: ProductId::from_uuid(row.id),
                tenant_id: TenantId::from_uuid(row.tenant_id),
                store_id: StoreId::from_uuid(row.store_id),
                category_id: CategoryId::from_uuid(row.category_id),
                name: row.name,
                description: row.description,
                sku: row.sku,
                price: row.price,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            stock,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    tenant_id: Uuid,
    product_id: Uuid,
    from_store_id: Uuid,
    to_store_id: Uuid,
    quantity: i64,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransferRow> for Transfer {
    type Error = InventoryError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        let status: TransferStatus = row.status.parse().map_err(|e: DomainError| {
            InventoryError::storage("decode_transfer", format!("transfer {}: {e}", row.id))
        })?;
        Ok(Transfer {
            id: TransferId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            product_id: ProductId::from_uuid(row.product_id),
            from_store_id: StoreId::from_uuid(row.from_store_id),
            to_store_id: StoreId::from_uuid(row.to_store_id),
            quantity: row.quantity,
            status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Map a SQLx error to an inventory error with context.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> InventoryError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => DomainError::conflict(unique_violation_message(db_err.constraint()))
                .into(),
            Some("23503") => DomainError::conflict(format!(
                "operation {operation} violates a reference between records"
            ))
            .into(),
            _ => InventoryError::storage(
                operation,
                format!("database error: {}", db_err.message()),
            ),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            InventoryError::unavailable(operation, "connection pool exhausted or closed")
        }
        sqlx::Error::Io(e) => InventoryError::unavailable(operation, e.to_string()),
        sqlx::Error::Tls(e) => InventoryError::unavailable(operation, e.to_string()),
        other => InventoryError::storage(operation, other.to_string()),
    }
}

fn unique_violation_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("stores_tenant_name_key") => "store name already exists for this tenant".to_string(),
        Some("categories_tenant_name_key") => {
            "category name already exists for this tenant".to_string()
        }
        Some("products_tenant_store_sku_key") => {
            "product SKU already exists in this store".to_string()
        }
        Some(other) => format!("unique constraint {other} violated"),
        None => "unique constraint violated".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_in_row_is_a_storage_error() {
        let now = Utc::now();
        let row = TransferRow {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            product_id: Uuid::now_v7(),
            from_store_id: Uuid::now_v7(),
            to_store_id: Uuid::now_v7(),
            quantity: 1,
            status: "shipped".to_string(),
            notes: None,
            created_at: now,
            updated_at: now,
        };
        match Transfer::try_from(row) {
            Err(InventoryError::Storage { operation, .. }) => assert_eq!(operation, "decode_transfer"),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn product_row_without_stock_has_no_summary() {
        let now = Utc::now();
        let row = ProductRow {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            store_id: Uuid::now_v7(),
            category_id: Uuid::now_v7(),
            name: "Bolt".to_string(),
            description: None,
            sku: None,
            price: Some(1.5),
            created_at: now,
            updated_at: now,
            stock_quantity: None,
            stock_reserved: None,
        };
        let product: ProductWithStock = row.into();
        assert!(product.stock.is_none());
    }

    #[test]
    fn pool_errors_are_unavailable() {
        match map_sqlx_error("get_stock", sqlx::Error::PoolTimedOut) {
            InventoryError::Unavailable { operation, .. } => assert_eq!(operation, "get_stock"),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[test]
    fn unique_violations_name_the_entity() {
        assert_eq!(
            unique_violation_message(Some("stores_tenant_name_key")),
            "store name already exists for this tenant"
        );
    }
}
