use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use motico_core::{
    CategoryId, DomainError, Entity, ProductId, StoreId, TenantId, TransferId,
};
use motico_inventory::{
    Category, Product, ProductFilter, ProductWithStock, Stock, Store, Transfer, TransferFilter,
    TransferTransition,
};

use super::{
    CategoryRepository, Page, PageRequest, ProductRepository, StockRepository, StoreDirectory,
    StoreRepository, TransferRepository,
};
use crate::error::{InventoryError, InventoryResult};

type TenantTable<K, V> = HashMap<(TenantId, K), V>;

#[derive(Debug, Default)]
struct Tables {
    stores: TenantTable<StoreId, Store>,
    categories: TenantTable<CategoryId, Category>,
    products: TenantTable<ProductId, Product>,
    stock: TenantTable<ProductId, Stock>,
    transfers: TenantTable<TransferId, Transfer>,
}

/// In-memory backend for tests/dev.
///
/// All tables sit behind one lock, so every trait method is atomic with
/// respect to every other. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    inner: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, operation: &'static str) -> InventoryResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| InventoryError::unavailable(operation, "in-memory lock poisoned"))
    }

    fn write(&self, operation: &'static str) -> InventoryResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| InventoryError::unavailable(operation, "in-memory lock poisoned"))
    }
}

fn put<E>(table: &mut TenantTable<E::Id, E>, entity: &E)
where
    E: Entity + Clone,
{
    table.insert((entity.tenant_id(), entity.id()), entity.clone());
}

/// Replace an existing row; `NotFound(what)` if it is gone.
fn replace<E>(table: &mut TenantTable<E::Id, E>, entity: &E, what: &'static str) -> InventoryResult<()>
where
    E: Entity + Clone,
{
    match table.get_mut(&(entity.tenant_id(), entity.id())) {
        Some(slot) => {
            *slot = entity.clone();
            Ok(())
        }
        None => Err(DomainError::not_found(what).into()),
    }
}

fn remove<K: Eq + Hash, V>(
    table: &mut TenantTable<K, V>,
    tenant_id: TenantId,
    id: K,
    what: &'static str,
) -> InventoryResult<()> {
    table
        .remove(&(tenant_id, id))
        .map(|_| ())
        .ok_or_else(|| DomainError::not_found(what).into())
}

/// Newest-first page over a tenant's rows.
fn paginate<K, V>(
    table: &TenantTable<K, V>,
    tenant_id: TenantId,
    page: PageRequest,
    keep: impl Fn(&V) -> bool,
    created_at: impl Fn(&V) -> (DateTime<Utc>, K),
) -> Page<V>
where
    K: Ord + Copy,
    V: Clone,
{
    let mut rows: Vec<&V> = table
        .iter()
        .filter(|((t, _), v)| *t == tenant_id && keep(v))
        .map(|(_, v)| v)
        .collect();
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));

    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(page.limit as usize)
        .cloned()
        .collect();

    Page {
        items,
        total,
        request: page,
    }
}

fn with_stock(tables: &Tables, product: &Product) -> ProductWithStock {
    ProductWithStock {
        product: product.clone(),
        stock: tables
            .stock
            .get(&(product.tenant_id, product.id))
            .map(Stock::summary),
    }
}

#[async_trait]
impl StockRepository for InMemoryDatabase {
    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> InventoryResult<Option<Stock>> {
        let tables = self.read("get_stock")?;
        Ok(tables.stock.get(&(tenant_id, product_id)).cloned())
    }

    async fn set_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> InventoryResult<Stock> {
        let mut tables = self.write("set_stock_quantity")?;
        let now = Utc::now();
        let stock = match tables.stock.get(&(tenant_id, product_id)) {
            Some(existing) => {
                let mut next = existing.clone();
                next.set_quantity(quantity, now)?;
                next
            }
            None => Stock::new(tenant_id, product_id, quantity, now)?,
        };
        tables.stock.insert((tenant_id, product_id), stock.clone());
        Ok(stock)
    }

    async fn adjust_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
    ) -> InventoryResult<Stock> {
        let mut tables = self.write("adjust_stock_quantity")?;
        let now = Utc::now();
        let stock = match tables.stock.get(&(tenant_id, product_id)) {
            Some(existing) => {
                let mut next = existing.clone();
                next.adjust(delta, now)?;
                next
            }
            None => Stock::from_first_adjustment(tenant_id, product_id, delta, now)?,
        };
        tables.stock.insert((tenant_id, product_id), stock.clone());
        Ok(stock)
    }

    async fn reserve(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        amount: i64,
    ) -> InventoryResult<Stock> {
        let mut tables = self.write("reserve_stock")?;
        let stock = tables
            .stock
            .get_mut(&(tenant_id, product_id))
            .ok_or(DomainError::InsufficientStock)?;
        stock.reserve(amount, Utc::now())?;
        Ok(stock.clone())
    }

    async fn release(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        amount: i64,
    ) -> InventoryResult<Stock> {
        let mut tables = self.write("release_stock")?;
        let stock = tables
            .stock
            .get_mut(&(tenant_id, product_id))
            .ok_or(DomainError::not_found("stock"))?;
        stock.release(amount, Utc::now())?;
        Ok(stock.clone())
    }
}

#[async_trait]
impl StoreDirectory for InMemoryDatabase {
    async fn get_store(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
    ) -> InventoryResult<Option<Store>> {
        let tables = self.read("get_store")?;
        Ok(tables.stores.get(&(tenant_id, store_id)).cloned())
    }
}

#[async_trait]
impl StoreRepository for InMemoryDatabase {
    async fn list(&self, tenant_id: TenantId, page: PageRequest) -> InventoryResult<Page<Store>> {
        let tables = self.read("list_stores")?;
        Ok(paginate(&tables.stores, tenant_id, page, |_| true, |s| (s.created_at, s.id)))
    }

    async fn insert(&self, store: &Store) -> InventoryResult<()> {
        let mut tables = self.write("insert_store")?;
        let taken = tables
            .stores
            .values()
            .any(|s| s.tenant_id == store.tenant_id && s.name == store.name);
        if taken {
            return Err(DomainError::conflict("store name already exists for this tenant").into());
        }
        put(&mut tables.stores, store);
        Ok(())
    }

    async fn update(&self, store: &Store) -> InventoryResult<()> {
        let mut tables = self.write("update_store")?;
        let taken = tables.stores.values().any(|s| {
            s.tenant_id == store.tenant_id && s.id != store.id && s.name == store.name
        });
        if taken {
            return Err(DomainError::conflict("store name already exists for this tenant").into());
        }
        replace(&mut tables.stores, store, "store")
    }

    async fn delete(&self, tenant_id: TenantId, id: StoreId) -> InventoryResult<()> {
        let mut tables = self.write("delete_store")?;
        let referenced = tables
            .products
            .values()
            .any(|p| p.tenant_id == tenant_id && p.store_id == id)
            || tables.transfers.values().any(|t| {
                t.tenant_id == tenant_id && (t.from_store_id == id || t.to_store_id == id)
            });
        if referenced {
            return Err(DomainError::conflict("store is referenced and cannot be deleted").into());
        }
        remove(&mut tables.stores, tenant_id, id, "store")
    }

    async fn exists_by_name(&self, tenant_id: TenantId, name: &str) -> InventoryResult<bool> {
        let tables = self.read("store_exists_by_name")?;
        Ok(tables
            .stores
            .values()
            .any(|s| s.tenant_id == tenant_id && s.name == name))
    }

    async fn has_products(&self, tenant_id: TenantId, id: StoreId) -> InventoryResult<bool> {
        let tables = self.read("store_has_products")?;
        Ok(tables
            .products
            .values()
            .any(|p| p.tenant_id == tenant_id && p.store_id == id))
    }
}

#[async_trait]
impl CategoryRepository for InMemoryDatabase {
    async fn get(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<Option<Category>> {
        let tables = self.read("get_category")?;
        Ok(tables.categories.get(&(tenant_id, id)).cloned())
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> InventoryResult<Page<Category>> {
        let tables = self.read("list_categories")?;
        Ok(paginate(
            &tables.categories,
            tenant_id,
            page,
            |_| true,
            |c| (c.created_at, c.id),
        ))
    }

    async fn insert(&self, category: &Category) -> InventoryResult<()> {
        let mut tables = self.write("insert_category")?;
        let taken = tables
            .categories
            .values()
            .any(|c| c.tenant_id == category.tenant_id && c.name == category.name);
        if taken {
            return Err(
                DomainError::conflict("category name already exists for this tenant").into(),
            );
        }
        put(&mut tables.categories, category);
        Ok(())
    }

    async fn update(&self, category: &Category) -> InventoryResult<()> {
        let mut tables = self.write("update_category")?;
        let taken = tables.categories.values().any(|c| {
            c.tenant_id == category.tenant_id && c.id != category.id && c.name == category.name
        });
        if taken {
            return Err(
                DomainError::conflict("category name already exists for this tenant").into(),
            );
        }
        replace(&mut tables.categories, category, "category")
    }

    async fn delete(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<()> {
        let mut tables = self.write("delete_category")?;
        if tables
            .products
            .values()
            .any(|p| p.tenant_id == tenant_id && p.category_id == id)
        {
            return Err(DomainError::conflict(
                "category has associated products and cannot be deleted",
            )
            .into());
        }
        remove(&mut tables.categories, tenant_id, id, "category")
    }

    async fn exists_by_name(&self, tenant_id: TenantId, name: &str) -> InventoryResult<bool> {
        let tables = self.read("category_exists_by_name")?;
        Ok(tables
            .categories
            .values()
            .any(|c| c.tenant_id == tenant_id && c.name == name))
    }

    async fn has_products(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<bool> {
        let tables = self.read("category_has_products")?;
        Ok(tables
            .products
            .values()
            .any(|p| p.tenant_id == tenant_id && p.category_id == id))
    }
}

#[async_trait]
impl ProductRepository for InMemoryDatabase {
    async fn get(
        &self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> InventoryResult<Option<ProductWithStock>> {
        let tables = self.read("get_product")?;
        Ok(tables
            .products
            .get(&(tenant_id, id))
            .map(|p| with_stock(&tables, p)))
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        filter: ProductFilter,
        page: PageRequest,
    ) -> InventoryResult<Page<ProductWithStock>> {
        let tables = self.read("list_products")?;
        let page = paginate(
            &tables.products,
            tenant_id,
            page,
            |p| filter.matches(p),
            |p| (p.created_at, p.id),
        );
        Ok(page.map(|p| with_stock(&tables, &p)))
    }

    async fn insert(&self, product: &Product) -> InventoryResult<()> {
        let mut tables = self.write("insert_product")?;
        if let Some(sku) = &product.sku {
            let taken = tables.products.values().any(|p| {
                p.tenant_id == product.tenant_id
                    && p.store_id == product.store_id
                    && p.sku.as_ref() == Some(sku)
            });
            if taken {
                return Err(DomainError::conflict("product SKU already exists in this store").into());
            }
        }
        put(&mut tables.products, product);
        Ok(())
    }

    async fn update(&self, product: &Product) -> InventoryResult<()> {
        let mut tables = self.write("update_product")?;
        if let Some(sku) = &product.sku {
            let taken = tables.products.values().any(|p| {
                p.tenant_id == product.tenant_id
                    && p.id != product.id
                    && p.store_id == product.store_id
                    && p.sku.as_ref() == Some(sku)
            });
            if taken {
                return Err(DomainError::conflict("product SKU already exists in this store").into());
            }
        }
        replace(&mut tables.products, product, "product")
    }

    async fn delete(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<()> {
        let mut tables = self.write("delete_product")?;
        remove(&mut tables.products, tenant_id, id, "product")?;
        // Mirrors ON DELETE CASCADE on stock.product_id.
        tables.stock.remove(&(tenant_id, id));
        Ok(())
    }

    async fn exists_by_sku(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
        sku: &str,
    ) -> InventoryResult<bool> {
        let tables = self.read("product_exists_by_sku")?;
        Ok(tables.products.values().any(|p| {
            p.tenant_id == tenant_id && p.store_id == store_id && p.sku.as_deref() == Some(sku)
        }))
    }

    async fn has_stock(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<bool> {
        let tables = self.read("product_has_stock")?;
        Ok(tables
            .stock
            .get(&(tenant_id, id))
            .is_some_and(|s| s.quantity > 0))
    }

    async fn has_transfers(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<bool> {
        let tables = self.read("product_has_transfers")?;
        Ok(tables
            .transfers
            .values()
            .any(|t| t.tenant_id == tenant_id && t.product_id == id))
    }
}

#[async_trait]
impl TransferRepository for InMemoryDatabase {
    async fn get(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<Option<Transfer>> {
        let tables = self.read("get_transfer")?;
        Ok(tables.transfers.get(&(tenant_id, id)).cloned())
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        filter: TransferFilter,
        page: PageRequest,
    ) -> InventoryResult<Page<Transfer>> {
        let tables = self.read("list_transfers")?;
        Ok(paginate(
            &tables.transfers,
            tenant_id,
            page,
            |t| filter.matches(t),
            |t| (t.created_at, t.id),
        ))
    }

    async fn insert_reserving(&self, transfer: &Transfer) -> InventoryResult<()> {
        let mut tables = self.write("insert_transfer")?;
        let stock = tables
            .stock
            .get_mut(&(transfer.tenant_id, transfer.product_id))
            .ok_or(DomainError::InsufficientStock)?;
        stock.reserve(transfer.quantity, Utc::now())?;
        put(&mut tables.transfers, transfer);
        Ok(())
    }

    async fn update_pending(&self, transfer: &Transfer) -> InventoryResult<()> {
        let mut tables = self.write("update_transfer")?;
        let current = tables
            .transfers
            .get(&(transfer.tenant_id, transfer.id))
            .ok_or(DomainError::not_found("transfer"))?;
        current.ensure_pending()?;
        replace(&mut tables.transfers, transfer, "transfer")
    }

    async fn transition(
        &self,
        tenant_id: TenantId,
        id: TransferId,
        transition: TransferTransition,
    ) -> InventoryResult<Transfer> {
        let mut tables = self.write("transition_transfer")?;
        let now = Utc::now();

        let mut transfer = tables
            .transfers
            .get(&(tenant_id, id))
            .cloned()
            .ok_or(DomainError::not_found("transfer"))?;
        transition.apply(&mut transfer, now)?;

        // Release before writing the transfer so a missing stock row aborts both.
        let stock = tables
            .stock
            .get_mut(&(tenant_id, transfer.product_id))
            .ok_or(DomainError::not_found("stock"))?;
        stock.release(transfer.quantity, now)?;

        put(&mut tables.transfers, &transfer);
        Ok(transfer)
    }

    async fn delete_pending(&self, tenant_id: TenantId, id: TransferId) -> InventoryResult<()> {
        let mut tables = self.write("delete_transfer")?;
        tables
            .transfers
            .get(&(tenant_id, id))
            .ok_or(DomainError::not_found("transfer"))?
            .ensure_pending()?;
        remove(&mut tables.transfers, tenant_id, id, "transfer")
    }
}
