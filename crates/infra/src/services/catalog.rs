//! Store, category and product CRUD.
//!
//! Uniqueness and "in use" checks run here so callers get a readable
//! `Conflict`; the Postgres schema enforces the same rules as a backstop.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use motico_core::{CategoryId, DomainError, ProductId, StoreId, TenantId};
use motico_inventory::{
    Category, CategoryPatch, NameRules, NewCategory, NewProduct, NewStore, Product, ProductFilter,
    ProductPatch, ProductWithStock, Store, StorePatch,
};

use crate::config::PaginationConfig;
use crate::error::InventoryResult;
use crate::repository::{
    CategoryRepository, Page, PageRequest, ProductRepository, StoreRepository,
};

#[derive(Clone)]
pub struct StoreCatalog {
    stores: Arc<dyn StoreRepository>,
    rules: NameRules,
    pagination: PaginationConfig,
}

impl StoreCatalog {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        rules: NameRules,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            stores,
            rules,
            pagination,
        }
    }

    #[instrument(skip(self, draft), fields(tenant_id = %draft.tenant_id), err)]
    pub async fn create(&self, draft: NewStore) -> InventoryResult<Store> {
        let store = Store::create(draft, &self.rules, Utc::now())?;
        if self.stores.exists_by_name(store.tenant_id, &store.name).await? {
            return Err(DomainError::conflict("store name already exists for this tenant").into());
        }
        self.stores.insert(&store).await?;
        info!(store_id = %store.id, "store created");
        Ok(store)
    }

    pub async fn get(&self, tenant_id: TenantId, id: StoreId) -> InventoryResult<Store> {
        self.stores
            .get_store(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("store").into())
    }

    pub async fn list(
        &self,
        tenant_id: TenantId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> InventoryResult<Page<Store>> {
        let request = PageRequest::new(page, limit, &self.pagination);
        self.stores.list(tenant_id, request).await
    }

    #[instrument(skip(self, patch), fields(tenant_id = %tenant_id, store_id = %id), err)]
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: StoreId,
        patch: StorePatch,
    ) -> InventoryResult<Store> {
        let mut store = self.get(tenant_id, id).await?;
        let renamed = patch.name.as_ref().is_some_and(|n| *n != store.name);

        store.apply_patch(patch, &self.rules, Utc::now())?;
        if renamed && self.stores.exists_by_name(tenant_id, &store.name).await? {
            return Err(DomainError::conflict("store name already exists for this tenant").into());
        }
        self.stores.update(&store).await?;
        Ok(store)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, store_id = %id), err)]
    pub async fn delete(&self, tenant_id: TenantId, id: StoreId) -> InventoryResult<()> {
        self.get(tenant_id, id).await?;
        if self.stores.has_products(tenant_id, id).await? {
            return Err(DomainError::conflict(
                "store has associated products and cannot be deleted",
            )
            .into());
        }
        self.stores.delete(tenant_id, id).await?;
        info!("store deleted");
        Ok(())
    }
}

#[derive(Clone)]
pub struct CategoryCatalog {
    categories: Arc<dyn CategoryRepository>,
    rules: NameRules,
    pagination: PaginationConfig,
}

impl CategoryCatalog {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        rules: NameRules,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            categories,
            rules,
            pagination,
        }
    }

    #[instrument(skip(self, draft), fields(tenant_id = %draft.tenant_id), err)]
    pub async fn create(&self, draft: NewCategory) -> InventoryResult<Category> {
        let category = Category::create(draft, &self.rules, Utc::now())?;
        if self
            .categories
            .exists_by_name(category.tenant_id, &category.name)
            .await?
        {
            return Err(
                DomainError::conflict("category name already exists for this tenant").into(),
            );
        }
        self.categories.insert(&category).await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    pub async fn get(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<Category> {
        self.categories
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("category").into())
    }

    pub async fn list(
        &self,
        tenant_id: TenantId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> InventoryResult<Page<Category>> {
        let request = PageRequest::new(page, limit, &self.pagination);
        self.categories.list(tenant_id, request).await
    }

    #[instrument(skip(self, patch), fields(tenant_id = %tenant_id, category_id = %id), err)]
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> InventoryResult<Category> {
        let mut category = self.get(tenant_id, id).await?;
        let renamed = patch.name.as_ref().is_some_and(|n| *n != category.name);

        category.apply_patch(patch, &self.rules, Utc::now())?;
        if renamed
            && self
                .categories
                .exists_by_name(tenant_id, &category.name)
                .await?
        {
            return Err(
                DomainError::conflict("category name already exists for this tenant").into(),
            );
        }
        self.categories.update(&category).await?;
        Ok(category)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, category_id = %id), err)]
    pub async fn delete(&self, tenant_id: TenantId, id: CategoryId) -> InventoryResult<()> {
        self.get(tenant_id, id).await?;
        if self.categories.has_products(tenant_id, id).await? {
            return Err(DomainError::conflict(
                "category has associated products and cannot be deleted",
            )
            .into());
        }
        self.categories.delete(tenant_id, id).await?;
        info!("category deleted");
        Ok(())
    }
}

#[derive(Clone)]
pub struct ProductCatalog {
    products: Arc<dyn ProductRepository>,
    stores: Arc<dyn StoreRepository>,
    categories: Arc<dyn CategoryRepository>,
    rules: NameRules,
    pagination: PaginationConfig,
}

impl ProductCatalog {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        stores: Arc<dyn StoreRepository>,
        categories: Arc<dyn CategoryRepository>,
        rules: NameRules,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            products,
            stores,
            categories,
            rules,
            pagination,
        }
    }

    /// The product's store and category must exist in the same tenant.
    async fn ensure_references(&self, product: &Product) -> InventoryResult<()> {
        if self
            .stores
            .get_store(product.tenant_id, product.store_id)
            .await?
            .is_none()
        {
            return Err(DomainError::validation("store does not exist").into());
        }
        if self
            .categories
            .get(product.tenant_id, product.category_id)
            .await?
            .is_none()
        {
            return Err(DomainError::validation("category does not exist").into());
        }
        Ok(())
    }

    async fn ensure_sku_free(&self, product: &Product) -> InventoryResult<()> {
        let Some(sku) = &product.sku else {
            return Ok(());
        };
        if self
            .products
            .exists_by_sku(product.tenant_id, product.store_id, sku)
            .await?
        {
            return Err(DomainError::conflict("product SKU already exists for this store").into());
        }
        Ok(())
    }

    #[instrument(skip(self, draft), fields(tenant_id = %draft.tenant_id, store_id = %draft.store_id), err)]
    pub async fn create(&self, draft: NewProduct) -> InventoryResult<Product> {
        let product = Product::create(draft, &self.rules, Utc::now())?;
        self.ensure_references(&product).await?;
        self.ensure_sku_free(&product).await?;
        self.products.insert(&product).await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// The product with its stock summary, if it has ever been stocked.
    pub async fn get(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<ProductWithStock> {
        self.products
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("product").into())
    }

    pub async fn list(
        &self,
        tenant_id: TenantId,
        filter: ProductFilter,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> InventoryResult<Page<ProductWithStock>> {
        let request = PageRequest::new(page, limit, &self.pagination);
        self.products.list(tenant_id, filter, request).await
    }

    #[instrument(skip(self, patch), fields(tenant_id = %tenant_id, product_id = %id), err)]
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: ProductId,
        patch: ProductPatch,
    ) -> InventoryResult<ProductWithStock> {
        let ProductWithStock { mut product, stock } = self.get(tenant_id, id).await?;
        let before = (product.store_id, product.category_id, product.sku.clone());

        product.apply_patch(patch, &self.rules, Utc::now())?;
        if (product.store_id, product.category_id) != (before.0, before.1) {
            self.ensure_references(&product).await?;
        }
        if product.sku.is_some() && (product.store_id != before.0 || product.sku != before.2) {
            self.ensure_sku_free(&product).await?;
        }

        self.products.update(&product).await?;
        Ok(ProductWithStock { product, stock })
    }

    /// Refused while the product has stock on hand or any transfer history.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %id), err)]
    pub async fn delete(&self, tenant_id: TenantId, id: ProductId) -> InventoryResult<()> {
        self.get(tenant_id, id).await?;
        if self.products.has_stock(tenant_id, id).await? {
            return Err(DomainError::conflict("product has stock and cannot be deleted").into());
        }
        if self.products.has_transfers(tenant_id, id).await? {
            return Err(
                DomainError::conflict("product has transfers and cannot be deleted").into(),
            );
        }
        self.products.delete(tenant_id, id).await?;
        info!("product deleted");
        Ok(())
    }
}
