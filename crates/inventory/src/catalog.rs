//! Catalog entities referenced by stock and transfers.
//!
//! These carry only field validation; uniqueness and referential checks need
//! storage lookups and live with the catalog services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motico_core::{CategoryId, DomainError, DomainResult, Entity, ProductId, StoreId, TenantId};

use crate::stock::StockSummary;

/// Length limits applied to names and descriptions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NameRules {
    pub max_name_length: usize,
    pub max_description_length: usize,
}

impl Default for NameRules {
    fn default() -> Self {
        Self {
            max_name_length: 255,
            max_description_length: 1000,
        }
    }
}

impl NameRules {
    /// `what` names the field in the error message (e.g. `"store name"`).
    pub fn validate_name(&self, what: &str, name: &str) -> DomainResult<()> {
        if name.trim().is_empty() {
            return Err(DomainError::validation(format!("{what} cannot be empty")));
        }
        if name.chars().count() > self.max_name_length {
            return Err(DomainError::validation(format!(
                "{what} cannot exceed {} characters",
                self.max_name_length
            )));
        }
        Ok(())
    }

    pub fn validate_description(&self, what: &str, text: Option<&str>) -> DomainResult<()> {
        match text {
            Some(text) if text.chars().count() > self.max_description_length => {
                Err(DomainError::validation(format!(
                    "{what} cannot exceed {} characters",
                    self.max_description_length
                )))
            }
            _ => Ok(()),
        }
    }
}

// -------------------------
// Stores
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub tenant_id: TenantId,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStore {
    pub tenant_id: TenantId,
    pub name: String,
    pub address: Option<String>,
}

/// `None` leaves a field as is; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorePatch {
    pub name: Option<String>,
    pub address: Option<Option<String>>,
}

impl Store {
    pub fn create(draft: NewStore, rules: &NameRules, now: DateTime<Utc>) -> DomainResult<Self> {
        rules.validate_name("store name", &draft.name)?;
        rules.validate_description("store address", draft.address.as_deref())?;
        Ok(Self {
            id: StoreId::new(),
            tenant_id: draft.tenant_id,
            name: draft.name,
            address: draft.address,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(
        &mut self,
        patch: StorePatch,
        rules: &NameRules,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(name) = &patch.name {
            rules.validate_name("store name", name)?;
        }
        if let Some(address) = &patch.address {
            rules.validate_description("store address", address.as_deref())?;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Store {
    type Id = StoreId;

    fn id(&self) -> StoreId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

// -------------------------
// Categories
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl Category {
    pub fn create(draft: NewCategory, rules: &NameRules, now: DateTime<Utc>) -> DomainResult<Self> {
        rules.validate_name("category name", &draft.name)?;
        rules.validate_description("category description", draft.description.as_deref())?;
        Ok(Self {
            id: CategoryId::new(),
            tenant_id: draft.tenant_id,
            name: draft.name,
            description: draft.description,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(
        &mut self,
        patch: CategoryPatch,
        rules: &NameRules,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(name) = &patch.name {
            rules.validate_name("category name", name)?;
        }
        if let Some(description) = &patch.description {
            rules.validate_description("category description", description.as_deref())?;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> CategoryId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

// -------------------------
// Products
// -------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub tenant_id: TenantId,
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub store_id: Option<StoreId>,
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub sku: Option<Option<String>>,
    pub price: Option<Option<f64>>,
}

/// A product together with its stock row, when one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductWithStock {
    pub product: Product,
    pub stock: Option<StockSummary>,
}

/// Optional list filters for products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub store_id: Option<StoreId>,
    pub category_id: Option<CategoryId>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        self.store_id.is_none_or(|id| product.store_id == id)
            && self.category_id.is_none_or(|id| product.category_id == id)
    }
}

fn validate_price(price: Option<f64>) -> DomainResult<()> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => {
            Err(DomainError::validation("price must be a non-negative number"))
        }
        _ => Ok(()),
    }
}

impl Product {
    pub fn create(draft: NewProduct, rules: &NameRules, now: DateTime<Utc>) -> DomainResult<Self> {
        rules.validate_name("product name", &draft.name)?;
        rules.validate_description("product description", draft.description.as_deref())?;
        validate_price(draft.price)?;
        Ok(Self {
            id: ProductId::new(),
            tenant_id: draft.tenant_id,
            store_id: draft.store_id,
            category_id: draft.category_id,
            name: draft.name,
            description: draft.description,
            sku: draft.sku.filter(|s| !s.is_empty()),
            price: draft.price,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(
        &mut self,
        patch: ProductPatch,
        rules: &NameRules,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(name) = &patch.name {
            rules.validate_name("product name", name)?;
        }
        if let Some(description) = &patch.description {
            rules.validate_description("product description", description.as_deref())?;
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }

        if let Some(store_id) = patch.store_id {
            self.store_id = store_id;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(sku) = patch.sku {
            self.sku = sku.filter(|s| !s.is_empty());
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> NameRules {
        NameRules {
            max_name_length: 10,
            max_description_length: 20,
        }
    }

    #[test]
    fn empty_or_blank_name_is_rejected() {
        let draft = NewStore {
            tenant_id: TenantId::new(),
            name: "   ".to_string(),
            address: None,
        };
        match Store::create(draft, &rules(), Utc::now()) {
            Err(DomainError::Validation(msg)) if msg.contains("store name") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn name_length_limit_counts_characters() {
        assert!(rules().validate_name("name", "ñññññññññ").is_ok());
        assert!(rules().validate_name("name", "abcdefghijk").is_err());
    }

    #[test]
    fn store_patch_only_touches_given_fields() {
        let mut store = Store::create(
            NewStore {
                tenant_id: TenantId::new(),
                name: "Main".to_string(),
                address: Some("1 High St".to_string()),
            },
            &rules(),
            Utc::now(),
        )
        .unwrap();

        store
            .apply_patch(
                StorePatch {
                    name: Some("Annex".to_string()),
                    address: None,
                },
                &rules(),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(store.name, "Annex");
        assert_eq!(store.address.as_deref(), Some("1 High St"));
    }

    #[test]
    fn invalid_patch_leaves_category_untouched() {
        let mut category = Category::create(
            NewCategory {
                tenant_id: TenantId::new(),
                name: "Tools".to_string(),
                description: None,
            },
            &rules(),
            Utc::now(),
        )
        .unwrap();
        let before = category.clone();

        let err = category
            .apply_patch(
                CategoryPatch {
                    name: Some("x".repeat(11)),
                    description: Some(Some("ok".to_string())),
                },
                &rules(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(category, before);
    }

    #[test]
    fn product_rejects_negative_price_and_drops_empty_sku() {
        let draft = NewProduct {
            tenant_id: TenantId::new(),
            store_id: StoreId::new(),
            category_id: CategoryId::new(),
            name: "Bolt".to_string(),
            description: None,
            sku: Some(String::new()),
            price: Some(-1.0),
        };
        assert!(Product::create(draft.clone(), &rules(), Utc::now()).is_err());

        let product = Product::create(
            NewProduct {
                price: Some(2.5),
                ..draft
            },
            &rules(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(product.sku, None);
    }

    #[test]
    fn product_filter_combines_store_and_category() {
        let product = Product::create(
            NewProduct {
                tenant_id: TenantId::new(),
                store_id: StoreId::new(),
                category_id: CategoryId::new(),
                name: "Nut".to_string(),
                description: None,
                sku: None,
                price: None,
            },
            &rules(),
            Utc::now(),
        )
        .unwrap();

        assert!(ProductFilter::default().matches(&product));
        assert!(
            ProductFilter {
                store_id: Some(product.store_id),
                category_id: Some(product.category_id),
            }
            .matches(&product)
        );
        assert!(
            !ProductFilter {
                store_id: Some(product.store_id),
                category_id: Some(CategoryId::new()),
            }
            .matches(&product)
        );
    }
}
