use serde::{Deserialize, Deserializer};

use motico_infra::Page;
use motico_inventory::{Category, Product, ProductWithStock, Stock, StockSummary, Store, Transfer};

// -------------------------
// Request DTOs
// -------------------------

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) so PATCH can clear optional columns.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchStoreRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchCategoryRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub store_id: Option<String>,
    pub category_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub store_id: String,
    pub category_id: String,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PatchProductRequest {
    pub store_id: Option<String>,
    pub category_id: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sku: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub price: Option<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub status: Option<String>,
    pub store_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub product_id: String,
    pub from_store_id: String,
    pub to_store_id: String,
    pub quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransferRequest {
    pub product_id: Option<String>,
    pub from_store_id: Option<String>,
    pub to_store_id: Option<String>,
    pub quantity: Option<i64>,
    pub notes: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn page_to_json<T>(page: Page<T>, item: impl Fn(T) -> serde_json::Value) -> serde_json::Value {
    let total_pages = page.total_pages();
    let Page {
        items,
        total,
        request,
    } = page;
    serde_json::json!({
        "data": items.into_iter().map(item).collect::<Vec<_>>(),
        "pagination": {
            "page": request.page,
            "limit": request.limit,
            "total": total,
            "total_pages": total_pages,
        }
    })
}

pub fn store_to_json(s: Store) -> serde_json::Value {
    serde_json::json!({
        "id": s.id.to_string(),
        "tenant_id": s.tenant_id.to_string(),
        "name": s.name,
        "address": s.address,
        "created_at": s.created_at.to_rfc3339(),
        "updated_at": s.updated_at.to_rfc3339(),
    })
}

pub fn category_to_json(c: Category) -> serde_json::Value {
    serde_json::json!({
        "id": c.id.to_string(),
        "tenant_id": c.tenant_id.to_string(),
        "name": c.name,
        "description": c.description,
        "created_at": c.created_at.to_rfc3339(),
        "updated_at": c.updated_at.to_rfc3339(),
    })
}

fn summary_to_json(s: StockSummary) -> serde_json::Value {
    serde_json::json!({
        "quantity": s.quantity,
        "reserved_quantity": s.reserved_quantity,
        "available_quantity": s.available_quantity,
    })
}

pub fn product_to_json(p: Product, stock: Option<StockSummary>) -> serde_json::Value {
    serde_json::json!({
        "id": p.id.to_string(),
        "tenant_id": p.tenant_id.to_string(),
        "store_id": p.store_id.to_string(),
        "category_id": p.category_id.to_string(),
        "name": p.name,
        "description": p.description,
        "sku": p.sku,
        "price": p.price,
        "stock": stock.map(summary_to_json),
        "created_at": p.created_at.to_rfc3339(),
        "updated_at": p.updated_at.to_rfc3339(),
    })
}

pub fn product_with_stock_to_json(p: ProductWithStock) -> serde_json::Value {
    product_to_json(p.product, p.stock)
}

pub fn stock_to_json(s: Stock) -> serde_json::Value {
    serde_json::json!({
        "id": s.id.to_string(),
        "product_id": s.product_id.to_string(),
        "quantity": s.quantity,
        "reserved_quantity": s.reserved_quantity,
        "available_quantity": s.available(),
        "updated_at": s.updated_at.to_rfc3339(),
    })
}

pub fn transfer_to_json(t: Transfer) -> serde_json::Value {
    serde_json::json!({
        "id": t.id.to_string(),
        "tenant_id": t.tenant_id.to_string(),
        "product_id": t.product_id.to_string(),
        "from_store_id": t.from_store_id.to_string(),
        "to_store_id": t.to_store_id.to_string(),
        "quantity": t.quantity,
        "status": t.status.as_str(),
        "notes": t.notes,
        "created_at": t.created_at.to_rfc3339(),
        "updated_at": t.updated_at.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let absent: PatchStoreRequest = serde_json::from_str(r#"{"name":"A"}"#).unwrap();
        assert_eq!(absent.address, None);

        let cleared: PatchStoreRequest = serde_json::from_str(r#"{"address":null}"#).unwrap();
        assert_eq!(cleared.address, Some(None));

        let set: PatchStoreRequest = serde_json::from_str(r#"{"address":"1 Main"}"#).unwrap();
        assert_eq!(set.address, Some(Some("1 Main".to_string())));
    }
}
