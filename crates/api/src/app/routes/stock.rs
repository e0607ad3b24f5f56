//! Stock endpoints, mounted under `/products/:id/stock`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};

use motico_core::{DomainError, ProductId, TenantId};
use motico_infra::InventoryServices;

use crate::app::{dto, errors};
use crate::context::TenantContext;

/// The product must exist in this tenant before its stock can be touched.
async fn resolve_product(
    services: &InventoryServices,
    tenant_id: TenantId,
    raw: &str,
) -> Result<ProductId, axum::response::Response> {
    let id: ProductId = errors::parse_id(raw, "product")?;
    services
        .products
        .get(tenant_id, id)
        .await
        .map(|p| p.product.id)
        .map_err(errors::inventory_error_to_response)
}

pub async fn get_stock(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.stock.get_by_product(tenant.tenant_id(), id).await {
        Ok(stock) => Json(dto::stock_to_json(stock)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn set_stock(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetStockRequest>,
) -> axum::response::Response {
    if body.quantity < 0 {
        return errors::domain_error_to_response(DomainError::InvalidQuantity);
    }
    let id = match resolve_product(&services, tenant.tenant_id(), &id).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .stock
        .set_quantity(tenant.tenant_id(), id, body.quantity)
        .await
    {
        Ok(stock) => Json(dto::stock_to_json(stock)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let id = match resolve_product(&services, tenant.tenant_id(), &id).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .stock
        .adjust_quantity(tenant.tenant_id(), id, body.amount)
        .await
    {
        Ok(stock) => Json(dto::stock_to_json(stock)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
