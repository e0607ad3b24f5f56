use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use motico_core::{CategoryId, ProductId, StoreId};
use motico_infra::InventoryServices;
use motico_inventory::{NewProduct, ProductFilter, ProductPatch};

use crate::app::routes::stock;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product)
                .put(update_product)
                .patch(patch_product)
                .delete(delete_product),
        )
        .route(
            "/:id/stock",
            get(stock::get_stock)
                .put(stock::set_stock)
                .patch(stock::adjust_stock),
        )
}

pub async fn create_product(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let store_id: StoreId = match errors::parse_id(&body.store_id, "store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let category_id: CategoryId = match errors::parse_id(&body.category_id, "category") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let draft = NewProduct {
        tenant_id: tenant.tenant_id(),
        store_id,
        category_id,
        name: body.name,
        description: body.description,
        sku: body.sku,
        price: body.price,
    };
    match services.products.create(draft).await {
        Ok(product) => (
            StatusCode::CREATED,
            Json(dto::product_to_json(product, None)),
        )
            .into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(q): Query<dto::ProductQuery>,
) -> axum::response::Response {
    let filter = match (
        errors::parse_optional_id(q.store_id.as_deref(), "store"),
        errors::parse_optional_id(q.category_id.as_deref(), "category"),
    ) {
        (Ok(store_id), Ok(category_id)) => ProductFilter {
            store_id,
            category_id,
        },
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    match services
        .products
        .list(tenant.tenant_id(), filter, q.page, q.limit)
        .await
    {
        Ok(page) => Json(dto::page_to_json(page, dto::product_with_stock_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.products.get(tenant.tenant_id(), id).await {
        Ok(p) => Json(dto::product_with_stock_to_json(p)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// Full replacement: omitted optional fields are cleared.
pub async fn update_product(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let patch = dto::PatchProductRequest {
        store_id: Some(body.store_id),
        category_id: Some(body.category_id),
        name: Some(body.name),
        description: Some(body.description),
        sku: Some(body.sku),
        price: Some(body.price),
    };
    apply_patch(services, tenant, id, patch).await
}

pub async fn patch_product(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PatchProductRequest>,
) -> axum::response::Response {
    apply_patch(services, tenant, id, body).await
}

async fn apply_patch(
    services: Arc<InventoryServices>,
    tenant: TenantContext,
    id: String,
    body: dto::PatchProductRequest,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store_id = match errors::parse_optional_id(body.store_id.as_deref(), "store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let category_id = match errors::parse_optional_id(body.category_id.as_deref(), "category") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let patch = ProductPatch {
        store_id,
        category_id,
        name: body.name,
        description: body.description,
        sku: body.sku,
        price: body.price,
    };
    match services.products.update(tenant.tenant_id(), id, patch).await {
        Ok(p) => Json(dto::product_with_stock_to_json(p)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.products.delete(tenant.tenant_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
