use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use motico_core::StoreId;
use motico_infra::InventoryServices;
use motico_inventory::{NewStore, StorePatch};

use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stores).post(create_store))
        .route(
            "/:id",
            get(get_store)
                .put(update_store)
                .patch(patch_store)
                .delete(delete_store),
        )
}

pub async fn create_store(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateStoreRequest>,
) -> axum::response::Response {
    let draft = NewStore {
        tenant_id: tenant.tenant_id(),
        name: body.name,
        address: body.address,
    };
    match services.stores.create(draft).await {
        Ok(store) => (StatusCode::CREATED, Json(dto::store_to_json(store))).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn list_stores(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(q): Query<dto::PageQuery>,
) -> axum::response::Response {
    match services.stores.list(tenant.tenant_id(), q.page, q.limit).await {
        Ok(page) => Json(dto::page_to_json(page, dto::store_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_store(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: StoreId = match errors::parse_id(&id, "store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.stores.get(tenant.tenant_id(), id).await {
        Ok(store) => Json(dto::store_to_json(store)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// Full replacement: an omitted address is cleared.
pub async fn update_store(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateStoreRequest>,
) -> axum::response::Response {
    let patch = StorePatch {
        name: Some(body.name),
        address: Some(body.address),
    };
    apply_patch(services, tenant, id, patch).await
}

pub async fn patch_store(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PatchStoreRequest>,
) -> axum::response::Response {
    let patch = StorePatch {
        name: body.name,
        address: body.address,
    };
    apply_patch(services, tenant, id, patch).await
}

async fn apply_patch(
    services: Arc<InventoryServices>,
    tenant: TenantContext,
    id: String,
    patch: StorePatch,
) -> axum::response::Response {
    let id: StoreId = match errors::parse_id(&id, "store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.stores.update(tenant.tenant_id(), id, patch).await {
        Ok(store) => Json(dto::store_to_json(store)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn delete_store(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: StoreId = match errors::parse_id(&id, "store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.stores.delete(tenant.tenant_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
