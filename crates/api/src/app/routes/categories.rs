use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use motico_core::CategoryId;
use motico_infra::InventoryServices;
use motico_inventory::{CategoryPatch, NewCategory};

use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category)
                .put(update_category)
                .patch(patch_category)
                .delete(delete_category),
        )
}

pub async fn create_category(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> axum::response::Response {
    let draft = NewCategory {
        tenant_id: tenant.tenant_id(),
        name: body.name,
        description: body.description,
    };
    match services.categories.create(draft).await {
        Ok(category) => (StatusCode::CREATED, Json(dto::category_to_json(category))).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn list_categories(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(q): Query<dto::PageQuery>,
) -> axum::response::Response {
    match services.categories.list(tenant.tenant_id(), q.page, q.limit).await {
        Ok(page) => Json(dto::page_to_json(page, dto::category_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_category(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CategoryId = match errors::parse_id(&id, "category") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.categories.get(tenant.tenant_id(), id).await {
        Ok(category) => Json(dto::category_to_json(category)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// Full replacement: an omitted description is cleared.
pub async fn update_category(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> axum::response::Response {
    let patch = CategoryPatch {
        name: Some(body.name),
        description: Some(body.description),
    };
    apply_patch(services, tenant, id, patch).await
}

pub async fn patch_category(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PatchCategoryRequest>,
) -> axum::response::Response {
    let patch = CategoryPatch {
        name: body.name,
        description: body.description,
    };
    apply_patch(services, tenant, id, patch).await
}

async fn apply_patch(
    services: Arc<InventoryServices>,
    tenant: TenantContext,
    id: String,
    patch: CategoryPatch,
) -> axum::response::Response {
    let id: CategoryId = match errors::parse_id(&id, "category") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.categories.update(tenant.tenant_id(), id, patch).await {
        Ok(category) => Json(dto::category_to_json(category)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn delete_category(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CategoryId = match errors::parse_id(&id, "category") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.categories.delete(tenant.tenant_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
