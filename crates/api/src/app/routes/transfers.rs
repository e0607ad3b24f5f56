use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};

use motico_core::{ProductId, StoreId, TransferId};
use motico_infra::{InventoryResult, InventoryServices};
use motico_inventory::{NewTransfer, Transfer, TransferFilter, TransferPatch, TransferStatus};

use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transfers).post(create_transfer))
        .route(
            "/:id",
            get(get_transfer).put(update_transfer).delete(delete_transfer),
        )
        .route("/:id/complete", patch(complete_transfer))
        .route("/:id/cancel", patch(cancel_transfer))
}

fn transfer_response(result: InventoryResult<Transfer>) -> axum::response::Response {
    match result {
        Ok(t) => Json(dto::transfer_to_json(t)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateTransferRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&body.product_id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let from_store_id: StoreId = match errors::parse_id(&body.from_store_id, "from_store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let to_store_id: StoreId = match errors::parse_id(&body.to_store_id, "to_store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let draft = NewTransfer {
        tenant_id: tenant.tenant_id(),
        product_id,
        from_store_id,
        to_store_id,
        quantity: body.quantity,
        notes: body.notes,
    };
    match services.transfers.create(draft).await {
        Ok(t) => (StatusCode::CREATED, Json(dto::transfer_to_json(t))).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn list_transfers(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(q): Query<dto::TransferQuery>,
) -> axum::response::Response {
    let status = match q
        .status
        .as_deref()
        .map(str::parse::<TransferStatus>)
        .transpose()
    {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let store_id = match errors::parse_optional_id(q.store_id.as_deref(), "store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let filter = TransferFilter { status, store_id };
    match services
        .transfers
        .list(tenant.tenant_id(), filter, q.page, q.limit)
        .await
    {
        Ok(page) => Json(dto::page_to_json(page, dto::transfer_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_transfer(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    transfer_response(services.transfers.get_by_id(tenant.tenant_id(), id).await)
}

pub async fn update_transfer(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateTransferRequest>,
) -> axum::response::Response {
    let id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let product_id = match errors::parse_optional_id(body.product_id.as_deref(), "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let from_store_id = match errors::parse_optional_id(body.from_store_id.as_deref(), "from_store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let to_store_id = match errors::parse_optional_id(body.to_store_id.as_deref(), "to_store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let patch = TransferPatch {
        product_id,
        from_store_id,
        to_store_id,
        quantity: body.quantity,
        notes: body.notes,
    };
    transfer_response(services.transfers.update(tenant.tenant_id(), id, patch).await)
}

pub async fn complete_transfer(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    transfer_response(services.transfers.complete(tenant.tenant_id(), id).await)
}

pub async fn cancel_transfer(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    transfer_response(services.transfers.cancel(tenant.tenant_id(), id).await)
}

pub async fn delete_transfer(
    Extension(services): Extension<Arc<InventoryServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.transfers.delete(tenant.tenant_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
