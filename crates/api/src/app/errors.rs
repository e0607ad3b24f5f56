use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use motico_core::DomainError;
use motico_infra::InventoryError;

pub fn inventory_error_to_response(err: InventoryError) -> axum::response::Response {
    match err {
        InventoryError::Domain(e) => domain_error_to_response(e),
        InventoryError::Storage { .. } => {
            tracing::error!(error = %err, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "internal storage error",
            )
        }
        InventoryError::Unavailable { .. } => {
            tracing::error!(error = %err, "storage unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "storage temporarily unavailable",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    tracing::debug!(error = %err, "request rejected");
    let message = err.to_string();
    match err {
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::InvalidQuantity => {
            json_error(StatusCode::BAD_REQUEST, "invalid_quantity", message)
        }
        DomainError::InvalidReservedAmount => {
            json_error(StatusCode::BAD_REQUEST, "invalid_reserved_amount", message)
        }
        DomainError::InvalidTransferStores => {
            json_error(StatusCode::BAD_REQUEST, "invalid_transfer_stores", message)
        }
        DomainError::TransferNotPending => {
            json_error(StatusCode::BAD_REQUEST, "transfer_not_pending", message)
        }
        DomainError::TransferAlreadyCompleted => {
            json_error(StatusCode::BAD_REQUEST, "transfer_already_completed", message)
        }
        DomainError::TransferAlreadyCancelled => {
            json_error(StatusCode::BAD_REQUEST, "transfer_already_cancelled", message)
        }
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::InsufficientStock => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or query id, answering 400 `invalid_id` on failure.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

pub fn parse_optional_id<T: FromStr>(
    raw: Option<&str>,
    what: &str,
) -> Result<Option<T>, axum::response::Response> {
    raw.map(|v| parse_id(v, what)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_business_errors_to_statuses() {
        let cases = [
            (DomainError::not_found("transfer"), StatusCode::NOT_FOUND),
            (DomainError::InvalidQuantity, StatusCode::BAD_REQUEST),
            (DomainError::TransferAlreadyCancelled, StatusCode::BAD_REQUEST),
            (DomainError::InsufficientStock, StatusCode::CONFLICT),
            (DomainError::conflict("taken"), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let resp = inventory_error_to_response(InventoryError::unavailable("get_stock", "timeout"));
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let resp = inventory_error_to_response(InventoryError::storage("get_stock", "boom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
