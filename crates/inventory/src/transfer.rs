use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motico_core::{DomainError, DomainResult, Entity, ProductId, StoreId, TenantId, TransferId};

/// Transfer lifecycle status.
///
/// `Pending -> Completed` and `Pending -> Cancelled`; both targets are terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "completed" => Ok(TransferStatus::Completed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown transfer status '{other}' (expected pending, completed or cancelled)"
            ))),
        }
    }
}

/// A request to move `quantity` units of one product between two stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub from_store_id: StoreId,
    pub to_store_id: StoreId,
    pub quantity: i64,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for opening a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub from_store_id: StoreId,
    pub to_store_id: StoreId,
    pub quantity: i64,
    pub notes: Option<String>,
}

impl NewTransfer {
    /// Checks that need no lookups. Store identity is checked before quantity.
    pub fn validate(&self) -> DomainResult<()> {
        if self.from_store_id == self.to_store_id {
            return Err(DomainError::InvalidTransferStores);
        }
        if self.quantity <= 0 {
            return Err(DomainError::InvalidQuantity);
        }
        Ok(())
    }
}

/// Optional field changes for a pending transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPatch {
    pub product_id: Option<ProductId>,
    pub from_store_id: Option<StoreId>,
    pub to_store_id: Option<StoreId>,
    pub quantity: Option<i64>,
    pub notes: Option<String>,
}

impl TransferPatch {
    /// The `(from, to)` pair the transfer would have after this patch, if the
    /// patch touches either store. `None` means no store lookup is needed.
    pub fn store_pair(&self, current: &Transfer) -> Option<(StoreId, StoreId)> {
        if self.from_store_id.is_none() && self.to_store_id.is_none() {
            return None;
        }
        Some((
            self.from_store_id.unwrap_or(current.from_store_id),
            self.to_store_id.unwrap_or(current.to_store_id),
        ))
    }
}

/// Terminal transition requested for a transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferTransition {
    Complete,
    Cancel,
}

impl TransferTransition {
    pub fn target(&self) -> TransferStatus {
        match self {
            TransferTransition::Complete => TransferStatus::Completed,
            TransferTransition::Cancel => TransferStatus::Cancelled,
        }
    }

    pub fn apply(&self, transfer: &mut Transfer, now: DateTime<Utc>) -> DomainResult<()> {
        match self {
            TransferTransition::Complete => transfer.complete(now),
            TransferTransition::Cancel => transfer.cancel(now),
        }
    }
}

/// List filter. `store_id` matches either side of the transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub store_id: Option<StoreId>,
}

impl TransferFilter {
    pub fn matches(&self, transfer: &Transfer) -> bool {
        if let Some(status) = self.status {
            if transfer.status != status {
                return false;
            }
        }
        if let Some(store_id) = self.store_id {
            if transfer.from_store_id != store_id && transfer.to_store_id != store_id {
                return false;
            }
        }
        true
    }
}

impl Transfer {
    /// Open a pending transfer. The caller is responsible for reserving
    /// `quantity` in the same atomic unit that persists it.
    pub fn open(draft: NewTransfer, now: DateTime<Utc>) -> DomainResult<Self> {
        draft.validate()?;
        Ok(Self {
            id: TransferId::new(),
            tenant_id: draft.tenant_id,
            product_id: draft.product_id,
            from_store_id: draft.from_store_id,
            to_store_id: draft.to_store_id,
            quantity: draft.quantity,
            status: TransferStatus::Pending,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }

    /// Guard for update and delete.
    pub fn ensure_pending(&self) -> DomainResult<()> {
        if !self.is_pending() {
            return Err(DomainError::TransferNotPending);
        }
        Ok(())
    }

    /// Guard for complete and cancel.
    fn ensure_not_terminal(&self) -> DomainResult<()> {
        match self.status {
            TransferStatus::Pending => Ok(()),
            TransferStatus::Completed => Err(DomainError::TransferAlreadyCompleted),
            TransferStatus::Cancelled => Err(DomainError::TransferAlreadyCancelled),
        }
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_terminal()?;
        self.status = TransferStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_terminal()?;
        self.status = TransferStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Merge a patch into a pending transfer.
    ///
    /// Store ownership of a changed pair is validated by the caller before
    /// this runs. `from != to` is checked last, against the merged pair.
    /// On error the transfer is left untouched.
    pub fn apply_patch(&mut self, patch: &TransferPatch, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending()?;

        let mut next = self.clone();
        if let Some(product_id) = patch.product_id {
            next.product_id = product_id;
        }
        if let Some(from) = patch.from_store_id {
            next.from_store_id = from;
        }
        if let Some(to) = patch.to_store_id {
            next.to_store_id = to;
        }
        if let Some(quantity) = patch.quantity {
            if quantity <= 0 {
                return Err(DomainError::InvalidQuantity);
            }
            next.quantity = quantity;
        }
        if let Some(notes) = &patch.notes {
            next.notes = Some(notes.clone());
        }
        if next.from_store_id == next.to_store_id {
            return Err(DomainError::InvalidTransferStores);
        }

        next.updated_at = now;
        *self = next;
        Ok(())
    }
}

impl Entity for Transfer {
    type Id = TransferId;

    fn id(&self) -> TransferId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_draft(quantity: i64) -> NewTransfer {
        NewTransfer {
            tenant_id: TenantId::new(),
            product_id: ProductId::new(),
            from_store_id: StoreId::new(),
            to_store_id: StoreId::new(),
            quantity,
            notes: None,
        }
    }

    fn test_transfer() -> Transfer {
        Transfer::open(test_draft(5), Utc::now()).unwrap()
    }

    #[test]
    fn open_creates_pending_transfer() {
        let transfer = test_transfer();
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.quantity, 5);
    }

    #[test]
    fn same_store_is_checked_before_quantity() {
        let mut draft = test_draft(0);
        draft.to_store_id = draft.from_store_id;
        assert_eq!(draft.validate().unwrap_err(), DomainError::InvalidTransferStores);
    }

    #[test]
    fn open_rejects_non_positive_quantity() {
        let err = Transfer::open(test_draft(0), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::InvalidQuantity);
    }

    #[test]
    fn complete_then_cancel_reports_already_completed() {
        let mut transfer = test_transfer();
        transfer.complete(Utc::now()).unwrap();

        assert_eq!(transfer.cancel(Utc::now()).unwrap_err(), DomainError::TransferAlreadyCompleted);
        assert_eq!(transfer.complete(Utc::now()).unwrap_err(), DomainError::TransferAlreadyCompleted);
        assert_eq!(transfer.status, TransferStatus::Completed);
    }

    #[test]
    fn cancelled_transfer_rejects_everything() {
        let mut transfer = test_transfer();
        transfer.cancel(Utc::now()).unwrap();

        assert_eq!(transfer.complete(Utc::now()).unwrap_err(), DomainError::TransferAlreadyCancelled);
        assert_eq!(transfer.cancel(Utc::now()).unwrap_err(), DomainError::TransferAlreadyCancelled);
        let patch = TransferPatch {
            quantity: Some(1),
            ..TransferPatch::default()
        };
        assert_eq!(
            transfer.apply_patch(&patch, Utc::now()).unwrap_err(),
            DomainError::TransferNotPending
        );
        assert_eq!(transfer.status, TransferStatus::Cancelled);
    }

    #[test]
    fn patch_changing_only_to_store_is_checked_against_resulting_pair() {
        let mut transfer = test_transfer();
        let before = transfer.clone();
        let patch = TransferPatch {
            to_store_id: Some(transfer.from_store_id),
            ..TransferPatch::default()
        };

        assert_eq!(
            patch.store_pair(&transfer),
            Some((transfer.from_store_id, transfer.from_store_id))
        );
        let err = transfer.apply_patch(&patch, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::InvalidTransferStores);
        assert_eq!(transfer, before);
    }

    #[test]
    fn patch_swapping_both_stores_is_allowed() {
        let mut transfer = test_transfer();
        let (from, to) = (transfer.from_store_id, transfer.to_store_id);
        let patch = TransferPatch {
            from_store_id: Some(to),
            to_store_id: Some(from),
            notes: Some("swap".to_string()),
            ..TransferPatch::default()
        };

        transfer.apply_patch(&patch, Utc::now()).unwrap();
        assert_eq!(transfer.from_store_id, to);
        assert_eq!(transfer.to_store_id, from);
        assert_eq!(transfer.notes.as_deref(), Some("swap"));
    }

    #[test]
    fn patch_without_stores_needs_no_lookup() {
        let transfer = test_transfer();
        let patch = TransferPatch {
            quantity: Some(2),
            ..TransferPatch::default()
        };
        assert_eq!(patch.store_pair(&transfer), None);
    }

    #[test]
    fn patch_rejects_non_positive_quantity() {
        let mut transfer = test_transfer();
        let patch = TransferPatch {
            quantity: Some(-1),
            ..TransferPatch::default()
        };
        assert_eq!(transfer.apply_patch(&patch, Utc::now()).unwrap_err(), DomainError::InvalidQuantity);
        assert_eq!(transfer.quantity, 5);
    }

    #[test]
    fn status_parses_lowercase_names() {
        assert_eq!("completed".parse::<TransferStatus>().unwrap(), TransferStatus::Completed);
        match "done".parse::<TransferStatus>() {
            Err(DomainError::Validation(_)) => {}
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn filter_matches_either_side() {
        let transfer = test_transfer();
        let from_filter = TransferFilter {
            status: None,
            store_id: Some(transfer.from_store_id),
        };
        let to_filter = TransferFilter {
            status: Some(TransferStatus::Pending),
            store_id: Some(transfer.to_store_id),
        };
        let other = TransferFilter {
            status: None,
            store_id: Some(StoreId::new()),
        };
        assert!(from_filter.matches(&transfer));
        assert!(to_filter.matches(&transfer));
        assert!(!other.matches(&transfer));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any sequence of transitions reaches at most one terminal
        /// status and never leaves it.
        #[test]
        fn terminal_status_is_sticky(steps in prop::collection::vec(any::<bool>(), 1..10)) {
            let mut transfer = test_transfer();
            let mut terminal: Option<TransferStatus> = None;

            for complete in steps {
                let transition = if complete {
                    TransferTransition::Complete
                } else {
                    TransferTransition::Cancel
                };
                let result = transition.apply(&mut transfer, Utc::now());

                match terminal {
                    None => {
                        prop_assert!(result.is_ok());
                        prop_assert_eq!(transfer.status, transition.target());
                        terminal = Some(transfer.status);
                    }
                    Some(status) => {
                        prop_assert!(result.is_err());
                        prop_assert_eq!(transfer.status, status);
                    }
                }
            }
        }
    }
}
