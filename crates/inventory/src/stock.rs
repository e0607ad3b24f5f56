use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motico_core::{DomainError, DomainResult, Entity, ProductId, StockId, TenantId};

/// On-hand and reserved quantity of one product within a tenant.
///
/// Invariant: `0 <= reserved_quantity <= quantity` after every successful
/// mutation. All mutations go through the methods below; storage adapters
/// load a row, call one of them, and persist the result atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quantity triple embedded in product responses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub available_quantity: i64,
}

impl Stock {
    /// Create a fresh stock row with nothing reserved.
    pub fn new(
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::InvalidQuantity);
        }
        Ok(Self {
            id: StockId::new(),
            tenant_id,
            product_id,
            quantity,
            reserved_quantity: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Create the row an adjustment implies when none exists yet.
    ///
    /// Removing units from a product that has never had stock is an
    /// `InsufficientStock` failure, not an implicit zero row.
    pub fn from_first_adjustment(
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if delta < 0 {
            return Err(DomainError::InsufficientStock);
        }
        Self::new(tenant_id, product_id, delta, now)
    }

    /// `max(0, quantity - reserved_quantity)`.
    pub fn available(&self) -> i64 {
        (self.quantity - self.reserved_quantity).max(0)
    }

    pub fn summary(&self) -> StockSummary {
        StockSummary {
            quantity: self.quantity,
            reserved_quantity: self.reserved_quantity,
            available_quantity: self.available(),
        }
    }

    /// Overwrite the total quantity.
    ///
    /// Total cannot shrink below what is already promised to pending transfers.
    pub fn set_quantity(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity < 0 {
            return Err(DomainError::InvalidQuantity);
        }
        if quantity < self.reserved_quantity {
            return Err(DomainError::InvalidReservedAmount);
        }
        self.quantity = quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a signed delta to the total quantity.
    pub fn adjust(&mut self, delta: i64, now: DateTime<Utc>) -> DomainResult<()> {
        let new_quantity = self
            .quantity
            .checked_add(delta)
            .ok_or(DomainError::InvalidQuantity)?;
        if new_quantity < 0 {
            return Err(DomainError::InsufficientStock);
        }
        if new_quantity < self.reserved_quantity {
            return Err(DomainError::InvalidReservedAmount);
        }
        self.quantity = new_quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Promise `amount` units to a pending transfer.
    pub fn reserve(&mut self, amount: i64, now: DateTime<Utc>) -> DomainResult<()> {
        ensure_positive(amount)?;
        if self.available() < amount {
            return Err(DomainError::InsufficientStock);
        }
        self.reserved_quantity += amount;
        self.updated_at = now;
        Ok(())
    }

    /// Return `amount` reserved units to the available pool, floored at zero.
    pub fn release(&mut self, amount: i64, now: DateTime<Utc>) -> DomainResult<()> {
        ensure_positive(amount)?;
        self.reserved_quantity = (self.reserved_quantity - amount).max(0);
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Stock {
    type Id = StockId;

    fn id(&self) -> StockId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Reject zero/negative reserve and release amounts.
pub fn ensure_positive(amount: i64) -> DomainResult<()> {
    if amount <= 0 {
        return Err(DomainError::InvalidQuantity);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_stock(quantity: i64, reserved: i64) -> Stock {
        let mut stock = Stock::new(TenantId::new(), ProductId::new(), quantity, Utc::now()).unwrap();
        stock.reserved_quantity = reserved;
        stock
    }

    #[test]
    fn new_rejects_negative_quantity() {
        let err = Stock::new(TenantId::new(), ProductId::new(), -1, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::InvalidQuantity);
    }

    #[test]
    fn available_is_floored_at_zero() {
        let stock = test_stock(5, 8);
        assert_eq!(stock.available(), 0);
        assert_eq!(test_stock(10, 3).available(), 7);
    }

    #[test]
    fn set_quantity_below_reserved_is_rejected_and_leaves_stock_unchanged() {
        let mut stock = test_stock(10, 8);
        let before = stock.clone();

        let err = stock.set_quantity(5, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::InvalidReservedAmount);
        assert_eq!(stock, before);
    }

    #[test]
    fn set_quantity_rejects_negative() {
        let mut stock = test_stock(10, 0);
        assert_eq!(stock.set_quantity(-1, Utc::now()).unwrap_err(), DomainError::InvalidQuantity);
    }

    #[test]
    fn adjust_below_zero_is_insufficient_stock() {
        let mut stock = test_stock(10, 0);
        let before = stock.clone();

        let err = stock.adjust(-20, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::InsufficientStock);
        assert_eq!(stock, before);
    }

    #[test]
    fn adjust_below_reserved_is_invalid_reserved_amount() {
        let mut stock = test_stock(10, 6);
        let err = stock.adjust(-5, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::InvalidReservedAmount);
        assert_eq!(stock.quantity, 10);
    }

    #[test]
    fn first_adjustment_must_not_remove_units() {
        let err = Stock::from_first_adjustment(TenantId::new(), ProductId::new(), -1, Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::InsufficientStock);

        let stock =
            Stock::from_first_adjustment(TenantId::new(), ProductId::new(), 4, Utc::now()).unwrap();
        assert_eq!(stock.quantity, 4);
        assert_eq!(stock.reserved_quantity, 0);
    }

    #[test]
    fn reserve_requires_positive_amount() {
        let mut stock = test_stock(10, 0);
        assert_eq!(stock.reserve(0, Utc::now()).unwrap_err(), DomainError::InvalidQuantity);
        assert_eq!(stock.release(-3, Utc::now()).unwrap_err(), DomainError::InvalidQuantity);
    }

    #[test]
    fn reserve_beyond_available_is_rejected() {
        let mut stock = test_stock(10, 7);
        assert_eq!(stock.reserve(4, Utc::now()).unwrap_err(), DomainError::InsufficientStock);
        assert_eq!(stock.reserved_quantity, 7);

        stock.reserve(3, Utc::now()).unwrap();
        assert_eq!(stock.reserved_quantity, 10);
        assert_eq!(stock.available(), 0);
    }

    #[test]
    fn reserve_then_release_restores_reserved() {
        let mut stock = test_stock(10, 2);
        stock.reserve(5, Utc::now()).unwrap();
        stock.release(5, Utc::now()).unwrap();
        assert_eq!(stock.reserved_quantity, 2);
    }

    #[test]
    fn release_is_floored_at_zero() {
        let mut stock = test_stock(10, 3);
        stock.release(5, Utc::now()).unwrap();
        assert_eq!(stock.reserved_quantity, 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(i64),
        Adjust(i64),
        Reserve(i64),
        Release(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-10i64..200).prop_map(Op::Set),
            (-100i64..100).prop_map(Op::Adjust),
            (-5i64..60).prop_map(Op::Reserve),
            (-5i64..60).prop_map(Op::Release),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: no sequence of operations (successful or rejected) can
        /// break `0 <= reserved <= quantity`, and rejected operations leave
        /// the row untouched.
        #[test]
        fn reserved_never_exceeds_quantity(
            initial in 0i64..200,
            ops in prop::collection::vec(op_strategy(), 1..40)
        ) {
            let mut stock = test_stock(initial, 0);

            for op in ops {
                let before = stock.clone();
                let now = Utc::now();
                let result = match op {
                    Op::Set(q) => stock.set_quantity(q, now),
                    Op::Adjust(d) => stock.adjust(d, now),
                    Op::Reserve(a) => stock.reserve(a, now),
                    Op::Release(a) => stock.release(a, now),
                };

                if result.is_err() {
                    prop_assert_eq!(&stock, &before);
                }
                prop_assert!(stock.reserved_quantity >= 0);
                prop_assert!(stock.reserved_quantity <= stock.quantity);
                prop_assert_eq!(stock.available(), stock.quantity - stock.reserved_quantity);
            }
        }
    }
}
