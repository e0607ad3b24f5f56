//! Application services: validation, orchestration and logging on top of the
//! repository traits. Handlers call these; they never touch repositories.

use std::sync::Arc;

use motico_inventory::NameRules;

use crate::config::{AppConfig, PaginationConfig};
use crate::repository::InventoryDatabase;

pub mod catalog;
pub mod stock_ledger;
pub mod transfers;

pub use catalog::{CategoryCatalog, ProductCatalog, StoreCatalog};
pub use stock_ledger::StockLedger;
pub use transfers::TransferOrchestrator;

/// Every service, wired against one backend.
#[derive(Clone)]
pub struct InventoryServices {
    pub stores: StoreCatalog,
    pub categories: CategoryCatalog,
    pub products: ProductCatalog,
    pub stock: StockLedger,
    pub transfers: TransferOrchestrator,
}

impl InventoryServices {
    pub fn new<D: InventoryDatabase>(
        db: Arc<D>,
        rules: NameRules,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            stores: StoreCatalog::new(db.clone(), rules, pagination),
            categories: CategoryCatalog::new(db.clone(), rules, pagination),
            products: ProductCatalog::new(db.clone(), db.clone(), db.clone(), rules, pagination),
            stock: StockLedger::new(db.clone()),
            transfers: TransferOrchestrator::new(db.clone(), db.clone(), db, pagination),
        }
    }

    pub fn from_config<D: InventoryDatabase>(db: Arc<D>, config: &AppConfig) -> Self {
        Self::new(db, config.name_rules(), config.pagination)
    }
}
