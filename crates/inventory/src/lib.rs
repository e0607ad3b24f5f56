//! Inventory domain module.
//!
//! This crate contains business rules for stock levels, inter-store transfers
//! and the catalog entities they reference, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod catalog;
pub mod stock;
pub mod transfer;

pub use catalog::{
    Category, CategoryPatch, NameRules, NewCategory, NewProduct, NewStore, Product, ProductFilter,
    ProductPatch, ProductWithStock, Store, StorePatch,
};
pub use stock::{Stock, StockSummary};
pub use transfer::{
    NewTransfer, Transfer, TransferFilter, TransferPatch, TransferStatus, TransferTransition,
};
