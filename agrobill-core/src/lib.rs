//! Multi-tenant billing and inventory core: per-company purchase and sale
//! documents, stock reconciliation and party dues over PostgreSQL.

pub mod app;
pub mod auth;
pub mod calc;
pub mod companies;
pub mod config;
pub mod db;
pub mod error;
pub mod inventory;
pub mod json;
pub mod ledger;
pub mod models;
pub mod orders;
pub mod parties;
pub mod products;
pub mod purchases;
pub mod reconcile;
pub mod sales;
pub mod tenant;
pub mod validation;

#[cfg(test)]
mod test_support;
