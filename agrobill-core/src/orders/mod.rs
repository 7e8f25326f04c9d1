pub mod handlers;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use service::{create_order, delete_order, get_order, list_orders, order_invoice, update_order};
pub use types::OrderKind;
