pub mod handlers;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use service::{create_purchase, get_purchase, list_purchases, update_purchase};
