pub mod handlers;
pub mod service;
pub mod types;


pub use service::{cancel_sale, create_sale, get_sale, list_sales, new_bill_no, record_payment, update_sale};
