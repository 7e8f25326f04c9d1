pub mod company;
pub mod order;
pub mod party;
pub mod product;
pub mod purchase;
pub mod sale;

pub use company::Company;
pub use order::{OrderHeader, OrderItem};
pub use party::{Party, PartyType};
pub use product::Product;
pub use purchase::{Purchase, PurchaseItem};
pub use sale::{PaymentStatus, Sale, SaleItem, SalePayment};
