pub mod handlers;
pub mod service;

pub use service::{party_due, party_totals, DueTotals, PartyDue};
