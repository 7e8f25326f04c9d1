pub mod handlers;
pub mod service;

pub use service::{ensure_party_exists, resolve_party, PartyLookup};
