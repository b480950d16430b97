pub mod access;
#[cfg(test)]
pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

pub use access::PartyFilter;
pub use repository::LedgerRepository;
pub use store::{LedgerStore, LedgerTx, PendingObligations};
