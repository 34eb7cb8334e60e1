//! Ledger store implementations

pub mod memory;
pub mod mysql;

pub use memory::InMemoryLedgerStore;
pub use mysql::MySqlLedgerStore;
