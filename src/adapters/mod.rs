//! Concrete implementations of the ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod log_notifier;
pub mod memory_ledger;
pub mod paper_broker;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
