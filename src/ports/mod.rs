//! Capability traits the engine consumes. Implementations are chosen at
//! construction time and injected.

pub mod broker_port;
pub mod config_port;
pub mod ledger_port;
pub mod notify_port;
pub mod price_port;
pub mod rule_port;
