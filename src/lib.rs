//! tradefuse: signal fusion and position risk engine.
//!
//! Hexagonal architecture: domain logic in [`domain`], capability traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
