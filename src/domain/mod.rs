//! Core domain types and logic.

pub mod error;
pub mod price_bar;
pub mod indicator;
pub mod condition;
pub mod rationale;
pub mod ai_score;
pub mod decision;
pub mod order;
pub mod position;
pub mod portfolio;
pub mod risk;
pub mod settings;
pub mod settlement;
pub mod trade_engine;
pub mod scheduler;
