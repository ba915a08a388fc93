//! Shared domain types for the Distribution Management Platform
//!
//! This crate holds the I/O-free core used by the backend: models and
//! enums, the stock reconciliation planner, row-level scoping, the sales
//! calendar and input validation.

pub mod calendar;
pub mod models;
pub mod scope;
pub mod stock;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
