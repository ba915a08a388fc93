//! Domain models for the Distribution Management Platform

mod inventory;
mod product;
mod transaction;
mod user;
mod visit;

pub use inventory::*;
pub use product::*;
pub use transaction::*;
pub use user::*;
pub use visit::*;
