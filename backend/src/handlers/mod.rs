//! HTTP handlers for the Distribution Management Platform

pub mod auth;
pub mod dashboard;
pub mod distributor;
pub mod geography;
pub mod health;
pub mod inventory;
pub mod lookup;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod user;
pub mod vendor;
pub mod visit;

pub use auth::*;
pub use dashboard::*;
pub use distributor::*;
pub use geography::*;
pub use health::*;
pub use inventory::*;
pub use lookup::*;
pub use product::*;
pub use purchase::*;
pub use sale::*;
pub use user::*;
pub use vendor::*;
pub use visit::*;
