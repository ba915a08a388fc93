//! Business logic services for the Distribution Management Platform

pub mod auth;
pub mod dashboard;
pub mod distributor;
pub mod filters;
pub mod geography;
pub mod inventory;
pub mod lines;
pub mod lookup;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod scope;
pub mod stock;
pub mod user;
pub mod vendor;
pub mod visit;

#[cfg(test)]
pub(crate) mod fixtures;

pub use auth::AuthService;
pub use dashboard::DashboardService;
pub use distributor::DistributorService;
pub use geography::GeographyService;
pub use inventory::InventoryService;
pub use lookup::LookupService;
pub use product::ProductService;
pub use purchase::PurchaseService;
pub use sale::SaleService;
pub use scope::{AccessScope, ScopeService};
pub use stock::StockLedger;
pub use user::UserService;
pub use vendor::VendorService;
pub use visit::VisitService;
