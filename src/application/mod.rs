//! Application layer orchestrating the marketplace use cases.
//!
//! [`engine::MarketplaceEngine`] is the single entry point. Its operations are
//! split by concern: lookups and imports in `engine`, balance-moving operations
//! in `payment`, and read-only aggregations in `reports`.

pub mod engine;
pub mod payment;
pub mod reports;
