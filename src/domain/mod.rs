//! Domain layer: plain marketplace records, money value objects and the
//! store ports the application layer is written against.

pub mod contract;
pub mod dataset;
pub mod job;
pub mod money;
pub mod ports;
pub mod profile;
pub mod report;
