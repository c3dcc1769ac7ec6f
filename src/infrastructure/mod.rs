//! Store adapters implementing the domain ports.
//!
//! Both backends stage writes in a [`changeset::Changeset`] and apply them in
//! one step on commit.

pub mod changeset;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
