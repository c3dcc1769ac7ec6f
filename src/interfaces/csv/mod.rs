//! CSV seed input and CSV/JSON result output.

pub mod seed_reader;
pub mod writer;
