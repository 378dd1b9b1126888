//! Command implementations.

pub mod delete;
pub mod summary;
pub mod transfer;
pub mod tree;
