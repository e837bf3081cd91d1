//! Command implementations.

pub mod info;
pub mod languages;
pub mod recognize;
