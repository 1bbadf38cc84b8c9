//! Access Strategy Module
//!
//! Read/write coherence policies layered over a store and its lock table.

mod policy;
mod strategy;

#[cfg(test)]
mod property_tests;

pub use policy::{AccessType, Policy};
pub use strategy::AccessStrategy;
