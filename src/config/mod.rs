//! # Configuration Module
//!
//! Centralizes all tuning constants for bigarray. Constants are grouped by
//! functional area and their interdependencies are documented and enforced
//! through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The capacity-growth tiers, the mapped-file block size, and the buffer
//! capacity limits interact: a mapped storage must never round a capacity
//! below what the growth engine requested, and buffer windows must never
//! exceed what a single in-memory slice can address. Co-locating the values
//! makes those relationships reviewable in one place.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency
//!   documentation

pub mod constants;
pub use constants::*;
