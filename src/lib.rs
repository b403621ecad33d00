//! Cross-model valuation and risk ensemble.
//!
//! Valuation primitives and statistical wrappers share the
//! [`registry::PricingModel`] interface. [`ensemble::EnsembleContext`]
//! combines their results per asset class, and [`portfolio`] handles
//! multi-asset allocation and simulation.

pub mod config;
pub mod ensemble;
pub mod error;
pub mod model;
pub mod numeric;
pub mod portfolio;
pub mod registry;
pub mod server;
pub mod stats;
pub mod store;
pub mod valuation;
