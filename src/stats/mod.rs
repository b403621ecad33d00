//! Statistical and machine-learning wrappers. Every wrapper carries the
//! [`EstimatorBackend`](backend::EstimatorBackend) resolved at startup.

pub mod backend;
#[cfg(feature = "fitted")]
pub(crate) mod fitted;
pub mod garch;
pub mod predictor;
pub mod regime;
pub mod risk_metrics;
