//! Multi-asset allocation: Markowitz estimation, heuristic optimizers and
//! Monte Carlo simulation of random portfolios.

pub mod estimate;
pub mod monte_carlo;
pub mod optimizer;

pub use estimate::{estimate_returns, ReturnEstimates};
pub use monte_carlo::{simulate, MonteCarloReport, MonteCarloSettings};
pub use optimizer::{
    optimize, AllocationMethod, PortfolioAllocation, PortfolioReport, PortfolioSettings,
};
