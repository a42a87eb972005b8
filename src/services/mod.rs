pub mod alerts;
pub mod costs;

pub use costs::CostService;
