pub mod forecast;
pub mod trend;
