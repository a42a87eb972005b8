pub mod alert;
pub mod cost;
pub mod types;

pub use alert::*;
pub use cost::*;
pub use types::*;
