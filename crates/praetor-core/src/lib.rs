pub mod context;
pub mod error;
pub mod types;

pub use context::*;
pub use error::*;
pub use types::*;
