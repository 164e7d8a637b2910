//! Contact writes: draft creation, typed patches and explicit mutation ops.

pub mod executor;
pub mod plan;

pub use executor::WriteExecutor;
pub use plan::{compile, Step};
