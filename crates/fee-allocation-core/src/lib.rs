pub mod amount;
pub mod error;
pub mod types;

#[cfg(feature = "allocation")]
pub mod allocation;

#[cfg(feature = "workflow")]
pub mod workflow;

#[cfg(feature = "timetable")]
pub mod timetable;

pub use error::FeeAllocationError;
pub use types::*;

/// Standard result type for all fee-allocation operations
pub type FeeAllocationResult<T> = Result<T, FeeAllocationError>;
