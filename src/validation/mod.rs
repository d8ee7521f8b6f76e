//! Cell admissibility and the error taxonomy

pub mod error;
pub mod filter;

pub use error::{DeformationError, DropReason, DroppedPoint, StrainRateError};
pub use filter::{classify, ValidityFlag};
