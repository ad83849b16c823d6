//! Core data structures for lascache
//!
//! This crate provides the fundamental types shared by the lascache
//! conversion pipeline: point type aliases, the common error type, and
//! the progress/task identity types reported by running conversions.

pub mod error;
pub mod point;
pub mod progress;

pub use error::*;
pub use point::*;
pub use progress::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};

/// Common result type for lascache operations
pub type Result<T> = std::result::Result<T, Error>;
