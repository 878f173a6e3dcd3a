//! Validation schemas derived from content types.

pub use lattice_validators::*;
