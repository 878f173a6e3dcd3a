//! Settings module.
//!
//! # Examples
//!
//! ```rust
//! use lattice::conf::Settings;
//!
//! let settings = Settings::from_toml_str("[migrations]\nauto_migrate = false").unwrap();
//! assert!(!settings.migrations.auto_migrate);
//! ```

pub use lattice_conf::*;
