//! Plain data shared by the topology and execution crates.

mod domain;
pub use domain::*;
