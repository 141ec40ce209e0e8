//! Derived numeric views of the count table.
//!
//! - **Wide tables**: one row per filename at a single ontology level
//! - **Proportions**: row-wise relative abundance
//! - **CLR**: centered log-ratio with an additive offset

pub mod clr;
pub mod proportions;

pub use clr::clr;
pub use proportions::{to_proportions, to_wide, WideTable};
