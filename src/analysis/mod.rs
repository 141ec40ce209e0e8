//! Dimensionality reduction over wide count tables.

pub mod pca;

pub use pca::{perform_pca, pca, standardize, PcaResult};
