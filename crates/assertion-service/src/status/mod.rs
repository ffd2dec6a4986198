//! Assertion status derivation and registry error classification.

pub mod classifier;
pub mod derivation;

pub use classifier::classify_error;
pub use derivation::derive_status;
