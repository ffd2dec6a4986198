//! # assertion-registry
//!
//! Client for the remote identity registry. The sync and notification
//! paths depend on the [`RegistryClient`] trait; [`HttpRegistryClient`] is
//! the production implementation over the registry's JSON member API.

pub mod client;
pub mod error;
pub mod http;
pub mod wire;

pub use client::RegistryClient;
pub use error::RegistryError;
pub use http::HttpRegistryClient;
