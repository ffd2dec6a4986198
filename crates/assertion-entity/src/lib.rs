//! # assertion-entity
//!
//! Domain entity models. Every struct in this crate represents a stored
//! record or a domain value object. All entities derive `Debug`, `Clone`,
//! `Serialize`, and `Deserialize`.

pub mod assertion;
pub mod identity;
pub mod notification;
