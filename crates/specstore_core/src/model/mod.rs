//! Domain model for specification entities.
//!
//! # Responsibility
//! - Define the entity kinds, their shared header and payload schemas.
//! - Own the prefix table and ID/slug parsing rules.
//!
//! # Invariants
//! - Every entity is identified by `(type, number)`; slugs are secondary.
//! - Schema validation lives on the model, never in storage code.

pub mod entity;
pub mod entity_type;
pub mod identity;
pub mod kinds;
pub mod validation;
