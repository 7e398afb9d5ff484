//! Registry and cross-entity services built on the repository layer.
//!
//! # Responsibility
//! - Compose per-type managers over one specs root (`spec_manager`).
//! - Bootstrap the counter store from legacy files (`migration`).
//! - Check cross-entity references (`reference_validator`).

pub mod migration;
pub mod reference_validator;
pub mod spec_manager;
