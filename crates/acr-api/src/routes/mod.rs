//! # API Route Modules
//!
//! One module per resource, each exposing `router()`.

pub mod assessments;
pub mod audit;
pub mod documents;
pub mod policies;
pub mod systems;
pub mod tasks;
