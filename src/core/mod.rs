//! Core logic — types, errors, graph resolution, document assembly.

pub mod assembler;
pub mod error;
pub mod resolver;
pub mod templates;
pub mod types;
