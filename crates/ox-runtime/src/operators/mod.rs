//! Built-in operator implementations.

pub mod lstm;
