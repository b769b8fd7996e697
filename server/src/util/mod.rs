//! Process-lifetime helpers: graceful shutdown signal handling.

pub mod sig_down;

pub use sig_down::*;
