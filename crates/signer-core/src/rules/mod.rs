//! The declarative rule engine: conditions, symbols, ABI-decoded parameter
//! matching, and the ordered rule list (spec §4.4).

pub mod condition;
pub mod rule;

pub use condition::{Condition, Field, Symbol};
pub use rule::{Rule, Rules};
