#[macro_use]
pub mod macros;

pub mod identifiers;
pub mod ledger;
pub mod messages;
