#[macro_use]
extern crate log;

pub mod errors;
pub mod registrar;
