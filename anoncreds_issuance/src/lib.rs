#[macro_use]
extern crate log;

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod issuer;
pub mod revocation;
pub mod setup;
pub mod tails;
pub mod utils;
