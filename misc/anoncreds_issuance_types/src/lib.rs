extern crate log;

#[macro_use]
extern crate serde;

mod error;
pub use self::error::{ConversionError, ValidationError};

pub mod utils;

pub mod data_types;
