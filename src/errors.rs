//! Error type shared by the calculator, the controller and the outer surfaces.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrewError {
    /// A coffee weight or ratio field that does not hold a finite number.
    #[error("Please enter valid numbers for coffee weight and ratio ({field}: {value:?})")]
    InvalidInput { field: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type BrewResult<T> = Result<T, BrewError>;
