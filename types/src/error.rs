//! Errors raised while constructing model values.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TypesError {
    #[error("amount must be finite and non-negative, got {0}")]
    InvalidAmount(f64),

    #[error("amount overflow")]
    Overflow,

    #[error("mining rate must be positive, got {0}")]
    InvalidRate(f64),
}
