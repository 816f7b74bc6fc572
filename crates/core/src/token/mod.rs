//! Local bearer token inspection
//!
//! Tokens are decoded and checked against the clock without verifying the
//! signature; that remains the server's job.

pub mod claims;
pub mod codec;
pub mod validator;

pub use claims::Claims;
pub use codec::{DecodeError, decode};
pub use validator::{
    CLOCK_SKEW_TOLERANCE_SECS, Clock, FixedClock, InvalidReason, SystemClock, TokenValidator,
    ValidationResult, validate, validate_at,
};
