//! Sessiongate core types and utilities
//!
//! Local token decoding and validation, the session credential store, and the
//! error and tracing plumbing shared by the other crates.

pub mod error;
pub mod store;
pub mod token;
#[cfg(feature = "tracing-init")]
pub mod tracing;

pub use error::{CoreError, CoreResult};
pub use store::{FileSessionStore, MemorySessionStore, REFRESH_TOKEN_KEY, SessionStore, TOKEN_KEY};
pub use token::{
    CLOCK_SKEW_TOLERANCE_SECS, Claims, Clock, DecodeError, FixedClock, InvalidReason,
    SystemClock, TokenValidator, ValidationResult, decode, validate, validate_at,
};
