//! Temporal and structural validation of decoded tokens
//!
//! Checks run in a fixed order and the first failure wins:
//! expiry, not-before, then issued-at with a forward clock skew allowance.

use super::{Claims, DecodeError, decode};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Forward clock skew allowed between the issuer and this client
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 300;

/// Source of the current time in epoch seconds
pub trait Clock: Send + Sync {
    /// Current time as seconds since the Unix epoch
    fn now(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// Why a token was rejected locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
pub enum InvalidReason {
    #[error("No token provided")]
    NoToken,
    #[error("Invalid token format")]
    MalformedFormat,
    #[error("Token parsing failed")]
    ParsingFailed,
    #[error("Token expired")]
    Expired,
    #[error("Token not yet valid")]
    NotYetValid,
    #[error("Token issued in future")]
    IssuedInFuture,
}

impl From<&DecodeError> for InvalidReason {
    fn from(err: &DecodeError) -> Self {
        match err {
            DecodeError::MalformedFormat => Self::MalformedFormat,
            DecodeError::ParsingFailed(_) => Self::ParsingFailed,
        }
    }
}

/// Outcome of validating a token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid { claims: Claims },
    Invalid { reason: InvalidReason },
}

impl ValidationResult {
    pub const fn invalid(reason: InvalidReason) -> Self {
        Self::Invalid { reason }
    }

    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Claims of a valid token
    pub const fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Valid { claims } => Some(claims),
            Self::Invalid { .. } => None,
        }
    }

    /// Rejection reason of an invalid token
    pub const fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { reason } => Some(*reason),
        }
    }

    /// Subject of a valid token
    pub fn subject(&self) -> Option<&str> {
        self.claims().and_then(Claims::subject)
    }
}

/// Validates tokens against an injectable clock
#[derive(Clone)]
pub struct TokenValidator {
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    /// Validator using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Validator using a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Current time according to this validator's clock
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Validate a token against the validator's clock
    pub fn validate(&self, token: Option<&str>) -> ValidationResult {
        validate_at(token, self.clock.now())
    }
}

impl Default for TokenValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("now", &self.clock.now())
            .finish()
    }
}

/// Validate a token against the wall clock
pub fn validate(token: Option<&str>) -> ValidationResult {
    validate_at(token, SystemClock.now())
}

/// Validate a token as of `now` (epoch seconds)
pub fn validate_at(token: Option<&str>, now: i64) -> ValidationResult {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return ValidationResult::invalid(InvalidReason::NoToken);
    };

    let claims = match decode(token) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(error = %err, "token could not be decoded");
            return ValidationResult::invalid(InvalidReason::from(&err));
        }
    };

    match check_times(&claims, now) {
        Some(reason) => ValidationResult::invalid(reason),
        None => ValidationResult::Valid { claims },
    }
}

fn check_times(claims: &Claims, now: i64) -> Option<InvalidReason> {
    if claims.exp.is_some_and(|exp| exp < now) {
        return Some(InvalidReason::Expired);
    }
    if claims.nbf.is_some_and(|nbf| nbf > now) {
        return Some(InvalidReason::NotYetValid);
    }
    if claims
        .iat
        .is_some_and(|iat| iat > now.saturating_add(CLOCK_SKEW_TOLERANCE_SECS))
    {
        return Some(InvalidReason::IssuedInFuture);
    }
    None
}
