//! # Economy Error Types
//!
//! All errors that can occur while opening cases, plus the caller-facing
//! classification (status code and public message) of each.

use thiserror::Error;

use crate::fixed_point::FixedPoint;
use crate::store::StoreError;

/// Why a requested quantity was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// The value is missing, not a number, or has a fractional part.
    #[error("Quantity to open must be an integer")]
    NotInteger,

    /// More cases than one batch allows.
    #[error("You can only open up to {max} cases at a time")]
    BatchTooLarge {
        /// Configured batch cap.
        max: u32,
    },

    /// Zero or negative.
    #[error("You need to open at least 1 case")]
    BelowMinimum,
}

/// Coarse classification used at the request boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Case or user missing.
    NotFound,
    /// Malformed or out-of-range request.
    Validation,
    /// Balance short of the total price.
    InsufficientFunds,
    /// Anything the caller cannot fix.
    Internal,
}

/// Errors that can occur in the economy system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// The requested case does not exist.
    #[error("Case not found")]
    CaseNotFound,

    /// The authenticated user has no record.
    #[error("User not found")]
    UserNotFound,

    /// The quantity failed validation.
    #[error(transparent)]
    Validation(#[from] QuantityError),

    /// The wallet cannot cover the batch.
    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientFunds {
        /// Total price of the batch.
        required: FixedPoint,
        /// Wallet balance at check time.
        available: FixedPoint,
    },

    /// The case has no items to draw from.
    #[error("Case has no items")]
    EmptyCase,

    /// Arithmetic overflow in fixed-point calculation.
    #[error("arithmetic overflow in economic calculation")]
    ArithmeticOverflow,

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persistence collaborator failed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Any other failure that must not leak to callers.
    #[error("internal failure: {0}")]
    Internal(String),
}

impl EconomyError {
    /// Returns the coarse classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CaseNotFound | Self::UserNotFound => ErrorKind::NotFound,
            Self::Validation(_) | Self::EmptyCase => ErrorKind::Validation,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::ArithmeticOverflow
            | Self::InvalidConfig(_)
            | Self::Store(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status code for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Validation | ErrorKind::InsufficientFunds => 400,
            ErrorKind::Internal => 500,
        }
    }

    /// Message safe to show the caller. Internal details are never exposed.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InsufficientFunds { .. } => "Insufficient balance".to_owned(),
            err if err.kind() == ErrorKind::Internal => "Internal server error".to_owned(),
            err => err.to_string(),
        }
    }
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(EconomyError::CaseNotFound.status(), 404);
        assert_eq!(EconomyError::UserNotFound.status(), 404);
        assert_eq!(EconomyError::from(QuantityError::NotInteger).status(), 400);
        assert_eq!(EconomyError::EmptyCase.status(), 400);
        assert_eq!(
            EconomyError::InsufficientFunds {
                required: FixedPoint::from_whole(50),
                available: FixedPoint::from_whole(49),
            }
            .status(),
            400
        );
        assert_eq!(EconomyError::ArithmeticOverflow.status(), 500);
    }

    #[test]
    fn test_public_messages_match_route_wording() {
        assert_eq!(EconomyError::CaseNotFound.public_message(), "Case not found");
        assert_eq!(
            EconomyError::from(QuantityError::BatchTooLarge { max: 5 }).public_message(),
            "You can only open up to 5 cases at a time"
        );
        assert_eq!(
            EconomyError::from(QuantityError::BelowMinimum).public_message(),
            "You need to open at least 1 case"
        );
        assert_eq!(
            EconomyError::InsufficientFunds {
                required: FixedPoint::from_whole(50),
                available: FixedPoint::ZERO,
            }
            .public_message(),
            "Insufficient balance"
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = EconomyError::Store(StoreError::new("disk on fire"));
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("disk on fire"));
    }
}
