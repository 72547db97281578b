//! Domain error types.
//!
//! Validation failures are recoverable and leave state untouched; database,
//! config and I/O failures are internal.

use rust_decimal::Decimal;

/// Top-level error type for paisabuddy.
#[derive(Debug, thiserror::Error)]
pub enum PaisaError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{field} already exists")]
    Duplicate { field: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("quantity must be a positive whole number")]
    InvalidQuantity,

    #[error("invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient shares: requested {requested}, have {available}")]
    InsufficientShares { requested: i64, available: i64 },

    #[error("insufficient tokens: need {required}, have {available}")]
    InsufficientTokens { required: i64, available: i64 },

    #[error("coupon is not available")]
    CouponUnavailable,

    #[error("you already own an active copy of this coupon")]
    DuplicateCoupon,

    #[error("coupon already redeemed")]
    AlreadyRedeemed,

    #[error("internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PaisaError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        PaisaError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PaisaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for errors caused by user input rather than the system.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            PaisaError::NotFound { .. }
                | PaisaError::Duplicate { .. }
                | PaisaError::Validation { .. }
                | PaisaError::InvalidQuantity
                | PaisaError::InvalidAmount { .. }
                | PaisaError::InsufficientFunds { .. }
                | PaisaError::InsufficientShares { .. }
                | PaisaError::InsufficientTokens { .. }
                | PaisaError::CouponUnavailable
                | PaisaError::DuplicateCoupon
                | PaisaError::AlreadyRedeemed
        )
    }
}

impl From<&PaisaError> for std::process::ExitCode {
    fn from(err: &PaisaError) -> Self {
        let code: u8 = match err {
            PaisaError::Io(_) | PaisaError::Internal { .. } => 1,
            PaisaError::ConfigParse { .. }
            | PaisaError::ConfigMissing { .. }
            | PaisaError::ConfigInvalid { .. } => 2,
            PaisaError::Database { .. } | PaisaError::DatabaseQuery { .. } => 3,
            _ => 4,
        };
        std::process::ExitCode::from(code)
    }
}
