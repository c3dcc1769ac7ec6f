use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum MarketplaceError {
    #[error("{entity} {id} not found")]
    #[diagnostic(code(marketplace::not_found))]
    NotFound { entity: &'static str, id: u32 },

    #[error("Profile {0} is not allowed to perform this operation")]
    #[diagnostic(code(marketplace::unauthorized))]
    Unauthorized(u32),

    #[error("Profile {profile} is a {role} and cannot {action}")]
    #[diagnostic(code(marketplace::invalid_role))]
    InvalidRole {
        profile: u32,
        role: &'static str,
        action: &'static str,
    },

    #[error("Job {0} is already paid")]
    #[diagnostic(
        code(marketplace::already_paid),
        help("a job can only be paid once; refresh the job before retrying")
    )]
    AlreadyPaid(u32),

    #[error("Insufficient balance: {required} required, {available} available")]
    #[diagnostic(code(marketplace::insufficient_balance))]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Contract {0} is terminated")]
    #[diagnostic(code(marketplace::contract_terminated))]
    ContractTerminated(u32),

    #[error("Deposit of {amount} exceeds the limit of {limit}")]
    #[diagnostic(
        code(marketplace::deposit_limit_exceeded),
        help("deposits are capped to a share of the unpaid jobs of active contracts")
    )]
    DepositLimitExceeded { amount: Decimal, limit: Decimal },

    #[error("Arithmetic overflow while {0}")]
    #[diagnostic(
        code(marketplace::overflow),
        help("the amounts involved are outside the range a balance can hold")
    )]
    Overflow(&'static str),

    #[error("Validation error: {0}")]
    #[diagnostic(code(marketplace::validation))]
    ValidationError(String),

    #[error("Conflict: {0}")]
    #[diagnostic(
        code(marketplace::conflict),
        help("another operation modified the same records; the operation can be retried")
    )]
    Conflict(String),

    #[error("CSV error: {0}")]
    #[diagnostic(code(marketplace::csv))]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(marketplace::json))]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(marketplace::io))]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    #[diagnostic(code(marketplace::storage))]
    StorageError(#[from] rocksdb::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(marketplace::internal))]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl MarketplaceError {
    pub fn not_found(entity: &'static str, id: impl Into<u32>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MarketplaceError>;
