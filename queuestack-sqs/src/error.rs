//! Engine error taxonomy

use queuestack_core::{AwsError, ErrorCode};
use thiserror::Error;

/// Errors raised by queue operations. All of them are sender faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqsError {
    #[error("{0}")]
    QueueDoesNotExist(String),
    #[error("{0}")]
    InvalidParameterValue(String),
    #[error("{0}")]
    MissingParameter(String),
    #[error("{0}")]
    InvalidQueryParameter(String),
    #[error("{0}")]
    ReceiptHandleIsInvalid(String),
    #[error("{0}")]
    InvalidAttributeName(String),
    #[error("{0}")]
    InvalidAttributeValue(String),
    #[error("{0}")]
    EmptyBatchRequest(String),
    #[error("{0}")]
    TooManyEntriesInBatchRequest(String),
    #[error("{0}")]
    InvalidBatchEntryId(String),
    #[error("{0}")]
    BatchEntryIdsNotDistinct(String),
    #[error("{0}")]
    InvalidAction(String),
}

impl SqsError {
    pub fn non_existent_queue() -> Self {
        Self::QueueDoesNotExist(
            "The specified queue does not exist for this wsdl version.".to_string(),
        )
    }

    pub fn invalid_receipt_handle(receipt_handle: &str) -> Self {
        Self::ReceiptHandleIsInvalid(format!(
            "The input receipt handle \"{}\" is not a valid receipt handle.",
            receipt_handle
        ))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::QueueDoesNotExist(_) => ErrorCode::NonExistentQueue,
            Self::InvalidParameterValue(_) => ErrorCode::InvalidParameterValue,
            Self::MissingParameter(_) => ErrorCode::MissingParameter,
            Self::InvalidQueryParameter(_) => ErrorCode::InvalidQueryParameter,
            Self::ReceiptHandleIsInvalid(_) => ErrorCode::ReceiptHandleIsInvalid,
            Self::InvalidAttributeName(_) => ErrorCode::InvalidAttributeName,
            Self::InvalidAttributeValue(_) => ErrorCode::InvalidAttributeValue,
            Self::EmptyBatchRequest(_) => ErrorCode::EmptyBatchRequest,
            Self::TooManyEntriesInBatchRequest(_) => ErrorCode::TooManyEntriesInBatchRequest,
            Self::InvalidBatchEntryId(_) => ErrorCode::InvalidBatchEntryId,
            Self::BatchEntryIdsNotDistinct(_) => ErrorCode::BatchEntryIdsNotDistinct,
            Self::InvalidAction(_) => ErrorCode::InvalidAction,
        }
    }
}

impl From<SqsError> for AwsError {
    fn from(err: SqsError) -> Self {
        AwsError::new(err.code(), err.to_string())
    }
}
