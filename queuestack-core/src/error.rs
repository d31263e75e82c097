//! SQS error codes and wire formatting

use thiserror::Error;

/// Error codes returned by the queue service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Request shape
    InvalidAction,
    MissingParameter,
    InvalidParameterValue,
    InvalidQueryParameter,

    // Queues
    NonExistentQueue,
    InvalidAttributeName,
    InvalidAttributeValue,

    // Messages
    ReceiptHandleIsInvalid,

    // Batches
    EmptyBatchRequest,
    TooManyEntriesInBatchRequest,
    InvalidBatchEntryId,
    BatchEntryIdsNotDistinct,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAction => "InvalidAction",
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::InvalidQueryParameter => "InvalidQueryParameter",
            Self::NonExistentQueue => "AWS.SimpleQueueService.NonExistentQueue",
            Self::InvalidAttributeName => "InvalidAttributeName",
            Self::InvalidAttributeValue => "InvalidAttributeValue",
            Self::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Self::EmptyBatchRequest => "AWS.SimpleQueueService.EmptyBatchRequest",
            Self::TooManyEntriesInBatchRequest => {
                "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
            }
            Self::InvalidBatchEntryId => "AWS.SimpleQueueService.InvalidBatchEntryId",
            Self::BatchEntryIdsNotDistinct => "AWS.SimpleQueueService.BatchEntryIdsNotDistinct",
        }
    }

    /// Every code the broker emits is a sender fault, reported as 400.
    pub fn http_status(&self) -> u16 {
        400
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service error bound to the request that produced it
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct AwsError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

impl AwsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Format as a query-protocol `ErrorResponse` document
    pub fn to_xml(&self) -> String {
        format!(
            r#"<ErrorResponse>
  <Error>
    <Type>Sender</Type>
    <Code>{}</Code>
    <Message>{}</Message>
    <Detail/>
  </Error>
  <RequestId>{}</RequestId>
</ErrorResponse>"#,
            self.code.as_str(),
            escape_xml(&self.message),
            self.request_id
        )
    }
}

/// Escape text for inclusion in an XML element body
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
