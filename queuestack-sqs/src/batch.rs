//! Batch send/delete with per-entry outcomes
//!
//! A batch request addresses entries positionally as `<prefix>.<n>.<field>`
//! for n = 1, 2, ... without gaps. The whole request is validated before any
//! entry runs; after that each entry succeeds or fails on its own and a
//! failure never rolls back its siblings.

use std::collections::HashSet;

use queuestack_core::ErrorCode;
use tracing::info;

use crate::actor::QueueHandle;
use crate::error::SqsError;
use crate::params::{parse_integer, Params};
use crate::queue::MAX_BATCH_SIZE;
use crate::validation::is_valid_identifier;

pub const SEND_MESSAGE_BATCH_PREFIX: &str = "SendMessageBatchRequestEntry";
pub const DELETE_MESSAGE_BATCH_PREFIX: &str = "DeleteMessageBatchRequestEntry";

/// A validated batch entry: its position and caller-supplied ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub index: usize,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageBatchResultEntry {
    pub id: String,
    pub message_id: String,
    pub md5_of_message_body: String,
    pub md5_of_message_attributes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteMessageBatchResultEntry {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultErrorEntry {
    pub id: String,
    pub code: ErrorCode,
    pub message: String,
    pub sender_fault: bool,
}

impl BatchResultErrorEntry {
    /// Every per-entry failure is the caller's doing.
    fn from_error(id: &str, err: &SqsError) -> Self {
        Self {
            id: id.to_string(),
            code: err.code(),
            message: err.to_string(),
            sender_fault: true,
        }
    }
}

/// Outcome of a batch: successes and failures, each in entry order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<T> {
    pub successful: Vec<T>,
    pub failed: Vec<BatchResultErrorEntry>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            successful: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Check the shape of a batch request without touching any queue.
///
/// `required` lists the per-entry fields besides `Id` that must be present.
pub fn validate_batch(
    params: &Params,
    prefix: &str,
    required: &[&str],
) -> Result<Vec<BatchEntry>, SqsError> {
    let mut entries = Vec::new();

    for index in 1.. {
        let Some(ids) = params.get_all(&format!("{}.{}.Id", prefix, index)) else {
            break;
        };

        if index == MAX_BATCH_SIZE + 1 {
            return Err(SqsError::TooManyEntriesInBatchRequest(
                "The batch request contains more entries than permissible.".to_string(),
            ));
        }

        let [id] = ids else {
            return Err(SqsError::InvalidQueryParameter(
                "The AWS query string is malformed or does not adhere to AWS standards."
                    .to_string(),
            ));
        };

        if !is_valid_identifier(id) {
            return Err(SqsError::InvalidBatchEntryId(
                "The Id of a batch entry in a batch request doesn't abide by the specification."
                    .to_string(),
            ));
        }

        entries.push(BatchEntry {
            index,
            id: id.clone(),
        });
    }

    if entries.is_empty() {
        return Err(SqsError::EmptyBatchRequest(
            "The batch request doesn't contain any entries.".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    if !entries.iter().all(|e| seen.insert(e.id.as_str())) {
        return Err(SqsError::BatchEntryIdsNotDistinct(
            "Two or more batch entries in the request have the same Id.".to_string(),
        ));
    }

    for entry in &entries {
        for field in required {
            let key = format!("{}.{}.{}", prefix, entry.index, field);
            if !params.contains(&key) {
                return Err(SqsError::MissingParameter(format!(
                    "The request must contain the parameter {}.",
                    key
                )));
            }
        }
    }

    Ok(entries)
}

/// Enqueue every entry of a `SendMessageBatch` request.
pub async fn send_message_batch(
    queue: &QueueHandle,
    params: &Params,
) -> Result<BatchOutcome<SendMessageBatchResultEntry>, SqsError> {
    let prefix = SEND_MESSAGE_BATCH_PREFIX;
    let entries = validate_batch(params, prefix, &["MessageBody"])?;
    let mut outcome = BatchOutcome::default();

    for entry in &entries {
        let field = |name: &str| params.get(&format!("{}.{}.{}", prefix, entry.index, name));
        let body = field("MessageBody").unwrap_or_default().to_string();

        let delay_seconds = match field("DelaySeconds")
            .filter(|raw| !raw.is_empty())
            .map(|raw| parse_integer("DelaySeconds", raw))
        {
            None => None,
            Some(Ok(delay)) => Some(delay),
            Some(Err(err)) => {
                outcome
                    .failed
                    .push(BatchResultErrorEntry::from_error(&entry.id, &err));
                continue;
            }
        };

        match queue.enqueue(body, delay_seconds).await {
            Ok(message) => outcome.successful.push(SendMessageBatchResultEntry {
                id: entry.id.clone(),
                message_id: message.message_id,
                md5_of_message_body: message.md5_of_body,
                md5_of_message_attributes: message.md5_of_message_attributes,
            }),
            Err(err @ SqsError::QueueDoesNotExist(_)) => return Err(err),
            Err(err) => outcome
                .failed
                .push(BatchResultErrorEntry::from_error(&entry.id, &err)),
        }
    }

    info!(
        queue = %queue.name(),
        successful = outcome.successful.len(),
        failed = outcome.failed.len(),
        "Sent message batch"
    );
    Ok(outcome)
}

/// Delete every entry of a `DeleteMessageBatch` request.
pub async fn delete_message_batch(
    queue: &QueueHandle,
    params: &Params,
) -> Result<BatchOutcome<DeleteMessageBatchResultEntry>, SqsError> {
    let prefix = DELETE_MESSAGE_BATCH_PREFIX;
    let entries = validate_batch(params, prefix, &["ReceiptHandle"])?;
    let mut outcome = BatchOutcome::default();

    for entry in &entries {
        let receipt_handle = params
            .get(&format!("{}.{}.ReceiptHandle", prefix, entry.index))
            .unwrap_or_default()
            .to_string();

        match queue.delete(receipt_handle).await {
            Ok(()) => outcome.successful.push(DeleteMessageBatchResultEntry {
                id: entry.id.clone(),
            }),
            Err(err @ SqsError::QueueDoesNotExist(_)) => return Err(err),
            Err(err) => outcome
                .failed
                .push(BatchResultErrorEntry::from_error(&entry.id, &err)),
        }
    }

    info!(
        queue = %queue.name(),
        successful = outcome.successful.len(),
        failed = outcome.failed.len(),
        "Deleted message batch"
    );
    Ok(outcome)
}
