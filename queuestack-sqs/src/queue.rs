//! Per-queue state: configuration, message table and receipt-handle index
//!
//! A [`QueueStore`] is owned by exactly one queue actor and is never shared,
//! so none of its methods synchronize. Every method that depends on time takes
//! `now` (unix seconds) explicitly.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::SqsError;
use crate::message::Message;

/// Maximum number of entries in a batch request and of messages per receive.
pub const MAX_BATCH_SIZE: usize = 10;
pub const MAX_DELAY_SECONDS: i64 = 900;
pub const MAX_VISIBILITY_TIMEOUT: i64 = 43_200;
/// Visibility timeout applied by a receive that names none, when the queue has
/// never been given one.
pub const DEFAULT_RECEIVE_VISIBILITY_TIMEOUT: i64 = 30;

/// Mutable queue configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// `None` until set through attributes; reported as 0 while unset.
    pub visibility_timeout: Option<i64>,
    pub maximum_message_size: i64,
    pub message_retention_period: i64,
    pub delay_seconds: i64,
    pub receive_message_wait_time_seconds: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: None,
            maximum_message_size: 262_144,
            message_retention_period: 346_500,
            delay_seconds: 0,
            receive_message_wait_time_seconds: 30,
        }
    }
}

impl QueueConfig {
    /// Apply named attributes. Either every attribute is applied or none is.
    pub fn apply(&mut self, attributes: &HashMap<String, String>) -> Result<(), SqsError> {
        let mut updated = self.clone();
        for (name, value) in attributes {
            match name.as_str() {
                "VisibilityTimeout" => {
                    updated.visibility_timeout =
                        Some(parse_attribute(name, value, 0, MAX_VISIBILITY_TIMEOUT)?);
                }
                "MaximumMessageSize" => {
                    updated.maximum_message_size = parse_attribute(name, value, 1_024, 262_144)?;
                }
                "MessageRetentionPeriod" => {
                    updated.message_retention_period =
                        parse_attribute(name, value, 60, 1_209_600)?;
                }
                "DelaySeconds" => {
                    updated.delay_seconds = parse_attribute(name, value, 0, MAX_DELAY_SECONDS)?;
                }
                "ReceiveMessageWaitTimeSeconds" => {
                    updated.receive_message_wait_time_seconds =
                        parse_attribute(name, value, 0, 20)?;
                }
                _ => {
                    return Err(SqsError::InvalidAttributeName(format!(
                        "Unknown Attribute {}.",
                        name
                    )));
                }
            }
        }
        *self = updated;
        Ok(())
    }
}

fn parse_attribute(name: &str, value: &str, min: i64, max: i64) -> Result<i64, SqsError> {
    match value.trim().parse::<i64>() {
        Ok(v) if (min..=max).contains(&v) => Ok(v),
        _ => Err(SqsError::InvalidAttributeValue(format!(
            "Invalid value for the parameter {}. Reason: Must be between {} and {}.",
            name, min, max
        ))),
    }
}

/// Point-in-time view of a queue's attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAttributes {
    pub queue_arn: String,
    pub approximate_number_of_messages: u64,
    pub approximate_number_of_messages_not_visible: u64,
    pub approximate_number_of_messages_delayed: u64,
    pub created_timestamp: i64,
    pub last_modified_timestamp: i64,
    pub visibility_timeout: i64,
    pub maximum_message_size: i64,
    pub message_retention_period: i64,
    pub delay_seconds: i64,
    pub receive_message_wait_time_seconds: i64,
}

impl QueueAttributes {
    /// Attribute name/value pairs in response order
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("QueueArn", self.queue_arn.clone()),
            (
                "ApproximateNumberOfMessages",
                self.approximate_number_of_messages.to_string(),
            ),
            (
                "ApproximateNumberOfMessagesNotVisible",
                self.approximate_number_of_messages_not_visible.to_string(),
            ),
            (
                "ApproximateNumberOfMessagesDelayed",
                self.approximate_number_of_messages_delayed.to_string(),
            ),
            ("CreatedTimestamp", self.created_timestamp.to_string()),
            ("LastModifiedTimestamp", self.last_modified_timestamp.to_string()),
            ("VisibilityTimeout", self.visibility_timeout.to_string()),
            ("MaximumMessageSize", self.maximum_message_size.to_string()),
            (
                "MessageRetentionPeriod",
                self.message_retention_period.to_string(),
            ),
            ("DelaySeconds", self.delay_seconds.to_string()),
            (
                "ReceiveMessageWaitTimeSeconds",
                self.receive_message_wait_time_seconds.to_string(),
            ),
        ]
    }
}

/// State of one queue
#[derive(Debug)]
pub struct QueueStore {
    name: String,
    arn: String,
    config: QueueConfig,
    created_timestamp: i64,
    last_modified_timestamp: i64,
    messages: HashMap<String, Message>,
    /// Receipt handle -> message ID, only for messages that have been received.
    receipt_handles: HashMap<String, String>,
    next_sequence: u64,
}

impl QueueStore {
    pub fn new(name: impl Into<String>, arn: impl Into<String>, config: QueueConfig, now: i64) -> Self {
        Self {
            name: name.into(),
            arn: arn.into(),
            config,
            created_timestamp: now,
            last_modified_timestamp: now,
            messages: HashMap::new(),
            receipt_handles: HashMap::new(),
            next_sequence: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Store a new message. `delay_seconds` falls back to the queue default.
    pub fn enqueue(
        &mut self,
        body: String,
        delay_seconds: Option<i64>,
        now: i64,
    ) -> Result<Message, SqsError> {
        let delay_seconds = delay_seconds.unwrap_or(self.config.delay_seconds);
        if !(0..=MAX_DELAY_SECONDS).contains(&delay_seconds) {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {} for parameter DelaySeconds is invalid. Reason: Must be between 0 and {}, if provided.",
                delay_seconds, MAX_DELAY_SECONDS
            )));
        }
        if body.len() as i64 > self.config.maximum_message_size {
            return Err(SqsError::InvalidParameterValue(format!(
                "One or more parameters are invalid. Reason: Message must be shorter than {} bytes.",
                self.config.maximum_message_size
            )));
        }

        let message = Message::new(body, now, delay_seconds, self.next_sequence);
        self.next_sequence += 1;
        self.messages
            .insert(message.message_id.clone(), message.clone());

        debug!(queue = %self.name, message_id = %message.message_id, delay_seconds, "Stored message");
        Ok(message)
    }

    /// Claim up to `max_number_of_messages` visible messages, oldest first.
    ///
    /// Each claimed message gets a fresh receipt handle (the previous one stops
    /// working) and stays hidden for the visibility timeout.
    pub fn receive(
        &mut self,
        max_number_of_messages: i64,
        visibility_timeout: Option<i64>,
        now: i64,
    ) -> Result<Vec<Message>, SqsError> {
        if !(1..=MAX_BATCH_SIZE as i64).contains(&max_number_of_messages) {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {} for parameter MaxNumberOfMessages is invalid. Reason: Must be between 1 and {}, if provided.",
                max_number_of_messages, MAX_BATCH_SIZE
            )));
        }
        let visibility_timeout = visibility_timeout
            .or(self.config.visibility_timeout)
            .unwrap_or(DEFAULT_RECEIVE_VISIBILITY_TIMEOUT);
        if !(0..=MAX_VISIBILITY_TIMEOUT).contains(&visibility_timeout) {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {} for parameter VisibilityTimeout is invalid. Reason: Must be between 0 and {}, if provided.",
                visibility_timeout, MAX_VISIBILITY_TIMEOUT
            )));
        }

        self.expire(now);

        let mut eligible: Vec<(i64, u64, String)> = self
            .messages
            .values()
            .filter(|m| m.is_visible(now))
            .map(|m| (m.sent_timestamp, m.sequence, m.message_id.clone()))
            .collect();
        eligible.sort_unstable();
        eligible.truncate(max_number_of_messages as usize);

        let mut claimed = Vec::with_capacity(eligible.len());
        for (_, _, message_id) in eligible {
            let Some(message) = self.messages.get_mut(&message_id) else {
                continue;
            };
            if !message.receipt_handle.is_empty() {
                self.receipt_handles.remove(&message.receipt_handle);
            }
            message.receipt_handle = Uuid::new_v4().to_string();
            message.visibility_deadline = now + visibility_timeout;
            if message.first_receive_timestamp == 0 {
                message.first_receive_timestamp = now;
            }
            message.receive_count += 1;
            self.receipt_handles
                .insert(message.receipt_handle.clone(), message_id);
            claimed.push(message.clone());
        }

        Ok(claimed)
    }

    /// Remove the message currently claimed by `receipt_handle`.
    pub fn delete(&mut self, receipt_handle: &str) -> Result<(), SqsError> {
        let message_id = self
            .receipt_handles
            .remove(receipt_handle)
            .ok_or_else(|| SqsError::invalid_receipt_handle(receipt_handle))?;
        self.messages.remove(&message_id);
        Ok(())
    }

    /// Reset the visibility deadline of a claimed message to `now + visibility_timeout`.
    pub fn change_visibility(
        &mut self,
        receipt_handle: &str,
        visibility_timeout: i64,
        now: i64,
    ) -> Result<(), SqsError> {
        if !(0..=MAX_VISIBILITY_TIMEOUT).contains(&visibility_timeout) {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {} for parameter VisibilityTimeout is invalid. Reason: Must be between 0 and {}.",
                visibility_timeout, MAX_VISIBILITY_TIMEOUT
            )));
        }
        let message = self
            .receipt_handles
            .get(receipt_handle)
            .and_then(|id| self.messages.get_mut(id))
            .ok_or_else(|| SqsError::invalid_receipt_handle(receipt_handle))?;
        message.visibility_deadline = now + visibility_timeout;
        Ok(())
    }

    /// Drop every message and receipt handle, returning how many messages went.
    pub fn purge(&mut self) -> usize {
        let purged = self.messages.len();
        self.messages.clear();
        self.receipt_handles.clear();
        purged
    }

    pub fn set_attributes(
        &mut self,
        attributes: &HashMap<String, String>,
        now: i64,
    ) -> Result<(), SqsError> {
        self.config.apply(attributes)?;
        self.last_modified_timestamp = now;
        Ok(())
    }

    pub fn describe(&mut self, now: i64) -> QueueAttributes {
        self.expire(now);

        let not_visible = self
            .messages
            .values()
            .filter(|m| m.is_in_flight(now))
            .count() as u64;
        let delayed = self
            .messages
            .values()
            .filter(|m| m.is_delayed(now))
            .count() as u64;

        QueueAttributes {
            queue_arn: self.arn.clone(),
            approximate_number_of_messages: self.messages.len() as u64 - not_visible - delayed,
            approximate_number_of_messages_not_visible: not_visible,
            approximate_number_of_messages_delayed: delayed,
            created_timestamp: self.created_timestamp,
            last_modified_timestamp: self.last_modified_timestamp,
            visibility_timeout: self.config.visibility_timeout.unwrap_or(0),
            maximum_message_size: self.config.maximum_message_size,
            message_retention_period: self.config.message_retention_period,
            delay_seconds: self.config.delay_seconds,
            receive_message_wait_time_seconds: self.config.receive_message_wait_time_seconds,
        }
    }

    /// Panics if the receipt-handle index disagrees with the message table.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (handle, message_id) in &self.receipt_handles {
            let message = self
                .messages
                .get(message_id)
                .expect("receipt handle points at a missing message");
            assert_eq!(&message.receipt_handle, handle, "stale receipt handle indexed");
        }
    }

    /// Drop messages that outlived the retention period.
    fn expire(&mut self, now: i64) {
        let retention = self.config.message_retention_period;
        let receipt_handles = &mut self.receipt_handles;
        let before = self.messages.len();
        self.messages.retain(|_, m| {
            let keep = m.sent_timestamp + retention > now;
            if !keep && !m.receipt_handle.is_empty() {
                receipt_handles.remove(&m.receipt_handle);
            }
            keep
        });
        let expired = before - self.messages.len();
        if expired > 0 {
            debug!(queue = %self.name, expired, "Expired messages past retention");
        }
    }
}

