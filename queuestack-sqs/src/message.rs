//! Messages held by a queue

use md5::{Digest, Md5};
use uuid::Uuid;

/// One accepted send, tracked until it is deleted or expires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub body: String,
    pub md5_of_body: String,
    /// Message attributes are not modelled, so this is always empty.
    pub md5_of_message_attributes: String,
    pub sender_id: String,
    pub sent_timestamp: i64,
    /// The message is deliverable once `now >= visibility_deadline`.
    pub visibility_deadline: i64,
    pub receive_count: u32,
    /// Zero until the first receive.
    pub first_receive_timestamp: i64,
    /// Empty until the first receive.
    pub receipt_handle: String,
    /// Enqueue order within the owning queue, used to break `sent_timestamp` ties.
    pub(crate) sequence: u64,
}

impl Message {
    pub(crate) fn new(body: String, now: i64, delay_seconds: i64, sequence: u64) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            md5_of_body: md5_hex(body.as_bytes()),
            md5_of_message_attributes: String::new(),
            body,
            sender_id: String::new(),
            sent_timestamp: now,
            visibility_deadline: now + delay_seconds,
            receive_count: 0,
            first_receive_timestamp: 0,
            receipt_handle: String::new(),
            sequence,
        }
    }

    pub fn is_visible(&self, now: i64) -> bool {
        now >= self.visibility_deadline
    }

    /// Received at least once and still hidden by its visibility timeout.
    pub fn is_in_flight(&self, now: i64) -> bool {
        self.receive_count > 0 && !self.is_visible(now)
    }

    /// Never received and still waiting out its delivery delay.
    pub fn is_delayed(&self, now: i64) -> bool {
        self.receive_count == 0 && !self.is_visible(now)
    }
}

pub(crate) fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
