//! Core types for QueueStack
//!
//! This crate provides the wire-level error table and request identifiers
//! shared by the broker crates.

pub mod error;
pub mod request_id;

pub use error::{AwsError, ErrorCode};
pub use request_id::RequestId;
