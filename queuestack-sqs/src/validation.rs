//! Name and identifier validation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SqsError;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,80}$").expect("identifier pattern compiles"));

/// Queue names and batch entry IDs share the same alphabet and length limit.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER.is_match(value)
}

pub fn validate_queue_name(name: &str) -> Result<(), SqsError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(SqsError::InvalidParameterValue(
            "The specified queue name is not valid.".to_string(),
        ))
    }
}
