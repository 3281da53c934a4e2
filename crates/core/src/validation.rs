//! Input validation utilities.
//!
//! These checks run before inputs reach the store or the engines, so that caller contract
//! violations surface as `HrpError::InvalidInput` instead of undefined behaviour.

use crate::{HrpError, HrpResult};

const MAX_RECORD_ID_LEN: usize = 128;

/// Validates a filtered-view display bound, which must be positive.
///
/// # Errors
///
/// Returns `HrpError::InvalidInput` if `max_display` is zero.
pub fn validate_max_display(max_display: usize) -> HrpResult<usize> {
    if max_display == 0 {
        return Err(HrpError::InvalidInput(
            "max_display must be a positive integer".into(),
        ));
    }
    Ok(max_display)
}

/// Validates a record id supplied by a caller before it is looked up.
///
/// Ids are generated by the store as simple (hyphen-less) UUIDs, but callers may hold ids
/// from other feeds, so anything short, non-empty and made of `[A-Za-z0-9_-]` is accepted.
///
/// # Errors
///
/// Returns `HrpError::InvalidInput` if the id is empty, too long or has other characters.
pub fn validate_record_id(id: &str) -> HrpResult<()> {
    if id.is_empty() {
        return Err(HrpError::InvalidInput("record id cannot be empty".into()));
    }

    if id.len() > MAX_RECORD_ID_LEN {
        return Err(HrpError::InvalidInput(format!(
            "record id exceeds maximum length of {} characters",
            MAX_RECORD_ID_LEN
        )));
    }

    let ok = id
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'_'));
    if !ok {
        return Err(HrpError::InvalidInput(
            "record id contains invalid characters (only alphanumeric, '-', '_' allowed)".into(),
        ));
    }

    Ok(())
}
