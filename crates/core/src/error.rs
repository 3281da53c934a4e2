use crate::patient::AlertStatus;

#[derive(Debug, thiserror::Error)]
pub enum HrpError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("high-risk patient not found: {0}")]
    NotFound(String),
    #[error("alert status cannot be set back to {0}")]
    InvalidStatusTransition(AlertStatus),
    #[error("invalid text: {0}")]
    Text(#[from] hrp_types::TextError),
}

pub type HrpResult<T> = std::result::Result<T, HrpError>;
