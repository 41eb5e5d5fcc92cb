use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    MissingAdId,
    InvalidAdUrl { ad: String, reason: String },
    OccurrencesOutOfRange { ad: String, value: u32 },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::MissingAdId => write!(f, "ad record has no id"),
            ModelError::InvalidAdUrl { ad, reason } => {
                write!(f, "ad {ad} has an invalid url: {reason}")
            }
            ModelError::OccurrencesOutOfRange { ad, value } => write!(
                f,
                "ad {ad} requests {value} occurrences (allowed 1..={})",
                crate::ad::MAX_OCCURRENCES
            ),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
