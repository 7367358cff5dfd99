use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("{field} must be between 0 and 100, got {value}")]
    RatingOutOfRange { field: &'static str, value: i32 },

    #[error("sector {0} has no sector_rating")]
    MissingSectorRating(String),

    #[error("sector_rating {0} has no sector_name")]
    MissingSectorName(i32),
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown period {0:?}, expected one of 1 Day, 1 Week, 1 Year, Multi-Year")]
pub struct ParseGranularityError(pub String);
