// Provider adapters: pure payload → canonical conversion. Adapters never
// touch the database and carry no zone or rule context.

pub mod news;
pub mod tweet;
pub mod video;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unrecognized payload shape")]
    UnrecognizedShape,
}
