use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UtilsError {
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("unknown log format '{0}': expected \"human\" or \"json\"")]
    UnknownLogFormat(String),
}
