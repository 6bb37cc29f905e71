use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("column `{0}` not found in CSV header")]
    MissingColumn(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
