use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Store failures, split by the operation that detected them.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database connect failed: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("schema operation failed: {0}")]
    Schema(#[source] sqlx::Error),
    #[error("bulk write failed: {0}")]
    Bulk(#[source] sqlx::Error),
    #[error("constraint rebuild failed: {0}")]
    Constraint(#[source] sqlx::Error),
    #[error("a load worker panicked")]
    WorkerPanicked,
    #[error("could not start store runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
