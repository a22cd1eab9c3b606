//! Cache error types.
//!
//! Structured errors using `exn` for automatic location tracking. A
//! missing cache entry is never an error: lookups return `Ok(None)` so
//! callers can discover "not cached yet" without any error handling.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The storage engine failed to read or write.
    #[display("database error")]
    Database,
    /// A migration step failed to apply; carries the schema version the
    /// step was meant to produce. Fatal to opening the database.
    #[display("migration to schema version {_0} failed")]
    Migration(#[error(not(source))] i64),
    /// The file on disk was written by a newer build.
    #[display("database is at schema version {_0}, newer than this build supports")]
    UnsupportedSchema(#[error(not(source))] i64),
    /// Metadata is already cached for this content hash.
    #[display("metadata already cached for this content hash")]
    AlreadyCached,
    /// A stored payload failed to serialize or deserialize.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}
