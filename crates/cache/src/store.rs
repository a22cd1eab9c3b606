//! Keyed read/write access to cached metadata and thumbnails.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Metadata, MetadataRow};
use exn::ResultExt;
use sqlx::SqlitePool;

/// Repository over the metadata and thumbnail tables.
///
/// Everything is keyed by the content hash of the source file, computed
/// by the caller; the store never inspects it. Lookups return
/// `Ok(None)` for an uncached hash so the caller can fall through to
/// the expensive computation without error handling.
///
/// Metadata and thumbnails deliberately have different write semantics:
/// a file is probed at most once per content hash, so
/// [`insert_metadata`](Self::insert_metadata) rejects duplicates, while
/// thumbnail rendering is idempotent and re-render-and-overwrite is the
/// expected pattern, so [`save_thumbnail`](Self::save_thumbnail)
/// upserts.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl From<&Database> for Store {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Store {
    /// Create a store over the given connection pool.
    ///
    /// The pool must come from a [`Database`], which guarantees the
    /// schema is current.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the cached metadata for a content hash.
    ///
    /// Returns `Ok(None)` when nothing is cached for `hash`. A row
    /// whose stored probe payload no longer deserializes surfaces as
    /// [`ErrorKind::InvalidData`], not as a miss.
    pub async fn metadata(&self, hash: impl AsRef<str>) -> Result<Option<Metadata>> {
        let row: Option<MetadataRow> =
            sqlx::query_as("SELECT title, ffmpegInfo FROM metadata WHERE hash = ?")
                .bind(hash.as_ref())
                .fetch_optional(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        row.map(Metadata::try_from).transpose()
    }

    /// Cache the metadata for a content hash.
    ///
    /// Insert-only: a second insert for the same hash reports
    /// [`ErrorKind::AlreadyCached`] instead of overwriting, since the
    /// probe result for a given content hash never changes.
    pub async fn insert_metadata(&self, hash: impl AsRef<str>, metadata: &Metadata) -> Result<()> {
        let row = MetadataRow::try_from(metadata)?;
        let result = sqlx::query("INSERT INTO metadata (hash, title, ffmpegInfo) VALUES (?, ?, ?)")
            .bind(hash.as_ref())
            .bind(row.title)
            .bind(row.ffmpeg_info)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                exn::bail!(ErrorKind::AlreadyCached)
            },
            Err(e) => Err(e).or_raise(|| ErrorKind::Database),
        }
    }

    /// Look up a cached thumbnail by content hash and type tag.
    ///
    /// The tag is matched case-insensitively; `Ok(None)` means no
    /// thumbnail of that type has been rendered for `hash` yet.
    pub async fn thumbnail(
        &self,
        hash: impl AsRef<str>,
        kind: impl AsRef<str>,
    ) -> Result<Option<Vec<u8>>> {
        sqlx::query_scalar("SELECT thumbValue FROM thumbnails WHERE hash = ? AND thumbType = ?")
            .bind(hash.as_ref())
            .bind(kind.as_ref().to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Cache a rendered thumbnail for a content hash.
    ///
    /// The type tag is lower-cased before storage. Upserts: a prior
    /// value for the same (hash, type) pair is replaced.
    pub async fn save_thumbnail(
        &self,
        hash: impl AsRef<str>,
        kind: impl AsRef<str>,
        image: impl AsRef<[u8]>,
    ) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO thumbnails (hash, thumbType, thumbValue) VALUES (?, ?, ?)")
            .bind(hash.as_ref())
            .bind(kind.as_ref().to_lowercase())
            .bind(image.as_ref())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
