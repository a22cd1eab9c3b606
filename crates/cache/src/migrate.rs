//! Forward-only schema migration.
//!
//! The schema version lives in SQLite's `user_version` header field,
//! which reads as zero on a freshly created file. Each step in [`STEPS`]
//! advances it by exactly one. A step's statements and its version bump
//! execute in a single transaction (`user_version` is part of the
//! database header and participates in the journal), so after a crash
//! the file is either before or after a step, never in between, and a
//! retry resumes from the last committed version.
//!
//! [`run`] is called once per open, before any store traffic.

use exn::ResultExt;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};

/// Schema version this build reads and writes.
pub(crate) const SCHEMA_VERSION: i64 = 2;

/// One forward migration.
///
/// `sql` must also be safe to re-run against a file still at
/// `version - 1` even if an earlier crashed attempt left structures
/// behind, so every statement is phrased to tolerate them
/// (`IF NOT EXISTS` on creates, `OR REPLACE` on copies, scratch
/// tables dropped before being recreated).
struct Step {
    /// Version this step produces.
    version: i64,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    // Original layout: probe info plus one fixed column per thumbnail
    // format, all in a single table.
    Step {
        version: 1,
        sql: "
            CREATE TABLE IF NOT EXISTS metadata (
                hash TEXT PRIMARY KEY,
                title TEXT,
                ffmpegInfo TEXT,
                jpegThumb BLOB,
                pngThumb BLOB
            );
        ",
    },
    // Generalize the fixed jpeg/png columns into a typed thumbnail
    // table. Every non-empty legacy value becomes exactly one row; the
    // metadata table is then rebuilt without the two columns (SQLite
    // table-rebuild idiom).
    Step {
        version: 2,
        sql: "
            CREATE TABLE IF NOT EXISTS thumbnails (
                hash TEXT NOT NULL,
                thumbType TEXT NOT NULL,
                thumbValue BLOB NOT NULL,
                PRIMARY KEY (hash, thumbType)
            );
            INSERT OR REPLACE INTO thumbnails (hash, thumbType, thumbValue)
                SELECT hash, 'jpeg', jpegThumb FROM metadata
                WHERE jpegThumb IS NOT NULL AND length(jpegThumb) > 0;
            INSERT OR REPLACE INTO thumbnails (hash, thumbType, thumbValue)
                SELECT hash, 'png', pngThumb FROM metadata
                WHERE pngThumb IS NOT NULL AND length(pngThumb) > 0;
            DROP TABLE IF EXISTS metadata_rebuild;
            CREATE TABLE metadata_rebuild (
                hash TEXT PRIMARY KEY,
                title TEXT,
                ffmpegInfo TEXT
            );
            INSERT INTO metadata_rebuild (hash, title, ffmpegInfo)
                SELECT hash, title, ffmpegInfo FROM metadata;
            DROP TABLE metadata;
            ALTER TABLE metadata_rebuild RENAME TO metadata;
        ",
    },
];

/// Bring the database behind `pool` up to [`SCHEMA_VERSION`].
///
/// Runs every step above the file's current version in ascending order.
/// A file already at the target runs zero steps; a file from a newer
/// build is refused outright.
#[instrument(name = "migrate", skip_all)]
pub(crate) async fn run(pool: &SqlitePool) -> Result<()> {
    let current = version(pool).await?;
    if current > SCHEMA_VERSION {
        exn::bail!(ErrorKind::UnsupportedSchema(current));
    }
    for step in STEPS.iter().filter(|step| step.version > current) {
        apply(pool, step).await?;
        debug!(version = step.version, "applied schema migration");
    }
    Ok(())
}

async fn apply(pool: &SqlitePool, step: &Step) -> Result<()> {
    let mut tx = pool.begin().await.or_raise(|| ErrorKind::Migration(step.version))?;
    sqlx::raw_sql(step.sql)
        .execute(&mut *tx)
        .await
        .or_raise(|| ErrorKind::Migration(step.version))?;
    let bump = format!("PRAGMA user_version = {}", step.version);
    sqlx::raw_sql(&bump).execute(&mut *tx).await.or_raise(|| ErrorKind::Migration(step.version))?;
    tx.commit().await.or_raise(|| ErrorKind::Migration(step.version))
}

/// Current schema version of the file; zero if never migrated.
pub(crate) async fn version(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .or_raise(|| ErrorKind::Database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    /// Pool over a fresh in-memory database with no migrations applied.
    async fn raw_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().filename(":memory:"))
            .await
            .unwrap()
    }

    /// Put the database into the version-1 (legacy single-table) state
    /// without going through the migration driver.
    async fn setup_legacy(pool: &SqlitePool) {
        sqlx::raw_sql(STEPS[0].sql).execute(pool).await.unwrap();
        sqlx::raw_sql("PRAGMA user_version = 1").execute(pool).await.unwrap();
    }

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    async fn column_names(pool: &SqlitePool, table: &str) -> Vec<String> {
        sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_file_runs_every_step() {
        let pool = raw_pool().await;
        run(&pool).await.unwrap();
        assert_eq!(version(&pool).await.unwrap(), SCHEMA_VERSION);
        assert_eq!(table_names(&pool).await, vec!["metadata", "thumbnails"]);
        // The legacy thumbnail columns created by step 1 are gone.
        assert_eq!(column_names(&pool, "metadata").await, vec!["hash", "title", "ffmpegInfo"]);
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let pool = raw_pool().await;
        run(&pool).await.unwrap();
        sqlx::query("INSERT INTO metadata (hash, title, ffmpegInfo) VALUES (?, ?, ?)")
            .bind("abc123")
            .bind("Some Film")
            .bind("{}")
            .execute(&pool)
            .await
            .unwrap();

        // Second run is a no-op: version and data untouched.
        run(&pool).await.unwrap();
        assert_eq!(version(&pool).await.unwrap(), SCHEMA_VERSION);
        let title: String = sqlx::query_scalar("SELECT title FROM metadata WHERE hash = 'abc123'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(title, "Some Film");
    }

    #[tokio::test]
    async fn test_legacy_thumbnails_are_preserved() {
        let pool = raw_pool().await;
        setup_legacy(&pool).await;
        // One hash with only a jpeg thumbnail; its png slot is NULL.
        sqlx::query("INSERT INTO metadata (hash, title, ffmpegInfo, jpegThumb, pngThumb) VALUES (?, ?, ?, ?, NULL)")
            .bind("abc123")
            .bind("Some Film")
            .bind("{}")
            .bind(&b"jpeg-bytes"[..])
            .execute(&pool)
            .await
            .unwrap();
        // And one whose thumbnail slots are both empty blobs.
        sqlx::query("INSERT INTO metadata (hash, title, ffmpegInfo, jpegThumb, pngThumb) VALUES (?, ?, ?, x'', x'')")
            .bind("def456")
            .bind("Other Film")
            .bind("{}")
            .execute(&pool)
            .await
            .unwrap();

        run(&pool).await.unwrap();

        // Exactly one thumbnail row comes out: the non-empty jpeg.
        let rows: Vec<(String, String, Vec<u8>)> =
            sqlx::query_as("SELECT hash, thumbType, thumbValue FROM thumbnails")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(rows, vec![("abc123".to_string(), "jpeg".to_string(), b"jpeg-bytes".to_vec())]);

        // Metadata survives the table rebuild.
        let titles: Vec<String> =
            sqlx::query_scalar("SELECT title FROM metadata ORDER BY hash").fetch_all(&pool).await.unwrap();
        assert_eq!(titles, vec!["Some Film", "Other Film"]);
    }

    #[tokio::test]
    async fn test_retry_after_simulated_crash() {
        let pool = raw_pool().await;
        setup_legacy(&pool).await;
        sqlx::query("INSERT INTO metadata (hash, title, ffmpegInfo, jpegThumb, pngThumb) VALUES (?, ?, ?, ?, NULL)")
            .bind("abc123")
            .bind("Some Film")
            .bind("{}")
            .bind(&b"jpeg-bytes"[..])
            .execute(&pool)
            .await
            .unwrap();
        // Emulate an interrupted step 2 that got as far as creating the
        // new table and the rebuild scratch table before dying, leaving
        // the version at 1.
        sqlx::raw_sql(
            "CREATE TABLE thumbnails (
                hash TEXT NOT NULL,
                thumbType TEXT NOT NULL,
                thumbValue BLOB NOT NULL,
                PRIMARY KEY (hash, thumbType)
            );
            CREATE TABLE metadata_rebuild (
                hash TEXT PRIMARY KEY,
                title TEXT,
                ffmpegInfo TEXT
            );
            INSERT INTO metadata_rebuild (hash, title, ffmpegInfo)
                VALUES ('abc123', 'Some Film', '{}');",
        )
        .execute(&pool)
        .await
        .unwrap();

        // The retry reaches the same end state as an uninterrupted run.
        run(&pool).await.unwrap();
        assert_eq!(version(&pool).await.unwrap(), SCHEMA_VERSION);
        let rows: Vec<(String, String, Vec<u8>)> =
            sqlx::query_as("SELECT hash, thumbType, thumbValue FROM thumbnails")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(rows, vec![("abc123".to_string(), "jpeg".to_string(), b"jpeg-bytes".to_vec())]);
    }

    #[tokio::test]
    async fn test_file_already_at_target_runs_zero_steps() {
        let pool = raw_pool().await;
        run(&pool).await.unwrap();
        // Drop a table behind the driver's back: a second run must not
        // touch the schema because the version says it's current.
        sqlx::raw_sql("DROP TABLE thumbnails").execute(&pool).await.unwrap();
        run(&pool).await.unwrap();
        assert_eq!(table_names(&pool).await, vec!["metadata"]);
    }

    #[tokio::test]
    async fn test_future_schema_version_is_refused() {
        let pool = raw_pool().await;
        sqlx::raw_sql("PRAGMA user_version = 99").execute(&pool).await.unwrap();
        let err = run(&pool).await.unwrap_err();
        assert!(err.to_string().contains("newer than this build"));
        // Version is left untouched; nothing was applied.
        assert_eq!(version(&pool).await.unwrap(), 99);
    }

    #[tokio::test]
    async fn test_steps_are_ordered_and_dense() {
        for (index, step) in STEPS.iter().enumerate() {
            assert_eq!(step.version, index as i64 + 1);
        }
        assert_eq!(STEPS.last().unwrap().version, SCHEMA_VERSION);
    }
}
