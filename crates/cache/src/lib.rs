//! SQLite cache database for media metadata and thumbnails.
//!
//! This crate memoizes the results of expensive, deterministic work the
//! serving layer would otherwise repeat for the same content: probing a
//! media file and rendering thumbnails from it. Everything is keyed by
//! a content hash of the source file, computed outside this crate.
//! Entries are never evicted; they live as long as the database file.
//!
//! # Usage
//! [`Database::connect`] opens (or creates) the file and brings its
//! schema up to date before returning, so a [`Store`] built from the
//! handle always sees the current schema. The serving layer consults
//! [`Store::metadata`] / [`Store::thumbnail`] before doing the work and
//! writes the fresh result back afterwards.

mod db;
pub mod error;
mod migrate;
mod models;
mod store;

pub use crate::db::Database;
pub use crate::models::Metadata;
pub use crate::store::Store;
pub use reel_probe::ProbeInfo;
