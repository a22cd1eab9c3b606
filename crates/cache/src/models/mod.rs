mod metadata;

pub use self::metadata::Metadata;
pub(crate) use self::metadata::MetadataRow;
