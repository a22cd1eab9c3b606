use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use reel_probe::ProbeInfo;

/// Cached result of probing one media file.
///
/// There is at most one of these per content hash; the hash itself is
/// the lookup key and not part of the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Display title shown to clients. May be empty.
    pub title: String,
    /// Probe report for the file, stored serialized.
    pub probe: ProbeInfo,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MetadataRow {
    pub(crate) title: String,
    #[sqlx(rename = "ffmpegInfo")]
    pub(crate) ffmpeg_info: String,
}

impl TryFrom<&Metadata> for MetadataRow {
    type Error = Error;
    fn try_from(metadata: &Metadata) -> Result<Self, Self::Error> {
        Ok(Self {
            title: metadata.title.clone(),
            ffmpeg_info: serde_json::to_string(&metadata.probe)
                .or_raise(|| ErrorKind::InvalidData("probe info"))?,
        })
    }
}

impl TryFrom<MetadataRow> for Metadata {
    type Error = Error;
    fn try_from(row: MetadataRow) -> Result<Self, Self::Error> {
        Ok(Self {
            title: row.title,
            probe: serde_json::from_str(&row.ffmpeg_info)
                .or_raise(|| ErrorKind::InvalidData("probe info"))?,
        })
    }
}
