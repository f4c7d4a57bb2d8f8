//! Object key convention shared by intake and the scan pipeline.
//!
//! Raw uploads live at `uploads/{object_id}/{original_name}`. Intake writes
//! keys in this shape and the trigger adapter derives `object_id` back from
//! them, so both sides go through this module.

use crate::error::PipelineError;

pub const UPLOAD_PREFIX: &str = "uploads";

/// Parsed form of an upload key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadKey<'a> {
    pub object_id: &'a str,
    pub original_name: &'a str,
}

/// Build the storage key for a freshly uploaded object.
pub fn upload_key(object_id: &str, original_name: &str) -> String {
    format!("{}/{}/{}", UPLOAD_PREFIX, object_id, original_name)
}

/// Parse an already decoded key.
pub fn parse_upload_key(key: &str) -> Result<UploadKey<'_>, PipelineError> {
    let malformed = || PipelineError::MalformedKey(key.to_string());

    let mut segments = key.split('/');
    let (Some(prefix), Some(object_id), Some(original_name), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(malformed());
    };

    if prefix != UPLOAD_PREFIX
        || object_id.is_empty()
        || original_name.is_empty()
        || object_id.contains("..")
        || original_name.contains("..")
    {
        return Err(malformed());
    }

    Ok(UploadKey {
        object_id,
        original_name,
    })
}
