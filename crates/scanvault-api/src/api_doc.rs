//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use scanvault_core::{EventLogEntry, ScanStatus, StorageLocator};

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ScanVault API",
        version = "0.1.0",
        description = "Upload files for malware scanning and query their scan status"
    ),
    paths(
        handlers::upload::upload_file,
        handlers::status::get_file_status,
    ),
    components(schemas(
        handlers::upload::UploadResponse,
        handlers::status::FileStatusResponse,
        ScanStatus,
        EventLogEntry,
        StorageLocator,
        error::ErrorResponse,
    )),
    tags(
        (name = "files", description = "File intake and scan status")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_routes() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/upload"));
        assert!(spec.paths.paths.contains_key("/api/file-status/{file_id}"));
    }
}
