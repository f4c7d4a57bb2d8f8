//! Shared API constants.

/// Prefix every route is mounted under.
pub const API_PREFIX: &str = "/api";

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Headroom for multipart boundaries and part headers on top of the file size limit.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Capacity of the channel feeding the inline worker.
pub const INLINE_QUEUE_CAPACITY: usize = 256;

/// Maximum number of requests handled concurrently.
pub const HTTP_CONCURRENCY_LIMIT: usize = 1024;
