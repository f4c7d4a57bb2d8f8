//! ScanVault Storage Library
//!
//! Storage abstraction over one container (an S3 bucket or a local
//! directory). The service holds two of them: the raw intake store that
//! receives uploads and the optional trusted store that receives objects
//! verified CLEAN.
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, create_trusted_storage};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use scanvault_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
