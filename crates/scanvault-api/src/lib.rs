//! ScanVault API Library
//!
//! Intake (multipart upload into the raw store plus the initial PENDING
//! ledger record) and the status query surface over the ledger.

mod api_doc;
pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod validation;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
