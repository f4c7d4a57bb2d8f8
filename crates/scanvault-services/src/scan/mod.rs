//! Per-object scan pipeline stages: guard, executor, verdict mapping and
//! promotion to the trusted store.

pub mod executor;
pub mod guard;
pub mod publisher;
pub mod verdict;
