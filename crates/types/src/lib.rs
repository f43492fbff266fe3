#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the opsched operation scheduler
//!
//! This crate provides the vocabulary shared by every other crate: operation
//! identifiers, statuses and verdicts, log line kinds, retry modes, capability
//! badges and the human-readable metadata an operation must carry.

pub mod badges;
pub mod log;
pub mod metadata;
pub mod retry;
pub mod status;

pub use badges::{BadgeSet, PackageScope};
pub use log::{LineKind, LogLine};
pub use metadata::{OperationId, OperationMetadata};
pub use retry::RetryMode;
pub use status::{OperationStatus, Verdict};
pub use uuid::Uuid;
