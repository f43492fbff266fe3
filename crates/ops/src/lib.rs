#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Operation lifecycle for opsched
//!
//! An [`Operation`] pairs caller-supplied metadata with an
//! [`OperationBody`]. Calling [`Operation::run`] drives one lifecycle pass:
//!
//! 1. enter the shared [`AdmissionQueue`](opsched_queue::AdmissionQueue)
//!    and wait until admitted (or withdrawn by a cancel),
//! 2. run the body, again and again while it asks for `AutoRetry`,
//! 3. leave the queue and settle on `Succeeded`, `Failed` or `Canceled`.
//!
//! Every step is reported to the operation's observers. Anything that
//! escapes a pass, panics included, ends the operation as `Failed` instead of
//! reaching the caller.

mod body;
mod lifecycle;
mod operation;
mod reorder;
mod retry;

pub use body::{FnBody, OperationBody, DEFAULT_ICON};
pub use operation::{Operation, OperationBuilder};
pub use retry::RetryDispatch;
