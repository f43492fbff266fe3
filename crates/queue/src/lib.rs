#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Process-wide admission queue for opsched operations
//!
//! The queue is a single ordered list of operation ids shared by every
//! operation. Its order drives admission: the first `max_concurrent` entries
//! are admitted, everything after them waits. All mutation goes through the
//! methods of [`AdmissionQueue`], each of which holds one lock for its whole
//! read-modify-write, so reordering can never interleave with an insertion
//! or removal made by another operation's lifecycle.

mod builder;
mod queue;

pub use builder::AdmissionQueueBuilder;
pub use queue::{Admission, AdmissionQueue};
