//! Capability badges shown next to an operation

use serde::{Deserialize, Serialize};

/// Installation scope a package operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageScope {
    User,
    Machine,
}

/// Snapshot of how an operation is being run.
///
/// Purely informational: the scheduler never looks at badges when deciding
/// admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BadgeSet {
    pub as_administrator: bool,
    pub interactive: bool,
    pub skip_integrity_check: bool,
    pub scope: Option<PackageScope>,
}

impl BadgeSet {
    #[must_use]
    pub fn new(
        as_administrator: bool,
        interactive: bool,
        skip_integrity_check: bool,
        scope: Option<PackageScope>,
    ) -> Self {
        Self {
            as_administrator,
            interactive,
            skip_integrity_check,
            scope,
        }
    }
}
