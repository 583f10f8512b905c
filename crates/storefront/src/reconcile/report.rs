//! Per-line results of a reconciliation pass.
//!
//! Sync-back is a batch of independent remote calls with no rollback. The
//! report records what happened to every line so a caller can show exactly
//! which lines failed to sync.

use core::fmt;

use cartwheel_core::{LineIdentity, ServerLineId, VariantId};

/// Remote operation issued for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Result of one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The call succeeded.
    Applied,
    /// The call failed; the reason is the gateway error message.
    Failed(String),
}

/// `{identity, operation, outcome}` for one line of a sync-back pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    pub identity: LineIdentity,
    pub operation: Operation,
    pub outcome: Outcome,
}

impl LineOutcome {
    /// Whether the call failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}

/// A remote line left out of a pass because its variant could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub server_line_id: ServerLineId,
    pub variant: VariantId,
    pub reason: String,
}

/// Category of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The remote cart could not be fetched.
    FetchFailed,
    /// One or more remote lines could not be resolved.
    ResolutionFailed,
    /// One or more sync-back calls failed.
    SyncFailed,
    /// The pass was refused because a cart broke the identity invariant.
    InvalidCart,
    /// The local cart could not be saved.
    StorageFailed,
}

/// A non-blocking, user-facing message produced by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub(crate) fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of sync-back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<LineOutcome>,
    pub skipped: Vec<SkippedLine>,
    pub notices: Vec<Notice>,
}

impl SyncReport {
    /// Number of remote calls issued.
    #[must_use]
    pub fn calls_issued(&self) -> usize {
        self.outcomes.len()
    }

    /// Calls that failed.
    pub fn failed(&self) -> impl Iterator<Item = &LineOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Calls of one kind.
    pub fn of(&self, operation: Operation) -> impl Iterator<Item = &LineOutcome> {
        self.outcomes.iter().filter(move |o| o.operation == operation)
    }

    /// True when every call succeeded and nothing was skipped or reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.notices.is_empty() && self.skipped.is_empty() && self.failed().next().is_none()
    }

    /// Whether the pass got as far as the remote cart.
    ///
    /// False when the remote cart could not be fetched or the local cart was
    /// refused; no call was issued in either case.
    #[must_use]
    pub fn reached_remote(&self) -> bool {
        !self
            .notices
            .iter()
            .any(|n| matches!(n.kind, NoticeKind::FetchFailed | NoticeKind::InvalidCart))
    }

    /// The aggregate warning for failed calls, if any call failed.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        let failed = self.failed().count();
        (failed > 0).then(|| {
            Notice::new(
                NoticeKind::SyncFailed,
                format!("Cart sync failed for {failed} item(s)"),
            )
        })
    }

    /// Outcome for a given line, if a call was issued for it.
    #[must_use]
    pub fn outcome_for(&self, identity: &LineIdentity) -> Option<&LineOutcome> {
        self.outcomes.iter().find(|o| &o.identity == identity)
    }
}

/// Result of merge-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Remote lines summed into existing local lines.
    pub merged: usize,
    /// Remote lines appended to the local cart.
    pub appended: usize,
    pub skipped: Vec<SkippedLine>,
    pub notices: Vec<Notice>,
}

impl MergeReport {
    /// True when the whole remote cart was folded in.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.notices.is_empty() && self.skipped.is_empty()
    }
}
