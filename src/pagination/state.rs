/// Pagination controller state definitions
///
/// Every controller moves through the same states; `Init` is initial, `Done`
/// and `Failed` are terminal.
use std::fmt;

/// Represents the current state of a pagination controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationState {
    /// Nothing loaded yet
    Init,

    /// A page is being loaded (fetch, click or scroll in flight)
    Fetching,

    /// The last returned document is being evaluated by the caller
    Evaluating,

    /// Deciding whether another cycle is needed
    Deciding,

    /// A cycle stalled or failed transiently and is being retried
    Retrying,

    /// Traversal finished normally
    Done,

    /// Traversal stopped on a non-recoverable error
    Failed,
}

impl PaginationState {
    /// Returns true if no further pages will be produced
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Fetching => "fetching",
            Self::Evaluating => "evaluating",
            Self::Deciding => "deciding",
            Self::Retrying => "retrying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaginationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// Every page was visited (URL templates, single pages)
    Completed,

    /// The "load more" button disappeared
    NoButton,

    /// The retry budget ran out without new items
    Stalled,

    /// The configured click or scroll count was reached
    CountReached,

    /// The configured stop element appeared
    StopElement,

    /// The hard cycle cap was reached
    CycleCap,

    /// A non-recoverable error ended the traversal
    Failed,
}

impl StopReason {
    /// Returns true for graceful endings
    pub fn is_graceful(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Completed => "completed",
            Self::NoButton => "no-button",
            Self::Stalled => "stalled",
            Self::CountReached => "count-reached",
            Self::StopElement => "stop-element",
            Self::CycleCap => "cycle-cap",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}
