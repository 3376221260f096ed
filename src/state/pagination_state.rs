/// Listing pagination states
///
/// This module defines the states a category's listing traversal moves through,
/// and the reasons a traversal can end.
use std::fmt;

/// Represents the current state of a category listing traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationState {
    // ===== Active States =====
    /// The current listing page is about to be fetched
    FetchPage,

    /// A listing page body is held and its item links are being read
    ExtractStubs,

    /// Deciding whether another listing page should be fetched
    Advance,

    // ===== Terminal States =====
    /// Traversal finished normally (cap met, page cap hit, or listing exhausted)
    Done,

    /// Traversal gave up after a fetch failure or cancellation
    Aborted,
}

impl PaginationState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::FetchPage => "fetch_page",
            Self::ExtractStubs => "extract_stubs",
            Self::Advance => "advance",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetch_page" => Some(Self::FetchPage),
            "extract_stubs" => Some(Self::ExtractStubs),
            "advance" => Some(Self::Advance),
            "done" => Some(Self::Done),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

impl fmt::Display for PaginationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Why a listing traversal reached a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// The category's item cap was met
    CapReached,

    /// The per-category page cap was met
    PageCapReached,

    /// The listing has no further page
    Exhausted,

    /// A listing page could not be fetched within the retry budget
    FetchFailed,

    /// The run was cancelled
    Cancelled,
}

impl EndReason {
    /// The terminal state this reason leads to
    pub fn terminal_state(&self) -> PaginationState {
        match self {
            Self::CapReached | Self::PageCapReached | Self::Exhausted => PaginationState::Done,
            Self::FetchFailed | Self::Cancelled => PaginationState::Aborted,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::CapReached => "cap_reached",
            Self::PageCapReached => "page_cap_reached",
            Self::Exhausted => "exhausted",
            Self::FetchFailed => "fetch_failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "cap_reached" => Some(Self::CapReached),
            "page_cap_reached" => Some(Self::PageCapReached),
            "exhausted" => Some(Self::Exhausted),
            "fetch_failed" => Some(Self::FetchFailed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
