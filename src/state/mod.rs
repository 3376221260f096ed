//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `PaginationState`: where a category's listing traversal currently is
//! - `EndReason`: why a traversal stopped
//! - `FetchStatus`: how complete an item's extraction was

mod fetch_status;
mod pagination_state;

// Re-export main types
pub use fetch_status::FetchStatus;
pub use pagination_state::{EndReason, PaginationState};
