//! Search coordination
//!
//! - [`debounce`]: collapses keystrokes into settled queries
//! - [`coordinator`]: owns the current generation, dispatches provider calls and
//!   publishes [`SearchSnapshot`]s
//! - [`rank`]: distance ordering for nearby results
pub mod coordinator;
pub mod debounce;
pub mod rank;

pub use coordinator::{Applied, Completion, Generation, SearchCoordinator, SearchQuery, SearchSnapshot};
pub use debounce::{DebounceController, DebounceEvent, DebounceTick};
pub use rank::rank_by_distance;
