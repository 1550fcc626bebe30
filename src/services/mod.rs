pub mod debounce;
pub mod listeners;
pub mod live_query;
pub mod predicate;
pub mod quick_filters;
pub mod record_index;
pub mod record_store;
pub mod search_session;
pub mod text_matcher;

pub use debounce::Debouncer;
pub use listeners::{Listeners, SubscriptionId};
pub use live_query::{
    Completion, EventOutcome, Generation, LiveQuery, LiveSnapshot, ModeCounts, ModePredicates,
    QueryFailure, RefreshRequest, RefreshResult,
};
pub use predicate::{Clock, ManualClock, Predicate, PredicateCompiler, SystemClock};
pub use quick_filters::QuickFilters;
pub use record_index::RecordIndex;
pub use record_store::{Counted, InMemoryStore, Page, RecordStore, Revision, StoreEvent};
pub use search_session::{SearchSession, SessionUpdate};
pub use text_matcher::{CompiledText, MatcherStats, TextMatcher};
