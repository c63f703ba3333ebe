//! Local functions the voice model may call.
//!
//! The only tool is `updateSearchFilters`, which merges the model's
//! arguments into the shared [`SearchFilters`](crate::core::listings::SearchFilters)
//! and reports how many listings now match.

mod dispatcher;

pub use dispatcher::{
    ToolDispatcher, UPDATE_SEARCH_FILTERS, declarations, result_text,
    update_search_filters_declaration,
};
