use crate::{Error, SearchResult};

/// What the app knows about the most recent search. Exactly one variant
/// holds at a time; rendering is a plain match over it.
#[derive(Debug, Clone, Default)]
pub enum SearchState {
    /// Nothing searched since startup, or the last search failed.
    #[default]
    NotSearchedYet,
    /// A request is in flight.
    Loading,
    /// The store answered with an empty result list.
    NoResults,
    /// The store matched something. The list is sorted and never empty.
    Results(Vec<SearchResult>),
}

impl SearchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SearchState::Loading)
    }

    /// The matched items, or an empty slice in every other state.
    pub fn results(&self) -> &[SearchResult] {
        match self {
            SearchState::Results(results) => results,
            _ => &[],
        }
    }
}

/// Delivered exactly once for every search that was not superseded.
#[derive(Debug)]
pub enum SearchOutcome {
    /// The store answered; the searcher state holds what it said.
    Completed,
    /// The store could not be reached or answered garbage. The state is
    /// back to [`SearchState::NotSearchedYet`].
    Failed(Error),
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchOutcome::Completed)
    }
}
