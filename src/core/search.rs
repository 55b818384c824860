use crate::models::{SearchRequest, SearchResponse, SearchResult};
use crate::services::{ApiError, Backend};
use reqwest::Method;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Notice shown when a blank query is submitted
pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a name to search";

/// Observable state of a name search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchState {
    #[default]
    Idle,
    /// The last query was blank; nothing was sent
    Rejected { message: String },
    Searching { query: String },
    Success { query: String, results: Vec<SearchResult> },
    /// The backend answered with no matches
    Empty { query: String },
    Failed { query: String, error: ApiError },
}

impl SearchState {
    /// Pure transition function
    ///
    /// A resolution only lands on the matching `Searching` state; anything
    /// else leaves the state untouched.
    pub fn apply(self, event: SearchEvent) -> SearchState {
        match (self, event) {
            (_, SearchEvent::Reset) => SearchState::Idle,
            (_, SearchEvent::QueryRejected) => SearchState::Rejected {
                message: EMPTY_QUERY_MESSAGE.to_string(),
            },
            (_, SearchEvent::QueryIssued(query)) => SearchState::Searching { query },
            (SearchState::Searching { query }, SearchEvent::Resolved { query: answered, outcome })
                if query == answered =>
            {
                match outcome {
                    Ok(results) if results.is_empty() => SearchState::Empty { query },
                    Ok(results) => SearchState::Success { query, results },
                    Err(error) => SearchState::Failed { query, error },
                }
            }
            (state, SearchEvent::Resolved { .. }) => state,
        }
    }

    pub fn is_searching(&self) -> bool {
        matches!(self, SearchState::Searching { .. })
    }

    /// Results currently on display
    pub fn results(&self) -> &[SearchResult] {
        match self {
            SearchState::Success { results, .. } => results.as_slice(),
            _ => &[],
        }
    }
}

/// Inputs to [`SearchState::apply`]
#[derive(Debug, Clone)]
pub enum SearchEvent {
    QueryRejected,
    QueryIssued(String),
    Resolved {
        query: String,
        outcome: Result<Vec<SearchResult>, ApiError>,
    },
    Reset,
}

/// Search workflow
///
/// Every submitted query takes a new sequence number. A response is applied
/// only if its sequence number is still the latest when it arrives, so a
/// slow earlier search can never overwrite a later one. Results are cleared
/// as soon as a new query is issued.
pub struct SearchWorkflow<B> {
    backend: Arc<B>,
    sequence: AtomicU64,
    state: watch::Sender<SearchState>,
}

impl<B: Backend> SearchWorkflow<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (state, _) = watch::channel(SearchState::Idle);
        Self {
            backend,
            sequence: AtomicU64::new(0),
            state,
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// Sequence number of the most recently submitted query
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Submit a raw query and wait for its outcome
    ///
    /// Returns the state after the response was handled. When a newer query
    /// was submitted meanwhile, the response is dropped and the returned
    /// state is whatever the newer query has produced so far.
    pub async fn submit_query(&self, raw: &str) -> SearchState {
        let request = SearchRequest::from_input(raw);

        let mut issued = 0;
        self.state.send_modify(|state| {
            issued = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let event = match &request {
                Some(request) => SearchEvent::QueryIssued(request.name.clone()),
                None => SearchEvent::QueryRejected,
            };
            *state = std::mem::take(state).apply(event);
        });

        let Some(request) = request else {
            tracing::debug!("Rejected blank search query (#{})", issued);
            return self.state();
        };

        tracing::info!("Searching for \"{}\" (#{})", request.name, issued);

        let outcome = self.fetch(&request).await;
        if let Err(e) = &outcome {
            tracing::warn!("Search for \"{}\" failed: {}", request.name, e);
        }

        let applied = self.state.send_if_modified(|state| {
            if self.sequence.load(Ordering::SeqCst) != issued {
                return false;
            }
            *state = std::mem::take(state).apply(SearchEvent::Resolved {
                query: request.name.clone(),
                outcome,
            });
            true
        });

        if applied {
            tracing::debug!("Applied search response for \"{}\" (#{})", request.name, issued);
        } else {
            tracing::debug!("Discarding stale search response for \"{}\" (#{})", request.name, issued);
        }

        self.state()
    }

    /// Return to `Idle`, superseding any in-flight query
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            self.sequence.fetch_add(1, Ordering::SeqCst);
            *state = std::mem::take(state).apply(SearchEvent::Reset);
        });
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ApiError> {
        let json = self.backend.request(Method::GET, &request.path(), None).await?;

        let response: SearchResponse = serde_json::from_value(json)
            .map_err(|e| ApiError::parse(format!("Unexpected search response: {}", e)))?;

        Ok(response.into_results())
    }
}
