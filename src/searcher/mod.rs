pub mod state;

pub use state::{SearchOutcome, SearchState};

use crate::{Category, Error, ItunesClient, SearchResult};
use futures::FutureExt;
use log::{debug, warn};
use tokio::task::{JoinError, JoinHandle};

/// Drives the store searches an app issues one at a time. At most one
/// request is ever in flight: starting a new search aborts the old one, and
/// a superseded request delivers nothing, ever. The network call runs on a
/// spawned tokio task; delivery happens only inside [`Searcher::poll`] or
/// [`Searcher::finish`], on the caller's own context.
pub struct Searcher {
    client: ItunesClient,
    state: SearchState,
    generation: u64,
    in_flight: Option<InFlight>,
}

struct InFlight {
    generation: u64,
    handle: JoinHandle<Result<Vec<SearchResult>, Error>>,
}

impl Searcher {
    pub fn new(client: ItunesClient) -> Self {
        Searcher {
            client,
            state: SearchState::default(),
            generation: 0,
            in_flight: None,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// True from [`Searcher::begin`] until the outcome has been delivered.
    pub fn is_searching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Kicks off a search, superseding whatever is still in flight. An empty
    /// term is a no-op. Must be called from within a tokio runtime.
    pub fn begin(&mut self, term: &str, category: Category) {
        if term.is_empty() {
            return;
        }
        self.abort_in_flight();
        self.generation += 1;
        self.state = SearchState::Loading;
        debug!("search generation {} started for {term:?}", self.generation);
        let client = self.client.clone();
        let term = term.to_owned();
        let handle = tokio::spawn(async move { client.search(&term, category).await });
        self.in_flight = Some(InFlight {
            generation: self.generation,
            handle,
        });
    }

    /// Delivers the outcome of the current search if it has arrived, without
    /// blocking. `None` while idle or still loading. Call this from the same
    /// context that renders [`Searcher::state`].
    pub fn poll(&mut self) -> Option<SearchOutcome> {
        if !self.in_flight.as_ref()?.handle.is_finished() {
            return None;
        }
        let pending = self.in_flight.take()?;
        let joined = pending.handle.now_or_never()?;
        self.deliver(pending.generation, joined)
    }

    /// Waits for the current search and delivers its outcome. `None` when
    /// nothing is in flight.
    pub async fn finish(&mut self) -> Option<SearchOutcome> {
        let pending = self.in_flight.take()?;
        let joined = pending.handle.await;
        self.deliver(pending.generation, joined)
    }

    fn deliver(
        &mut self,
        generation: u64,
        joined: Result<Result<Vec<SearchResult>, Error>, JoinError>,
    ) -> Option<SearchOutcome> {
        // A result that is not from the newest search gets dropped here no
        // matter how the abort raced.
        if generation != self.generation {
            debug!("dropping superseded search generation {generation}");
            return None;
        }
        match joined {
            Ok(Ok(results)) => {
                self.state = if results.is_empty() {
                    SearchState::NoResults
                } else {
                    SearchState::Results(results)
                };
                Some(SearchOutcome::Completed)
            }
            Ok(Err(error)) => {
                warn!("search generation {generation} failed: {error}");
                self.state = SearchState::NotSearchedYet;
                Some(SearchOutcome::Failed(error))
            }
            Err(join_error) if join_error.is_cancelled() => None,
            Err(join_error) => {
                warn!("search generation {generation} panicked: {join_error}");
                self.state = SearchState::NotSearchedYet;
                Some(SearchOutcome::Failed(join_error.into()))
            }
        }
    }

    fn abort_in_flight(&mut self) {
        if let Some(pending) = self.in_flight.take() {
            debug!("superseding search generation {}", pending.generation);
            pending.handle.abort();
        }
    }
}

impl Drop for Searcher {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const TWO_SONGS: &str = r#"{"resultCount":2,"results":[
        {"kind":"song","trackName":"Fix You","artistName":"Coldplay","currency":"USD"},
        {"kind":"song","trackName":"Clocks","artistName":"Coldplay","currency":"USD"}
    ]}"#;
    const NOTHING: &str = r#"{"resultCount":0,"results":[]}"#;

    async fn start_store(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn searcher_for(base_url: &str) -> Searcher {
        Searcher::new(ItunesClient::with_base_url("itunes-search-tests", base_url))
    }

    #[tokio::test]
    async fn test_one_request_and_one_delivery_per_search() {
        let hits = Arc::new(AtomicUsize::new(0));
        let handler_hits = hits.clone();
        let app = Router::new().route(
            "/search",
            get(move |_params: Query<HashMap<String, String>>| {
                let hits = handler_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    TWO_SONGS
                }
            }),
        );
        let mut searcher = searcher_for(&start_store(app).await);

        searcher.begin("coldplay", Category::Music);
        assert!(searcher.state().is_loading());
        assert!(searcher.is_searching());

        let outcome = searcher.finish().await.expect("one delivery");
        assert!(outcome.is_success());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(searcher.state().results().len(), 2);
        // Sorted by the client before delivery.
        assert_eq!(searcher.state().results()[0].name(), "Clocks");

        assert!(!searcher.is_searching());
        assert!(searcher.poll().is_none());
        assert!(searcher.finish().await.is_none());
    }

    #[tokio::test]
    async fn test_a_superseded_search_never_delivers() {
        let app = Router::new().route(
            "/search",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if params.get("term").is_some_and(|term| term.contains("slow")) {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    return r#"{"resultCount":1,"results":[{"trackName":"Wrong Song"}]}"#;
                }
                TWO_SONGS
            }),
        );
        let mut searcher = searcher_for(&start_store(app).await);

        searcher.begin("something slow", Category::All);
        searcher.begin("coldplay", Category::Music);

        let outcome = searcher.finish().await.expect("delivery for the newer search");
        assert!(outcome.is_success());
        assert_eq!(searcher.state().results().len(), 2);
        assert_eq!(searcher.state().results()[0].name(), "Clocks");

        // The superseded search must stay silent forever.
        assert!(searcher.poll().is_none());
        assert!(searcher.finish().await.is_none());
    }

    #[tokio::test]
    async fn test_poll_delivers_exactly_once() {
        let app = Router::new().route("/search", get(|| async { TWO_SONGS }));
        let mut searcher = searcher_for(&start_store(app).await);

        searcher.begin("coldplay", Category::All);
        let outcome = loop {
            if let Some(outcome) = searcher.poll() {
                break outcome;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert!(outcome.is_success());
        assert_eq!(searcher.state().results().len(), 2);
        assert!(searcher.poll().is_none());
    }

    #[tokio::test]
    async fn test_an_empty_answer_is_no_results() {
        let app = Router::new().route("/search", get(|| async { NOTHING }));
        let mut searcher = searcher_for(&start_store(app).await);

        searcher.begin("unheard of band", Category::Music);
        let outcome = searcher.finish().await.expect("one delivery");
        assert!(outcome.is_success());
        assert!(matches!(searcher.state(), SearchState::NoResults));
        assert!(searcher.state().results().is_empty());
    }

    #[tokio::test]
    async fn test_a_garbage_answer_reverts_the_state() {
        let app = Router::new().route("/search", get(|| async { "<!DOCTYPE html><html></html>" }));
        let mut searcher = searcher_for(&start_store(app).await);

        searcher.begin("coldplay", Category::All);
        match searcher.finish().await {
            Some(SearchOutcome::Failed(Error::JsonError(_))) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(searcher.state(), SearchState::NotSearchedYet));
    }

    #[tokio::test]
    async fn test_a_server_error_reverts_the_state() {
        let app = Router::new().route(
            "/search",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "down") }),
        );
        let mut searcher = searcher_for(&start_store(app).await);

        searcher.begin("coldplay", Category::All);
        match searcher.finish().await {
            Some(SearchOutcome::Failed(Error::Status(status))) => assert_eq!(status.as_u16(), 500),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(searcher.state(), SearchState::NotSearchedYet));
    }

    #[tokio::test]
    async fn test_an_empty_term_is_a_no_op() {
        let hits = Arc::new(AtomicUsize::new(0));
        let handler_hits = hits.clone();
        let app = Router::new().route(
            "/search",
            get(move |_params: Query<HashMap<String, String>>| {
                let hits = handler_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    TWO_SONGS
                }
            }),
        );
        let mut searcher = searcher_for(&start_store(app).await);

        searcher.begin("", Category::All);
        assert!(!searcher.is_searching());
        assert!(matches!(searcher.state(), SearchState::NotSearchedYet));
        assert!(searcher.finish().await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
