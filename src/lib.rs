#[cfg(feature = "searcher")]
pub mod searcher;
#[cfg(feature = "searcher")]
pub use searcher::{SearchOutcome, SearchState, Searcher};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use reqwest::{Client, Method, Request, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_with::{formats::Flexible, serde_as, DurationMilliSeconds};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("the store returned HTTP status {0}")]
    Status(StatusCode),
    #[error("empty search term")]
    EmptyTerm,
    #[cfg(feature = "searcher")]
    #[error("search task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Entity filter sent with every query. The store takes these as `entity=`
/// values; `All` sends the parameter empty.
#[derive(Hash, Copy, Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq, PartialOrd, Ord)]
pub enum Category {
    #[default]
    All,
    Music,
    Software,
    Ebooks,
}

impl Category {
    pub fn entity(&self) -> &'static str {
        match self {
            Category::All => "",
            Category::Music => "musicTrack",
            Category::Software => "software",
            Category::Ebooks => "ebook",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::All => write!(f, "All"),
            Category::Music => write!(f, "Music"),
            Category::Software => write!(f, "Software"),
            Category::Ebooks => write!(f, "E-books"),
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "" | "all" => Category::All,
            "music" | "musictrack" | "songs" => Category::Music,
            "software" | "apps" => Category::Software,
            "ebook" | "ebooks" | "e-books" => Category::Ebooks,
            _ => return Err(()),
        })
    }
}

/// One matched store item. The store omits fields freely depending on the
/// item kind, so everything it may leave out decodes to a default.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub artist_name: String,
    pub track_name: Option<String>,
    pub collection_name: Option<String>,
    pub kind: Option<String>,
    #[serde(default)]
    pub currency: String,
    pub track_price: Option<f64>,
    pub collection_price: Option<f64>,
    #[serde(rename = "price")]
    pub item_price: Option<f64>,
    pub track_view_url: Option<String>,
    pub collection_view_url: Option<String>,
    #[serde(default, rename = "artworkUrl60")]
    pub image_small: String,
    #[serde(default, rename = "artworkUrl100")]
    pub image_large: String,
    #[serde(rename = "primaryGenreName")]
    pub genre: Option<String>,
    /// Ebooks carry a genre list instead of `primaryGenreName`.
    #[serde(rename = "genres")]
    pub book_genres: Option<Vec<String>>,
    pub release_date: Option<DateTime<Utc>>,
    #[serde_as(as = "Option<DurationMilliSeconds<i64, Flexible>>")]
    #[serde(default, rename = "trackTimeMillis")]
    pub track_time: Option<Duration>,
}

impl SearchResult {
    /// Display name: the track title, falling back to the collection title.
    /// Audiobooks only carry the latter.
    pub fn name(&self) -> &str {
        self.track_name
            .as_deref()
            .or(self.collection_name.as_deref())
            .unwrap_or("")
    }

    /// Store page for the item, when the response carries one.
    pub fn store_url(&self) -> Option<&str> {
        self.track_view_url
            .as_deref()
            .or(self.collection_view_url.as_deref())
    }

    /// First price the response carries, 0.0 when the item has none.
    pub fn price(&self) -> f64 {
        self.track_price
            .or(self.collection_price)
            .or(self.item_price)
            .unwrap_or(0.0)
    }

    pub fn genre_label(&self) -> String {
        if let Some(genre) = &self.genre {
            genre.clone()
        } else if let Some(genres) = &self.book_genres {
            genres.join(", ")
        } else {
            String::new()
        }
    }

    /// Human readable label for the store's `kind` tag. Unmapped kinds pass
    /// through unchanged.
    pub fn type_label(&self) -> &str {
        match self.kind.as_deref() {
            Some("album") => "Album",
            Some("audiobook") => "Audio Book",
            Some("book") => "Book",
            Some("ebook") => "E-Book",
            Some("feature-movie") => "Movie",
            Some("music-video") => "Music Video",
            Some("podcast") => "Podcast",
            Some("software") => "App",
            Some("song") => "Song",
            Some("tv-episode") => "TV Episode",
            Some(other) => other,
            None => "",
        }
    }
}

/// Top-level object the store wraps every answer in.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    #[serde(default)]
    pub result_count: u32,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Clone)]
pub struct ItunesClient {
    client: Client,
    base_url: String,
}

impl ItunesClient {
    const ITUNES_BASE_URL: &'static str = "https://itunes.apple.com";
    /// Page size sent with every query; the store caps pages at 200 anyway.
    const RESULT_LIMIT: u32 = 200;

    pub fn new(user_agent: impl ToString) -> Self {
        Self::with_base_url(user_agent, Self::ITUNES_BASE_URL)
    }

    /// Point the client somewhere other than the real store, without a
    /// trailing slash. Tests aim this at a local server.
    pub fn with_base_url(user_agent: impl ToString, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .unwrap();

        ItunesClient {
            client,
            base_url: base_url.into(),
        }
    }

    /// Query URL for a term and category. `entity=` stays present but empty
    /// for [`Category::All`].
    pub fn search_url(&self, term: &str, category: Category) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}/search", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("term", term)
            .append_pair("limit", &Self::RESULT_LIMIT.to_string())
            .append_pair("entity", category.entity());
        Ok(url)
    }

    /// Runs one search against the store and returns the matches ordered by
    /// name. An empty `term` is refused up front.
    pub async fn search(
        &self,
        term: &str,
        category: Category,
    ) -> Result<Vec<SearchResult>, Error> {
        if term.is_empty() {
            return Err(Error::EmptyTerm);
        }
        let url = self.search_url(term, category)?;
        info!("searching the store: {url}");
        let response = self.client.execute(Request::new(Method::GET, url)).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Status(status));
        }
        // Decode from text rather than streaming so a bad body is a JSON
        // error, not a transport error.
        let envelope: ResultEnvelope = serde_json::from_str(&response.text().await?)?;
        let mut results = envelope.results;
        sort_by_name(&mut results);
        debug!("decoded {} results", results.len());
        Ok(results)
    }
}

/// Ascending, case insensitive order on the display name. Stable, so ties
/// keep their response order.
fn sort_by_name(results: &mut [SearchResult]) {
    results.sort_by_cached_key(|result| result.name().to_lowercase());
}
