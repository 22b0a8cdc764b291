use clap::Parser;
use itunes_search::{Category, ItunesClient, SearchOutcome, SearchState, Searcher};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to search the store for
    term: String,

    /// Category filter: all, music, software or ebooks
    #[arg(short, long, default_value = "all")]
    category: String,
}

/// The whole "UI": a plain function of the search state.
fn render(state: &SearchState) {
    match state {
        SearchState::NotSearchedYet => println!("(nothing searched yet)"),
        SearchState::Loading => println!("Searching..."),
        SearchState::NoResults => println!("Nothing found."),
        SearchState::Results(results) => {
            for result in results {
                println!("  {} ({})", result.name(), result.type_label());
            }
            println!("{} results", results.len());
        }
    }
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    let args = Args::parse();

    let mut searcher = Searcher::new(ItunesClient::new("itunes-search-demo"));
    render(searcher.state());

    // A throwaway query first; the real one supersedes it, so its answer is
    // never delivered.
    searcher.begin("the wrong search", Category::All);
    searcher.begin(&args.term, args.category.parse().unwrap_or_default());
    render(searcher.state());

    // Deliver the way a frame loop would, polling between redraws.
    let outcome = loop {
        if let Some(outcome) = searcher.poll() {
            break outcome;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    };

    match outcome {
        SearchOutcome::Completed => render(searcher.state()),
        SearchOutcome::Failed(error) => {
            eprintln!("There was an error accessing the store: {error}");
        }
    }
}
