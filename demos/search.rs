use clap::Parser;
use itunes_search::{Category, ItunesClient};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to search the store for
    term: String,

    /// Category filter: all, music, software or ebooks
    #[arg(short, long, default_value = "all")]
    category: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let category = args.category.parse::<Category>().unwrap_or_default();

    let client = ItunesClient::new("itunes-search-demo");
    println!("Searching the store for {:?} ({category})...", args.term);

    let results = client.search(&args.term, category).await?;
    if results.is_empty() {
        println!("Nothing found.");
        return Ok(());
    }

    for result in &results {
        let artist = if result.artist_name.is_empty() {
            "Unknown"
        } else {
            &result.artist_name
        };
        let price = result.price();
        let price_label = if price == 0.0 {
            "Free".to_string()
        } else {
            format!("{:.2} {}", price, result.currency)
        };
        println!(
            "  {} | {} ({}) | {}",
            result.name(),
            artist,
            result.type_label(),
            price_label
        );
    }
    println!("{} results", results.len());

    Ok(())
}
