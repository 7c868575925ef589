//! Debounced typeahead search
//!
//! This example demonstrates how keystrokes turn into searches:
//! - A burst of keystrokes produces a single search for the final text
//! - Clearing the box clears the results without searching
//! - A final voice result searches immediately

use std::time::Duration;

use placeseek::{
    EngineConfigBuilder, LocationSearch, SearchSnapshot,
    providers::{CatalogSearchProvider, sample_catalog},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    placeseek::init_logging(tracing::Level::INFO)?;

    let catalog =
        CatalogSearchProvider::new(sample_catalog()).with_latency(Duration::from_millis(150));
    let search = LocationSearch::builder()
        .config(EngineConfigBuilder::responsive().build()?)
        .search_provider(catalog)
        .spawn()?;

    println!("Typing 'd', 'dr', 'dri', 'drinks':");
    for text in ["d", "dr", "dri", "drinks"] {
        search.handle_text_change(text);
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
    let snapshot = search
        .wait_for(|snapshot| snapshot.generation > 0 && !snapshot.is_searching)
        .await?;
    print_snapshot(&snapshot);

    println!("\nClearing the search box:");
    search.handle_text_change("");
    let snapshot = search.wait_for(|snapshot| snapshot.results.is_empty()).await?;
    print_snapshot(&snapshot);

    println!("\nSaying 'bakery' (final voice result):");
    search.handle_voice("bake", false);
    search.handle_voice("bakery", true);
    let snapshot = search
        .wait_for(|snapshot| snapshot.generation > 2 && !snapshot.is_searching)
        .await?;
    print_snapshot(&snapshot);

    search.shutdown();
    Ok(())
}

fn print_snapshot(snapshot: &SearchSnapshot) {
    println!(
        "  generation {} for {:?}: {} result(s)",
        snapshot.generation,
        snapshot.search_text,
        snapshot.results.len()
    );
    for place in &snapshot.results {
        println!(
            "    - {} ({}) {}",
            place.display_name(),
            place.category().unwrap_or("uncategorized"),
            place.phone_number().unwrap_or_default()
        );
    }
}
