//! Searching near the current location
//!
//! This example demonstrates the "search near me" flow:
//! - Without permission the engine only asks for it
//! - Once authorized, the engine waits for a location fix before searching
//! - Nearby results are ordered nearest first

use std::time::Duration;

use placeseek::{
    DEFAULT_CENTER, LocationSearch,
    providers::{
        CatalogSearchProvider, LocationProvider, ManualLocationProvider, PermissionPrompt,
        sample_catalog,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    placeseek::init_logging(tracing::Level::INFO)?;

    // The user will grant permission, and the device needs a moment to get a fix
    let location = ManualLocationProvider::new().with_prompt(PermissionPrompt::Grant);
    location.stage_fix(DEFAULT_CENTER, Duration::from_millis(700));

    let search = LocationSearch::builder()
        .search_provider(CatalogSearchProvider::new(sample_catalog()))
        .location_provider(location.clone())
        .spawn()?;

    println!("First nearby search (not yet authorized):");
    search.search_nearby();
    search.wait_for(|snapshot| snapshot.generation == 1).await?;
    println!(
        "  authorization is now {}, {} permission request(s)",
        location.authorization_state(),
        location.permission_requests()
    );

    println!("\nSecond nearby search (authorized, waiting for a fix):");
    search.search_nearby();
    let snapshot = search
        .wait_for(|snapshot| snapshot.generation == 2 && !snapshot.is_searching)
        .await?;

    println!("  search text: {:?}", snapshot.search_text);
    for place in &snapshot.results {
        println!(
            "    - {:<28} {:>5.0} m  {}",
            place.display_name(),
            DEFAULT_CENTER.distance_to(&place.coordinate()),
            place.address_line()
        );
    }

    search.shutdown();
    Ok(())
}
