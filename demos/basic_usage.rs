//! Basic usage example for address-rs.
//!
//! This example demonstrates the core functionality of the library:
//! - Assembling addresses from structured geocoder payloads
//! - Deduplication of shared components
//! - Raw-only addresses and later lookups
//! - Consistency checks over the whole store
//!
//! Run with: RUST_LOG=address_rs=debug cargo run --example basic_usage

use address_rs::{AddressBook, AddressInput, Error, GeocodePayload, Geometry, PayloadComponent};
use tracing_subscriber::EnvFilter;

fn victoria(raw: &str, number: &str, route: &str, locality: &str, postcode: &str) -> GeocodePayload {
    GeocodePayload {
        raw: Some(raw.to_string()),
        formatted_address: Some(format!("{number} {route}, {locality} VIC {postcode}, Australia")),
        address_components: vec![
            PayloadComponent::new(&["street_number"], number, number),
            PayloadComponent::new(&["route"], route, route),
            PayloadComponent::new(&["locality", "political"], locality, locality),
            PayloadComponent::new(
                &["administrative_area_level_1", "political"],
                "Victoria",
                "VIC",
            ),
            PayloadComponent::new(&["country", "political"], "Australia", "AU"),
            PayloadComponent::new(&["postal_code"], postcode, postcode),
        ],
        geometry: Some(Geometry::at(-37.77, 144.99)),
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("address-rs Basic Usage Example");
    println!("==============================\n");

    let book = AddressBook::new();

    // Example 1: Structured payloads
    println!("1. Assembling Structured Payloads");
    println!("---------------------------------");

    let northcote = book
        .to_address(victoria("2 Smith St, Northcote VIC 3070", "2", "Smith St", "Northcote", "3070"), None)?
        .ok_or_else(|| Error::invalid_value("empty payload"))?;
    let fitzroy = book
        .to_address(victoria("5 Brunswick St, Fitzroy VIC 3065", "5", "Brunswick St", "Fitzroy", "3065"), None)?
        .ok_or_else(|| Error::invalid_value("empty payload"))?;

    for address in [&northcote, &fitzroy] {
        println!("{} ({})", address, address.id);
        println!("  height: {}, consistent: {}", address.height, address.consistent);
        for component in book.component_chain(address)? {
            println!("  {:>6} {:?} {}", component.id.0, component.kind, component.long_name);
        }
    }
    println!(
        "{} components stored for 2 addresses\n",
        book.store().component_count()
    );

    // Example 2: Raw strings and flat form data
    println!("2. Raw Strings and Form Fields");
    println!("------------------------------");

    let raw = book
        .to_address("Flinders St Station, Melbourne", None)?
        .ok_or_else(|| Error::invalid_value("empty string"))?;
    println!("Raw only: {} (components: {})", raw, raw.components.len());

    let form = AddressInput::try_from(serde_json::json!({
        "raw": "1 Somewhere Street, Northcote",
        "street_number": "1",
        "route": "Somewhere Street",
        "locality": "Northcote",
        "state": "Victoria",
        "state_code": "VIC",
        "country": "Australia",
        "country_code": "AU",
    }))?;
    if let Some(address) = book.to_address(form, None)? {
        let summary = book.summary(&address)?;
        println!("Form: {} -> {:?}, {:?}", address, summary.locality, summary.state_code);
    }
    println!();

    // Example 3: Maintenance
    println!("3. Maintenance");
    println!("--------------");

    let report = book.check_consistency()?;
    println!(
        "Checked {} addresses, {} inconsistent",
        report.checked,
        report.inconsistent.len()
    );

    let stats = book.stats().summary();
    println!(
        "Components created: {}, reused: {} ({:.0}% reuse)",
        stats.components_created,
        stats.components_reused,
        stats.component_reuse_ratio() * 100.0
    );
    println!("Raw fallbacks: {}", stats.raw_fallbacks);
    println!();

    println!("All examples completed successfully!");

    Ok(())
}
