use anyhow::Result;
use catalog_audit::config::{AuditConfig, RunArgs};
use catalog_audit::models::{FindingClass, LoadedCatalog};
use catalog_audit::pipeline::{
    load_csv_or_empty, load_database_catalog, print_next_steps, reconcile_and_write, scan_images,
};
use catalog_audit::storage::StorageManager;
use polars::prelude::*;
use tracing::info;

/// Products present on both sides, one row each, with both prices.
fn matched_frame(csv: &LoadedCatalog, database: &LoadedCatalog) -> PolarsResult<DataFrame> {
    let mut skus = Vec::new();
    let mut names = Vec::new();
    let mut csv_prices = Vec::new();
    let mut database_prices = Vec::new();

    for (sku, product) in &csv.products {
        if let Some(stored) = database.products.get(sku) {
            skus.push(sku.to_string());
            names.push(stored.name.clone());
            csv_prices.push(product.price);
            database_prices.push(stored.price);
        }
    }

    df!(
        "sku" => skus,
        "name" => names,
        "csv_price" => csv_prices,
        "database_price" => database_prices,
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let args = RunArgs::from_env()?;
    if args.help {
        println!(
            "{}",
            RunArgs::usage(
                "update_prices",
                "Compare CSV prices with stored prices for products present on both sides."
            )
        );
        return Ok(());
    }
    let config = AuditConfig::load(&args)?;

    let csv = load_csv_or_empty(&config.catalog.csv_path)?;
    let database = load_database_catalog(&config).await?;
    let images = scan_images(&config)?;

    let mut matched = matched_frame(&csv, &database)?;
    let storage = StorageManager::new(&config.catalog.output_path)?;
    let matched_path = storage.write_csv("matched_products.csv", &mut matched)?;
    info!("✅ {} matched products written to {}", matched.height(), matched_path.display());

    let output = reconcile_and_write(
        &config,
        &csv,
        &database,
        &images,
        Some(&[FindingClass::PriceMismatch]),
        "update_prices",
        "Update product prices from CSV",
    )?;

    println!("\n=== PRICE CHECK ===");
    println!("Matched products: {}", matched.height());
    println!("Price differences: {}", output.reconciliation.findings.len());
    if !config.catalog.update_prices && !output.reconciliation.findings.is_empty() {
        println!("Set update_prices = true to emit UPDATE statements instead of comments");
    }

    print_next_steps(&config, &output);
    Ok(())
}
