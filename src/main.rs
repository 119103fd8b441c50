use anyhow::Result;
use catalog_audit::config::{AuditConfig, RunArgs};
use catalog_audit::pipeline::{
    load_csv_or_empty, load_database_catalog, print_next_steps, reconcile_and_write, scan_images,
};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let args = RunArgs::from_env()?;
    if args.help {
        println!(
            "{}",
            RunArgs::usage(
                "catalog-audit",
                "Reconcile the product CSV, the products table and the image folders into one SQL fix script."
            )
        );
        return Ok(());
    }

    let config = AuditConfig::load(&args)?;
    info!("🚀 Starting catalog reconciliation");
    info!("CSV: {}", config.catalog.csv_path.display());
    info!("Images: {}", config.catalog.image_root.display());
    info!("Output: {}", config.catalog.output_path.display());

    let csv = load_csv_or_empty(&config.catalog.csv_path)?;
    let database = load_database_catalog(&config).await?;
    let images = scan_images(&config)?;

    let output = reconcile_and_write(
        &config,
        &csv,
        &database,
        &images,
        None,
        "catalog_reconciliation",
        "Catalog reconciliation: missing products, categories, images, prices",
    )?;

    print_next_steps(&config, &output);
    Ok(())
}
