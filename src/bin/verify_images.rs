use anyhow::Result;
use catalog_audit::config::{AuditConfig, RunArgs};
use catalog_audit::models::{Finding, FindingClass, ImageLookup, LoadedCatalog};
use catalog_audit::pipeline::{load_database_catalog, print_next_steps, reconcile_and_write, scan_images};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let args = RunArgs::from_env()?;
    if args.help {
        println!(
            "{}",
            RunArgs::usage(
                "verify_images",
                "Check every product's FeaturedImageUrl against the image folders."
            )
        );
        return Ok(());
    }
    let config = AuditConfig::load(&args)?;

    let database = load_database_catalog(&config).await?;
    let images = scan_images(&config)?;

    let output = reconcile_and_write(
        &config,
        &LoadedCatalog::empty("csv"),
        &database,
        &images,
        Some(&[FindingClass::MissingImage]),
        "verify_images",
        "Fix product image URLs",
    )?;

    let (mut fixable, mut missing) = (0, 0);
    for finding in &output.reconciliation.findings {
        if let Finding::MissingImage { lookup, .. } = finding {
            match lookup {
                ImageLookup::NotFound { .. } => missing += 1,
                _ => fixable += 1,
            }
        }
    }

    println!("\n=== IMAGE CHECK ===");
    println!("Products checked: {}", database.len());
    println!("Images on disk: {}", images.file_count());
    println!("✅ OK: {}", database.len().saturating_sub(fixable + missing));
    println!("🔧 URL fixable: {}", fixable);
    println!("❌ No image found: {}", missing);
    if missing > 0 && !config.catalog.delete_missing_images {
        println!("Set delete_missing_images = true to emit DELETE statements for these");
    }

    print_next_steps(&config, &output);
    Ok(())
}
