use anyhow::Result;
use catalog_audit::config::{AuditConfig, RunArgs};
use catalog_audit::models::{FindingClass, LoadedCatalog};
use catalog_audit::pipeline::{load_database_catalog, print_next_steps, reconcile_and_write, scan_images};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let args = RunArgs::from_env()?;
    if args.help {
        println!(
            "{}",
            RunArgs::usage("fix_categories", "Re-classify every database product and emit category UPDATEs.")
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
        Some(&[FindingClass::CategoryMismatch]),
        "fix_categories",
        "Fix product categories",
    )?;

    println!(
        "\n{} of {} products need a new category",
        output.reconciliation.findings.len(),
        database.len()
    );
    print_next_steps(&config, &output);
    Ok(())
}
