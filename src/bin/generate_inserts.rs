use anyhow::Result;
use catalog_audit::config::{AuditConfig, RunArgs};
use catalog_audit::pipeline::{emitter_options, load_csv_or_empty, scan_images};
use catalog_audit::processor::{CategoryClassifier, Reconciler, SqlEmitter};
use catalog_audit::storage::{ReportWriter, SourceStats, StorageManager};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let args = RunArgs::from_env()?;
    if args.help {
        println!(
            "{}",
            RunArgs::usage(
                "generate_inserts",
                "Classify every CSV product and emit guarded INSERTs, without touching the database."
            )
        );
        return Ok(());
    }
    let config = AuditConfig::load(&args)?;

    let csv = load_csv_or_empty(&config.catalog.csv_path)?;
    let images = scan_images(&config)?;

    let classifier = CategoryClassifier::new()?;
    let reconciler = Reconciler::new(&classifier, &images);
    let proposals = reconciler.insert_proposals(&csv.products);

    let script = SqlEmitter::new(emitter_options(&config, "Insert products from CSV")).render(&proposals);

    let storage = StorageManager::new(&config.catalog.output_path)?;
    let sql_path = storage.write_text("product_inserts.sql", &script.text)?;

    let writer = ReportWriter::new(config.catalog.examples_per_class);
    let report = writer.render_classification_report(&proposals);
    let report_path = storage.write_text("classification_report.txt", &report)?;

    let stats = SourceStats::from(&csv);
    println!("\n=== INSERT GENERATION ===");
    println!("CSV rows: {}", stats.rows);
    println!("Products: {}", stats.loaded);
    println!("Duplicates skipped: {}", stats.duplicates);
    println!("Rejected rows: {}", stats.rejected.len());
    for rejected in stats.rejected.iter().take(config.catalog.examples_per_class) {
        println!("  line {}: {}", rejected.line, rejected.reason);
    }
    println!("{}", report);

    info!("✅ {} INSERT statements written to {}", script.inserted_skus.len(), sql_path.display());
    info!("✅ Classification report written to {}", report_path.display());
    Ok(())
}
