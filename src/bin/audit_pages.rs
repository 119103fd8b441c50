use anyhow::Result;
use catalog_audit::config::{AuditConfig, RunArgs};
use catalog_audit::fetcher::PageFetcher;
use catalog_audit::processor::PageAnalyzer;
use catalog_audit::storage::{PageAuditReport, ReportWriter, StorageManager};
use chrono::Utc;
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
                "audit_pages",
                "Fetch each listing page of the running storefront and check what it renders."
            )
        );
        return Ok(());
    }
    let config = AuditConfig::load(&args)?;
    let site = &config.site;

    info!("🌐 Auditing {} pages on {}", site.pages.len(), site.base_url);
    let analyzer = PageAnalyzer::new(&site.selectors, site.page_size, site.hardcoded_threshold)?;
    let fetcher = PageFetcher::new(site)?;
    let audits = fetcher.audit_pages(&analyzer).await?;

    let writer = ReportWriter::new(config.catalog.examples_per_class);
    println!("{}", writer.render_page_summary(&audits));

    let report = PageAuditReport::new(Utc::now().to_rfc3339(), &site.base_url, &audits);
    let storage = StorageManager::new(&config.catalog.output_path)?;
    let path = storage.write_json("view_rendering_report.json", &report)?;
    info!("✅ Report written to {}", path.display());

    println!(
        "\n{} ok, {} warnings, {} errors",
        report.ok, report.warnings, report.errors
    );
    Ok(())
}
