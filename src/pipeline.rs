use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::AuditConfig;
use crate::fetcher::{DbFetcher, load_csv_catalog, load_export_catalog};
use crate::models::{FindingClass, LoadedCatalog};
use crate::processor::{
    CategoryClassifier, Reconciler, Reconciliation, SqlEmitter, SqlEmitterOptions, SqlScript,
};
use crate::storage::{ImageIndex, ReconciliationReport, ReportWriter, SourceStats, StorageManager};

/// A missing product CSV is logged and treated as an empty catalog.
pub fn load_csv_or_empty(path: &Path) -> Result<LoadedCatalog> {
    if !path.exists() {
        error!("❌ Product CSV not found: {}, continuing with an empty catalog", path.display());
        return Ok(LoadedCatalog::empty("csv"));
    }
    load_csv_catalog(path)
}

/// The database side: a configured export file, otherwise a live query.
pub async fn load_database_catalog(config: &AuditConfig) -> Result<LoadedCatalog> {
    if let Some(export) = &config.catalog.db_export_path {
        if !export.exists() {
            error!(
                "❌ Database export not found: {}, continuing with an empty catalog",
                export.display()
            );
            return Ok(LoadedCatalog::empty("database"));
        }
        return load_export_catalog(export);
    }

    let fetcher = DbFetcher::connect(&config.database).await?;
    fetcher.fetch_products(config.database.only_active).await
}

pub fn scan_images(config: &AuditConfig) -> Result<ImageIndex> {
    ImageIndex::scan(&config.catalog.image_root, &config.catalog.image_url_prefix)
}

pub fn emitter_options(config: &AuditConfig, title: &str) -> SqlEmitterOptions {
    SqlEmitterOptions {
        title: title.to_string(),
        delete_missing_images: config.catalog.delete_missing_images,
        update_prices: config.catalog.update_prices,
        generated_at: Some(Utc::now()),
    }
}

/// Files written by one reconciliation run.
pub struct RunOutput {
    pub reconciliation: Reconciliation,
    pub script: SqlScript,
    pub sql_path: PathBuf,
    pub report_path: PathBuf,
}

/// Reconciles, keeps the requested classes, writes `<stem>.sql` and
/// `<stem>.json`, and prints the console summary.
pub fn reconcile_and_write(
    config: &AuditConfig,
    csv: &LoadedCatalog,
    database: &LoadedCatalog,
    images: &ImageIndex,
    classes: Option<&[FindingClass]>,
    stem: &str,
    title: &str,
) -> Result<RunOutput> {
    let classifier = CategoryClassifier::new()?;
    let reconciler = Reconciler::new(&classifier, images);

    let mut reconciliation = reconciler.reconcile(&csv.products, &database.products);
    if let Some(classes) = classes {
        reconciliation.retain_classes(classes);
    }

    let script = SqlEmitter::new(emitter_options(config, title)).render(&reconciliation.findings);

    let storage = StorageManager::new(&config.catalog.output_path)?;
    let sql_path = storage.write_text(&format!("{}.sql", stem), &script.text)?;

    let sources = vec![SourceStats::from(csv), SourceStats::from(database)];
    let report = ReconciliationReport::new(
        Utc::now().to_rfc3339(),
        &reconciliation,
        sources.clone(),
        &script,
        Some(sql_path.display().to_string()),
    );
    let report_path = storage.write_json(&format!("{}.json", stem), &report)?;

    ReportWriter::new(config.catalog.examples_per_class).print_summary(&reconciliation, &sources);
    info!(
        "✅ {} statements written, {} entries skipped",
        script.statements,
        script.skipped.len()
    );

    Ok(RunOutput {
        reconciliation,
        script,
        sql_path,
        report_path,
    })
}

pub fn print_next_steps(config: &AuditConfig, output: &RunOutput) {
    println!("\n=== NEXT STEPS ===");
    println!("1. Review {}", output.sql_path.display());
    println!(
        "2. Apply it: psql -h {} -p {} -U {} -d {} -f {}",
        config.database.host,
        config.database.port,
        config.database.user,
        config.database.dbname,
        output.sql_path.display()
    );
    println!("3. Full report: {}", output.report_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Finding;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> AuditConfig {
        let mut config = AuditConfig::default();
        config.catalog.csv_path = dir.join("products.csv");
        config.catalog.image_root = dir.join("images");
        config.catalog.output_path = dir.join("out");
        config.catalog.db_export_path = Some(dir.join("export.csv"));
        config
    }

    #[test]
    fn test_missing_csv_continues_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = load_csv_or_empty(&dir.path().join("missing.csv")).unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_missing_export_continues_empty() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let catalog = load_database_catalog(&config).await.unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.source, "database");
    }

    #[tokio::test]
    async fn test_end_to_end_from_files() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        fs::write(
            &config.catalog.csv_path,
            "sku,name,price\nFWDR25SS014G,Đầm nữ tay lỡ,\"750,000\"\nKS25FH57C,Áo polo nam,450000\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("export.csv"),
            "Id,SKU,Name,Price,category,FeaturedImageUrl\n\
             11111111-1111-1111-1111-111111111111,KS25FH57C,Áo polo nam,450000,Áo nam,/images/ao-nam/KS25FH57C-SC.jpg\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("images/ao-nam")).unwrap();
        fs::write(dir.path().join("images/ao-nam/ks25fh57c-sc.jpg"), b"img").unwrap();

        let csv = load_csv_or_empty(&config.catalog.csv_path).unwrap();
        let database = load_database_catalog(&config).await.unwrap();
        let images = scan_images(&config).unwrap();

        let output =
            reconcile_and_write(&config, &csv, &database, &images, None, "catalog_fix", "test")
                .unwrap();

        let counts = output.reconciliation.counts();
        assert_eq!(counts[&FindingClass::MissingInDatabase], 1);
        assert_eq!(counts[&FindingClass::MissingImage], 1);
        assert_eq!(counts[&FindingClass::CategoryMismatch], 0);

        let sql = fs::read_to_string(&output.sql_path).unwrap();
        assert!(sql.contains("WHERE NOT EXISTS (SELECT 1 FROM \"Products\" WHERE \"SKU\" = 'FWDR25SS014G');"));
        assert!(sql.contains("\"FeaturedImageUrl\" = '/images/ao-nam/ks25fh57c-sc.jpg'"));

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output.report_path).unwrap()).unwrap();
        assert_eq!(report["counts"]["missing_in_database"], 1);
        assert_eq!(report["counts"]["price_mismatch"], 0);

        let only_images = reconcile_and_write(
            &config,
            &LoadedCatalog::empty("csv"),
            &database,
            &images,
            Some(&[FindingClass::MissingImage]),
            "image_fix",
            "images",
        )
        .unwrap();
        assert!(only_images
            .reconciliation
            .findings
            .iter()
            .all(|f| matches!(f, Finding::MissingImage { .. })));
    }
}
