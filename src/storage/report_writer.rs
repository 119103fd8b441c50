use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{
    Brand, Category, Finding, FindingClass, LoadedCatalog, OrphanImage, PageAudit, PageStatus,
    RejectedRow, Sku,
};
use crate::processor::{Reconciliation, SkippedFinding, SqlScript};

/// Load bookkeeping for one source, as written to the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub rows: usize,
    pub loaded: usize,
    pub duplicates: usize,
    pub rejected: Vec<RejectedRow>,
}

impl From<&LoadedCatalog> for SourceStats {
    fn from(catalog: &LoadedCatalog) -> Self {
        SourceStats {
            source: catalog.source.clone(),
            rows: catalog.rows,
            loaded: catalog.len(),
            duplicates: catalog.duplicates,
            rejected: catalog.rejected.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReconciliationReport<'a> {
    pub generated_at: String,
    pub counts: BTreeMap<FindingClass, usize>,
    pub sources: Vec<SourceStats>,
    pub findings: &'a [Finding],
    pub orphan_images: &'a [OrphanImage],
    pub sku_status: &'a BTreeMap<Sku, FindingClass>,
    pub sql_path: Option<String>,
    pub sql_statements: usize,
    pub sql_skipped: &'a [SkippedFinding],
}

impl<'a> ReconciliationReport<'a> {
    pub fn new(
        generated_at: String,
        reconciliation: &'a Reconciliation,
        sources: Vec<SourceStats>,
        script: &'a SqlScript,
        sql_path: Option<String>,
    ) -> Self {
        ReconciliationReport {
            generated_at,
            counts: reconciliation.counts(),
            sources,
            findings: &reconciliation.findings,
            orphan_images: &reconciliation.orphan_images,
            sku_status: &reconciliation.sku_status,
            sql_path,
            sql_statements: script.statements,
            sql_skipped: &script.skipped,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageAuditReport<'a> {
    pub generated_at: String,
    pub base_url: String,
    pub ok: usize,
    pub warnings: usize,
    pub errors: usize,
    pub pages: &'a [PageAudit],
}

impl<'a> PageAuditReport<'a> {
    pub fn new(generated_at: String, base_url: &str, pages: &'a [PageAudit]) -> Self {
        PageAuditReport {
            generated_at,
            base_url: base_url.to_string(),
            ok: pages.iter().filter(|p| p.status == PageStatus::Ok).count(),
            warnings: pages.iter().filter(|p| p.status.is_warning()).count(),
            errors: pages.iter().filter(|p| p.status.is_error()).count(),
            pages,
        }
    }
}

/// Console renderings of run results.
pub struct ReportWriter {
    pub examples_per_class: usize,
}

impl ReportWriter {
    pub fn new(examples_per_class: usize) -> Self {
        ReportWriter { examples_per_class }
    }

    /// Count for every class (zeros included) followed by the first few examples
    /// of each non-empty class.
    pub fn render_summary(&self, reconciliation: &Reconciliation, sources: &[SourceStats]) -> String {
        let mut lines = vec!["\n=== RECONCILIATION SUMMARY ===".to_string()];

        for source in sources {
            lines.push(format!(
                "{:<10} {} rows, {} loaded, {} rejected, {} duplicates",
                source.source,
                source.rows,
                source.loaded,
                source.rejected.len(),
                source.duplicates
            ));
        }
        lines.push(String::new());

        for (class, count) in reconciliation.counts() {
            lines.push(format!("{:<22} {}", class.label(), count));
        }
        lines.push(format!(
            "{:<22} {}",
            "orphan_images",
            reconciliation.orphan_images.len()
        ));

        for class in FindingClass::ALL {
            if class == FindingClass::Matched {
                continue;
            }
            let examples: Vec<String> = reconciliation.of_class(class).map(Finding::describe).collect();
            if examples.is_empty() {
                continue;
            }
            lines.push(format!("\n--- {} ({}) ---", class.label(), examples.len()));
            self.push_examples(&mut lines, &examples);
        }

        let orphans = &reconciliation.orphan_images;
        if !orphans.is_empty() {
            lines.push(format!("\n--- orphan_images ({}) ---", orphans.len()));
            let examples: Vec<String> = orphans
                .iter()
                .map(|orphan| format!("{:<20} {}", orphan.sku, orphan.url))
                .collect();
            self.push_examples(&mut lines, &examples);
        }

        lines.join("\n")
    }

    fn push_examples(&self, lines: &mut Vec<String>, examples: &[String]) {
        lines.extend(
            examples
                .iter()
                .take(self.examples_per_class)
                .map(|example| format!("  {}", example)),
        );
        if examples.len() > self.examples_per_class {
            lines.push(format!(
                "  ... and {} more",
                examples.len() - self.examples_per_class
            ));
        }
    }

    pub fn print_summary(&self, reconciliation: &Reconciliation, sources: &[SourceStats]) {
        println!("{}", self.render_summary(reconciliation, sources));
    }

    /// Per-category and per-brand counts of insert proposals, with image coverage.
    pub fn render_classification_report(&self, proposals: &[Finding]) -> String {
        let mut by_category: BTreeMap<Category, (usize, usize)> = BTreeMap::new();
        let mut by_brand: BTreeMap<Brand, usize> = BTreeMap::new();
        let mut without_image = Vec::new();

        for finding in proposals {
            let Finding::MissingInDatabase {
                sku,
                name,
                proposed_category,
                brand,
                image,
                ..
            } = finding
            else {
                continue;
            };
            let entry = by_category.entry(*proposed_category).or_insert((0, 0));
            entry.0 += 1;
            if image.is_not_found() {
                without_image.push((sku, name, *proposed_category));
            } else {
                entry.1 += 1;
            }
            *by_brand.entry(*brand).or_insert(0) += 1;
        }

        let total: usize = by_category.values().map(|(count, _)| count).sum();
        let with_image = total - without_image.len();

        let mut lines = vec![
            "=== CLASSIFICATION REPORT ===".to_string(),
            format!("Total products: {}", total),
            format!("With image: {} ({:.1}%)", with_image, percent(with_image, total)),
            format!("Without image: {}", without_image.len()),
            "\n--- By category ---".to_string(),
        ];
        for category in Category::ALL {
            let (count, images) = by_category.get(&category).copied().unwrap_or((0, 0));
            lines.push(format!(
                "{:<14} {:>5} products, {:>5} with image ({:.1}%)",
                category.label(),
                count,
                images,
                percent(images, count)
            ));
        }

        lines.push("\n--- By brand ---".to_string());
        for brand in [Brand::JohnHenry, Brand::Freelancer] {
            lines.push(format!(
                "{:<14} {:>5}",
                brand.name(),
                by_brand.get(&brand).copied().unwrap_or(0)
            ));
        }

        if !without_image.is_empty() {
            lines.push("\n--- Products without image ---".to_string());
            for (sku, name, category) in without_image {
                lines.push(format!("  {:<20} {:<14} {}", sku, category.label(), name));
            }
        }

        let mut report = lines.join("\n");
        report.push('\n');
        report
    }

    pub fn render_page_summary(&self, audits: &[PageAudit]) -> String {
        let mut lines = vec![
            "\n=== PAGE AUDIT SUMMARY ===".to_string(),
            format!(
                "{:<24} {:<20} {:>8} {:>9} {:>8}",
                "Page", "Status", "Backend", "Frontend", "Pages"
            ),
        ];

        for audit in audits {
            lines.push(format!(
                "{:<24} {:<20} {:>8} {:>9} {:>5}/{}",
                audit.page,
                audit.status.label(),
                audit.backend_total,
                audit.frontend_count,
                audit.current_page,
                audit.total_pages
            ));
            if let Some(error) = &audit.error {
                lines.push(format!("    error: {}", error));
            }
            lines.extend(audit.issues.iter().map(|issue| format!("    - {}", issue)));
        }

        let ok = audits.iter().filter(|a| a.status == PageStatus::Ok).count();
        let warnings = audits.iter().filter(|a| a.status.is_warning()).count();
        let errors = audits.iter().filter(|a| a.status.is_error()).count();
        lines.push(format!(
            "\n✅ OK: {}  ⚠️ Warnings: {}  ❌ Errors: {}",
            ok, warnings, errors
        ));
        lines.join("\n")
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
