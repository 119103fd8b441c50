use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

use crate::models::{Brand, Category, Finding, ImageLookup, RecordError, Sku};
use crate::processor::RuleNormalizer;

const RULE: &str = "-- =====================================================";

#[derive(Debug, Clone)]
pub struct SqlEmitterOptions {
    pub title: String,
    /// Emit `DELETE` for products whose image cannot be found instead of a comment.
    pub delete_missing_images: bool,
    /// Emit `UPDATE ... "Price"` for price mismatches instead of a comment.
    pub update_prices: bool,
    /// Stamped into the header when set; the only run-dependent bytes.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for SqlEmitterOptions {
    fn default() -> Self {
        Self {
            title: "Catalog reconciliation".to_string(),
            delete_missing_images: false,
            update_prices: false,
            generated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFinding {
    pub sku: Sku,
    pub reason: RecordError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlScript {
    pub text: String,
    /// INSERT, UPDATE and DELETE statements inside the transaction.
    pub statements: usize,
    pub skipped: Vec<SkippedFinding>,
    pub inserted_skus: Vec<Sku>,
}

/// Renders findings into one transaction of idempotent statements followed by
/// verification queries.
pub struct SqlEmitter {
    options: SqlEmitterOptions,
    normalizer: RuleNormalizer,
}

#[derive(Default)]
struct Sections {
    references: Vec<String>,
    inserts: Vec<String>,
    categories: Vec<String>,
    images: Vec<String>,
    missing_images: Vec<String>,
    prices: Vec<String>,
    statements: usize,
    skipped: Vec<SkippedFinding>,
    inserted_skus: BTreeSet<Sku>,
    /// Categories and brands the statements look up by name.
    categories_used: BTreeSet<Category>,
    brands_used: BTreeSet<Brand>,
}

impl Sections {
    fn skip(&mut self, sku: &Sku, reason: RecordError) {
        warn!("⚠️ Skipping {} in SQL output: {}", sku, reason);
        self.skipped.push(SkippedFinding {
            sku: sku.clone(),
            reason,
        });
    }
}

impl SqlEmitter {
    pub fn new(options: SqlEmitterOptions) -> Self {
        SqlEmitter {
            options,
            normalizer: RuleNormalizer,
        }
    }

    pub fn render(&self, findings: &[Finding]) -> SqlScript {
        let mut sections = Sections::default();

        for finding in findings {
            match finding {
                Finding::Matched { .. } => {}
                Finding::MissingInDatabase {
                    sku,
                    name,
                    price,
                    proposed_category,
                    brand,
                    image,
                } => {
                    if sections.inserted_skus.contains(sku) {
                        continue;
                    }
                    match self.insert_statement(sku, name, *price, *proposed_category, *brand, image) {
                        Ok(statement) => {
                            sections.inserts.push(statement);
                            sections.inserted_skus.insert(sku.clone());
                            sections.categories_used.insert(*proposed_category);
                            sections.brands_used.insert(*brand);
                            sections.statements += 1;
                        }
                        Err(reason) => sections.skip(sku, reason),
                    }
                }
                Finding::CategoryMismatch {
                    id,
                    sku,
                    name,
                    current,
                    proposed,
                } => match id {
                    Some(id) => {
                        sections.categories.push(format!(
                            "-- {} | {} | {} -> {}\n\
                             UPDATE \"Products\" SET \"CategoryId\" = {}, \"UpdatedAt\" = NOW() WHERE \"Id\" = {};",
                            sku,
                            comment_text(name),
                            comment_text(current.as_deref().unwrap_or("(none)")),
                            proposed,
                            category_lookup(*proposed),
                            sql_literal(id)
                        ));
                        sections.categories_used.insert(*proposed);
                        sections.statements += 1;
                    }
                    None => sections.skip(sku, RecordError::MissingPrimaryKey),
                },
                Finding::MissingImage {
                    id,
                    sku,
                    name,
                    lookup,
                    ..
                } => {
                    let Some(id) = id else {
                        sections.skip(sku, RecordError::MissingPrimaryKey);
                        continue;
                    };
                    match lookup {
                        ImageLookup::CaseMismatch {
                            recorded,
                            actual_url,
                        }
                        | ImageLookup::SkuMatch {
                            recorded,
                            actual_url,
                        } => {
                            sections.images.push(format!(
                                "-- {} | {} -> {}\n\
                                 UPDATE \"Products\" SET \"FeaturedImageUrl\" = {}, \"UpdatedAt\" = NOW() WHERE \"Id\" = {};",
                                sku,
                                comment_text(if recorded.is_empty() { "(empty)" } else { recorded.as_str() }),
                                actual_url,
                                sql_literal(actual_url),
                                sql_literal(id)
                            ));
                            sections.statements += 1;
                        }
                        ImageLookup::NotFound { reason, .. } => {
                            let note = format!("-- {} | {} | {}", sku, comment_text(name), reason.describe());
                            if self.options.delete_missing_images {
                                sections.missing_images.push(format!(
                                    "{}\nDELETE FROM \"Products\" WHERE \"Id\" = {};",
                                    note,
                                    sql_literal(id)
                                ));
                                sections.statements += 1;
                            } else {
                                sections.missing_images.push(format!("{} (id {})", note, comment_text(id)));
                            }
                        }
                        ImageLookup::Found { .. } => {}
                    }
                }
                Finding::PriceMismatch {
                    id,
                    sku,
                    database_price,
                    csv_price,
                } => {
                    let Some(id) = id else {
                        sections.skip(sku, RecordError::MissingPrimaryKey);
                        continue;
                    };
                    if !csv_price.is_finite() || *csv_price < 0.0 {
                        sections.skip(sku, RecordError::InvalidPrice(csv_price.to_string()));
                        continue;
                    }
                    let note = format!(
                        "-- {} | {} -> {}",
                        sku,
                        database_price.map(format_price).unwrap_or_else(|| "(none)".to_string()),
                        format_price(*csv_price)
                    );
                    if self.options.update_prices {
                        sections.prices.push(format!(
                            "{}\nUPDATE \"Products\" SET \"Price\" = {}, \"UpdatedAt\" = NOW() WHERE \"Id\" = {};",
                            note,
                            format_price(*csv_price),
                            sql_literal(id)
                        ));
                        sections.statements += 1;
                    } else {
                        sections.prices.push(note);
                    }
                }
            }
        }

        for category in &sections.categories_used {
            sections.references.push(self.category_guard(*category));
        }
        for brand in &sections.brands_used {
            sections.references.push(self.brand_guard(*brand));
        }
        sections.statements += sections.references.len();

        let text = self.assemble(findings.len(), &sections);
        SqlScript {
            text,
            statements: sections.statements,
            skipped: sections.skipped,
            inserted_skus: sections.inserted_skus.into_iter().collect(),
        }
    }

    /// `"CategoryId"` is NOT NULL, so every category named by a lookup is created
    /// first when absent.
    fn category_guard(&self, category: Category) -> String {
        let name = sql_literal(category.label());
        format!(
            "INSERT INTO \"Categories\" (\"Id\", \"Name\", \"Slug\", \"Description\", \"IsActive\", \"SortOrder\", \"CreatedAt\", \"UpdatedAt\")\n\
             SELECT gen_random_uuid(), {name}, {slug}, {description}, true, 0, NOW(), NOW()\n\
             WHERE NOT EXISTS (SELECT 1 FROM \"Categories\" WHERE \"Name\" = {name});",
            name = name,
            slug = sql_literal(category.folder()),
            description = sql_literal(&format!("Danh mục {}", category.label())),
        )
    }

    fn brand_guard(&self, brand: Brand) -> String {
        let name = sql_literal(brand.name());
        format!(
            "INSERT INTO \"Brands\" (\"Id\", \"Name\", \"Slug\", \"Description\", \"IsActive\", \"CreatedAt\", \"UpdatedAt\")\n\
             SELECT gen_random_uuid(), {name}, {slug}, {description}, true, NOW(), NOW()\n\
             WHERE NOT EXISTS (SELECT 1 FROM \"Brands\" WHERE \"Name\" = {name});",
            name = name,
            slug = sql_literal(&self.normalizer.slugify(brand.name())),
            description = sql_literal(&format!("Thương hiệu {}", brand.name())),
        )
    }

    fn insert_statement(
        &self,
        sku: &Sku,
        name: &str,
        price: f64,
        category: Category,
        brand: Brand,
        image: &ImageLookup,
    ) -> Result<String, RecordError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RecordError::EmptyName);
        }
        if !price.is_finite() || price < 0.0 {
            return Err(RecordError::InvalidPrice(price.to_string()));
        }

        let slug = self.normalizer.product_slug(name, sku);
        Ok(format!(
            "-- {name_comment} ({sku})\n\
             INSERT INTO \"Products\" (\n    \
                 \"Id\", \"Name\", \"Slug\", \"SKU\", \"Price\", \"StockQuantity\",\n    \
                 \"ManageStock\", \"InStock\", \"FeaturedImageUrl\", \"IsFeatured\",\n    \
                 \"IsActive\", \"Status\", \"ViewCount\", \"Rating\", \"ReviewCount\",\n    \
                 \"CategoryId\", \"BrandId\", \"CreatedAt\", \"UpdatedAt\"\n\
             )\n\
             SELECT\n    \
                 gen_random_uuid(),\n    \
                 {name},\n    \
                 {slug},\n    \
                 {sku_literal},\n    \
                 {price},\n    \
                 100,\n    \
                 true,\n    \
                 true,\n    \
                 {image},\n    \
                 false,\n    \
                 true,\n    \
                 'active',\n    \
                 0,\n    \
                 0,\n    \
                 0,\n    \
                 {category},\n    \
                 {brand},\n    \
                 NOW(),\n    \
                 NOW()\n\
             WHERE NOT EXISTS (SELECT 1 FROM \"Products\" WHERE \"SKU\" = {sku_literal});",
            name_comment = comment_text(name),
            sku = sku,
            name = sql_literal(name),
            slug = sql_literal(&slug),
            sku_literal = sql_literal(sku.as_str()),
            price = format_price(price),
            image = sql_literal(image.url()),
            category = category_lookup(category),
            brand = brand_lookup(brand),
        ))
    }

    fn assemble(&self, finding_count: usize, sections: &Sections) -> String {
        let mut lines = vec![
            RULE.to_string(),
            format!("-- {}", comment_text(&self.options.title)),
        ];
        if let Some(at) = self.options.generated_at {
            lines.push(format!("-- Generated: {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        lines.push(format!("-- Findings: {}", finding_count));
        lines.push(format!("-- Statements: {}", sections.statements));
        if !sections.skipped.is_empty() {
            lines.push(format!("-- Skipped: {}", sections.skipped.len()));
        }
        lines.push(RULE.to_string());
        lines.push(String::new());
        lines.push("BEGIN;".to_string());

        let delete_title = if self.options.delete_missing_images {
            "Delete products whose image cannot be found"
        } else {
            "Products whose image cannot be found (deletion candidates, not deleted)"
        };
        let price_title = if self.options.update_prices {
            "Update prices from CSV"
        } else {
            "Price differences (not applied, enable update_prices)"
        };

        section(&mut lines, "Ensure categories and brands exist", &sections.references);
        section(&mut lines, "Insert missing products", &sections.inserts);
        section(&mut lines, "Fix categories", &sections.categories);
        section(&mut lines, "Fix image URLs", &sections.images);
        section(&mut lines, delete_title, &sections.missing_images);
        section(&mut lines, price_title, &sections.prices);

        lines.push(String::new());
        lines.push("COMMIT;".to_string());
        lines.push(String::new());
        lines.push("-- Verification".to_string());

        if !sections.inserted_skus.is_empty() {
            let list = sections
                .inserted_skus
                .iter()
                .map(|sku| sql_literal(sku.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!(
                "SELECT COUNT(*) AS inserted_products FROM \"Products\" WHERE \"SKU\" IN ({});",
                list
            ));
        }
        lines.push(
            "SELECT c.\"Name\" AS category, COUNT(*) AS product_count \
             FROM \"Products\" p JOIN \"Categories\" c ON p.\"CategoryId\" = c.\"Id\" \
             GROUP BY c.\"Name\" ORDER BY c.\"Name\";"
                .to_string(),
        );

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

fn section(lines: &mut Vec<String>, title: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("-- {} ({})", title, entries.len()));
    lines.push(RULE.to_string());
    lines.extend(entries.iter().cloned());
}

/// Quotes a string literal, doubling embedded single quotes.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whole VND amounts print without decimals.
pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{:.0}", price)
    } else {
        format!("{:.2}", price)
    }
}

fn category_lookup(category: Category) -> String {
    format!(
        "(SELECT \"Id\" FROM \"Categories\" WHERE \"Name\" = {} LIMIT 1)",
        sql_literal(category.label())
    )
}

fn brand_lookup(brand: Brand) -> String {
    format!(
        "(SELECT \"Id\" FROM \"Brands\" WHERE \"Name\" = {} LIMIT 1)",
        sql_literal(brand.name())
    )
}

fn comment_text(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageIssue, ImageLookup};

    fn sku(raw: &str) -> Sku {
        Sku::parse(raw).unwrap()
    }

    fn missing(raw_sku: &str, name: &str, price: f64, category: Category) -> Finding {
        let sku = sku(raw_sku);
        Finding::MissingInDatabase {
            brand: Brand::for_product(&sku, name),
            sku,
            name: name.to_string(),
            price,
            proposed_category: category,
            image: ImageLookup::NotFound {
                reason: ImageIssue::MissingFile,
                placeholder_url: "/images/default-product.jpg".to_string(),
            },
        }
    }

    #[test]
    fn test_guarded_insert() {
        let script = SqlEmitter::new(SqlEmitterOptions::default()).render(&[missing(
            "FWDR25SS014G",
            "Đầm nữ tay lỡ",
            750000.0,
            Category::DamNu,
        )]);

        assert!(script.text.contains("\"Name\" = 'Đầm nữ'"));
        assert!(script.text.contains("\"Name\" = 'Freelancer'"));
        assert!(script
            .text
            .contains("WHERE NOT EXISTS (SELECT 1 FROM \"Products\" WHERE \"SKU\" = 'FWDR25SS014G');"));
        assert!(script.text.contains("'dam-nu-tay-lo-fwdr25ss014g'"));
        assert!(script.text.contains("    750000,\n"));
        assert!(script.text.contains("'/images/default-product.jpg'"));
        assert!(script.text.contains("BEGIN;"));
        assert!(script.text.contains("COMMIT;"));
        assert!(script.text.contains("WHERE \"SKU\" IN ('FWDR25SS014G')"));
        // category guard, brand guard, product insert
        assert_eq!(script.statements, 3);
        assert_eq!(script.inserted_skus, vec![sku("FWDR25SS014G")]);
    }

    #[test]
    fn test_every_insert_is_guarded_and_unique() {
        let findings = vec![
            missing("TS24SS01", "Áo thun nam", 300000.0, Category::AoNam),
            missing("TS24SS01", "Áo thun nam", 300000.0, Category::AoNam),
            missing("DP24SS02", "Quần tây nam", 500000.0, Category::QuanNam),
        ];
        let script = SqlEmitter::new(SqlEmitterOptions::default()).render(&findings);
        let inserts = script.text.matches("INSERT INTO \"Products\"").count();
        let guards = script
            .text
            .matches("WHERE NOT EXISTS (SELECT 1 FROM \"Products\"")
            .count();
        assert_eq!(inserts, 2);
        assert_eq!(guards, 2);
        assert_eq!(script.text.matches("INSERT INTO \"Categories\"").count(), 2);
        assert_eq!(script.text.matches("INSERT INTO \"Brands\"").count(), 1);
        assert_eq!(script.statements, 5);
    }

    #[test]
    fn test_quotes_are_escaped() {
        let script = SqlEmitter::new(SqlEmitterOptions::default()).render(&[missing(
            "TS24SS01",
            "Áo thun 'Classic' nam",
            1.0,
            Category::AoNam,
        )]);
        assert!(script.text.contains("'Áo thun ''Classic'' nam'"));
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let findings = vec![
            missing("TS24SS01", "  ", 1.0, Category::AoNam),
            missing("TS24SS02", "Áo", -5.0, Category::AoNam),
            Finding::CategoryMismatch {
                id: None,
                sku: sku("KS01"),
                name: "Áo".to_string(),
                current: None,
                proposed: Category::AoNam,
            },
        ];
        let script = SqlEmitter::new(SqlEmitterOptions::default()).render(&findings);
        assert_eq!(script.statements, 0);
        assert_eq!(script.skipped.len(), 3);
        assert_eq!(script.skipped[0].reason, RecordError::EmptyName);
        assert_eq!(script.skipped[2].reason, RecordError::MissingPrimaryKey);
        assert!(!script.text.contains("INSERT INTO"));
    }

    #[test]
    fn test_category_and_image_updates() {
        let findings = vec![
            Finding::CategoryMismatch {
                id: Some("11111111-1111-1111-1111-111111111111".to_string()),
                sku: sku("KS25FH57C"),
                name: "Áo polo nam".to_string(),
                current: Some("Quần nam".to_string()),
                proposed: Category::AoNam,
            },
            Finding::MissingImage {
                id: Some("22222222-2222-2222-2222-222222222222".to_string()),
                sku: sku("KS25FH57C"),
                name: "Áo polo nam".to_string(),
                current_url: Some("/images/ao-nam/KS25FH57C-SC.jpg".to_string()),
                lookup: ImageLookup::CaseMismatch {
                    recorded: "/images/ao-nam/KS25FH57C-SC.jpg".to_string(),
                    actual_url: "/images/ao-nam/ks25fh57c-sc.jpg".to_string(),
                },
            },
        ];
        let script = SqlEmitter::new(SqlEmitterOptions::default()).render(&findings);
        assert!(script.text.contains(
            "UPDATE \"Products\" SET \"CategoryId\" = (SELECT \"Id\" FROM \"Categories\" WHERE \"Name\" = 'Áo nam' LIMIT 1), \"UpdatedAt\" = NOW() WHERE \"Id\" = '11111111-1111-1111-1111-111111111111';"
        ));
        assert!(script.text.contains(
            "UPDATE \"Products\" SET \"FeaturedImageUrl\" = '/images/ao-nam/ks25fh57c-sc.jpg', \"UpdatedAt\" = NOW() WHERE \"Id\" = '22222222-2222-2222-2222-222222222222';"
        ));
        assert_eq!(script.statements, 3);
        assert!(script.text.contains("WHERE NOT EXISTS (SELECT 1 FROM \"Categories\" WHERE \"Name\" = 'Áo nam');"));
        assert!(!script.text.contains("INSERT INTO \"Brands\""));
        assert!(!script.text.contains("\"SKU\" IN"));
    }

    #[test]
    fn test_missing_images_and_prices_follow_switches() {
        let findings = vec![
            Finding::MissingImage {
                id: Some("a".to_string()),
                sku: sku("JK01"),
                name: "Áo khoác".to_string(),
                current_url: None,
                lookup: ImageLookup::NotFound {
                    reason: ImageIssue::EmptyUrl,
                    placeholder_url: "/images/default-product.jpg".to_string(),
                },
            },
            Finding::PriceMismatch {
                id: Some("b".to_string()),
                sku: sku("TS01"),
                database_price: Some(100.0),
                csv_price: 120.5,
            },
        ];

        let dry = SqlEmitter::new(SqlEmitterOptions::default()).render(&findings);
        assert_eq!(dry.statements, 0);
        assert!(!dry.text.contains("DELETE FROM"));
        assert!(dry.text.contains("-- TS01 | 100 -> 120.50"));

        let options = SqlEmitterOptions {
            delete_missing_images: true,
            update_prices: true,
            ..Default::default()
        };
        let applied = SqlEmitter::new(options).render(&findings);
        assert_eq!(applied.statements, 2);
        assert!(applied.text.contains("DELETE FROM \"Products\" WHERE \"Id\" = 'a';"));
        assert!(applied
            .text
            .contains("UPDATE \"Products\" SET \"Price\" = 120.50, \"UpdatedAt\" = NOW() WHERE \"Id\" = 'b';"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let findings = vec![
            missing("TS24SS01", "Áo thun nam", 300000.0, Category::AoNam),
            missing("FWDR01", "Đầm", 1.0, Category::DamNu),
        ];
        let emitter = SqlEmitter::new(SqlEmitterOptions::default());
        assert_eq!(emitter.render(&findings).text, emitter.render(&findings).text);
        assert!(!emitter.render(&findings).text.contains("Generated:"));
    }

    #[test]
    fn test_categories_and_brands_exist_before_products() {
        let script = SqlEmitter::new(SqlEmitterOptions::default()).render(&[
            missing("FWDR25SS014G", "Đầm nữ tay lỡ", 750000.0, Category::DamNu),
            missing("TS24SS01", "Áo thun nam", 300000.0, Category::AoNam),
        ]);
        let text = &script.text;

        let first_product = text.find("INSERT INTO \"Products\"").unwrap();
        let dress_guard = text
            .find("WHERE NOT EXISTS (SELECT 1 FROM \"Categories\" WHERE \"Name\" = 'Đầm nữ');")
            .unwrap();
        let brand_guard = text
            .find("WHERE NOT EXISTS (SELECT 1 FROM \"Brands\" WHERE \"Name\" = 'John Henry');")
            .unwrap();
        assert!(text.find("BEGIN;").unwrap() < dress_guard);
        assert!(dress_guard < first_product);
        assert!(brand_guard < first_product);
        assert!(text.contains("'dam-nu', 'Danh mục Đầm nữ'"));
        assert!(text.contains("'john-henry', 'Thương hiệu John Henry'"));
        assert_eq!(script.statements, 6);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(750000.0), "750000");
        assert_eq!(format_price(99.5), "99.50");
    }
}
