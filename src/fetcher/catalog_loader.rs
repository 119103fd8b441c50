use anyhow::{Context, Result, anyhow};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::models::{LoadedCatalog, Product, RecordError, RejectedRow, Sku};
use crate::processor::RuleNormalizer;

/// Reads a CSV with every column as a string and trims the values.
fn read_frame(path: &Path) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open CSV: {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;

    RuleNormalizer.normalize_dataframe(&mut df)?;
    Ok(df)
}

/// Finds a column by any of its accepted names, ignoring case and a leading BOM.
fn find_column(df: &DataFrame, names: &[&str]) -> Option<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.as_str())
        .find(|column| {
            let normalized = column.trim_start_matches('\u{feff}').trim().to_lowercase();
            names.iter().any(|name| normalized == *name)
        })
        .map(str::to_string)
}

fn require_column(df: &DataFrame, names: &[&str], path: &Path) -> Result<String> {
    find_column(df, names).ok_or_else(|| {
        anyhow!(
            "CSV {} has no '{}' column (found: {:?})",
            path.display(),
            names[0],
            df.get_column_names()
        )
    })
}

/// Cell accessor over the string columns of one frame.
struct Cells<'a> {
    columns: Vec<Option<&'a StringChunked>>,
}

impl<'a> Cells<'a> {
    fn new(df: &'a DataFrame, names: &[Option<String>]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| -> Result<Option<&'a StringChunked>> {
                match name {
                    Some(name) => Ok(Some(df.column(name)?.str()?)),
                    None => Ok(None),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Cells { columns })
    }

    fn get(&self, column: usize, row: usize) -> Option<&'a str> {
        self.columns
            .get(column)
            .copied()
            .flatten()
            .and_then(|values| values.get(row))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn reject(catalog: &mut LoadedCatalog, line: usize, sku: Option<&str>, reason: RecordError) {
    warn!(
        "⚠️ {} line {}: rejected {} ({})",
        catalog.source,
        line,
        sku.unwrap_or("<no sku>"),
        reason
    );
    catalog.rejected.push(RejectedRow {
        line,
        sku: sku.map(str::to_string),
        reason,
    });
}

fn add(catalog: &mut LoadedCatalog, product: Product, line: usize) {
    let sku = product.sku.clone();
    if !catalog.insert(product) {
        debug!("{} line {}: duplicate SKU {} ignored", catalog.source, line, sku);
    }
}

/// Loads the product export with `sku`, `name` and `price` columns.
pub fn load_csv_catalog(path: &Path) -> Result<LoadedCatalog> {
    let df = read_frame(path)?;
    let columns = [
        Some(require_column(&df, &["sku"], path)?),
        Some(require_column(&df, &["name"], path)?),
        Some(require_column(&df, &["price"], path)?),
    ];
    let cells = Cells::new(&df, &columns)?;
    let normalizer = RuleNormalizer;

    let mut catalog = LoadedCatalog::empty("csv");
    catalog.rows = df.height();

    for row in 0..df.height() {
        let line = row + 2;
        let raw_sku = cells.get(0, row);

        let sku = match raw_sku.map(Sku::parse) {
            Some(Ok(sku)) => sku,
            Some(Err(reason)) => {
                reject(&mut catalog, line, raw_sku, reason);
                continue;
            }
            None => {
                reject(&mut catalog, line, None, RecordError::EmptySku);
                continue;
            }
        };

        let Some(name) = cells.get(1, row) else {
            reject(&mut catalog, line, raw_sku, RecordError::EmptyName);
            continue;
        };

        let price = match cells.get(2, row) {
            Some(raw) => normalizer.parse_price(raw),
            None => Err(RecordError::MissingField("price")),
        };
        let price = match price {
            Ok(price) => price,
            Err(reason) => {
                reject(&mut catalog, line, raw_sku, reason);
                continue;
            }
        };

        add(&mut catalog, Product::from_csv(sku, name, price), line);
    }

    info!(
        "✅ Loaded {} products from {} ({} rows, {} rejected, {} duplicates)",
        catalog.len(),
        path.display(),
        catalog.rows,
        catalog.rejected.len(),
        catalog.duplicates
    );
    Ok(catalog)
}

/// Loads a dump of the products table (`Id`, `SKU`, `Name`, `Price`, `category`,
/// `FeaturedImageUrl`); only `SKU` and `Name` are required.
pub fn load_export_catalog(path: &Path) -> Result<LoadedCatalog> {
    let df = read_frame(path)?;
    let columns = [
        find_column(&df, &["id"]),
        Some(require_column(&df, &["sku"], path)?),
        Some(require_column(&df, &["name"], path)?),
        find_column(&df, &["price"]),
        find_column(&df, &["category", "categoryname", "category_name"]),
        find_column(&df, &["featuredimageurl", "image_url", "imageurl"]),
    ];
    let cells = Cells::new(&df, &columns)?;
    let normalizer = RuleNormalizer;

    let mut catalog = LoadedCatalog::empty("database");
    catalog.rows = df.height();

    for row in 0..df.height() {
        let line = row + 2;
        let raw_sku = cells.get(1, row);

        let sku = match raw_sku.map(Sku::parse) {
            Some(Ok(sku)) => sku,
            Some(Err(reason)) => {
                reject(&mut catalog, line, raw_sku, reason);
                continue;
            }
            None => {
                reject(&mut catalog, line, None, RecordError::EmptySku);
                continue;
            }
        };

        let Some(name) = cells.get(2, row) else {
            reject(&mut catalog, line, raw_sku, RecordError::EmptyName);
            continue;
        };

        let price = match cells.get(3, row).map(|raw| normalizer.parse_price(raw)) {
            Some(Ok(price)) => Some(price),
            Some(Err(reason)) => {
                reject(&mut catalog, line, raw_sku, reason);
                continue;
            }
            None => None,
        };

        let product = Product {
            id: cells.get(0, row).map(str::to_string),
            sku,
            name: name.to_string(),
            price,
            category_label: cells.get(4, row).map(str::to_string),
            image_url: cells.get(5, row).map(str::to_string),
        };
        add(&mut catalog, product, line);
    }

    info!(
        "✅ Loaded {} database products from export {} ({} rejected)",
        catalog.len(),
        path.display(),
        catalog.rejected.len()
    );
    Ok(catalog)
}
