use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::processor::RuleNormalizer;

/// Products keyed by normalized SKU. Iteration order is alphabetical, which keeps
/// every report and SQL script reproducible.
pub type Catalog = BTreeMap<Sku, Product>;

/// Normalized stock keeping unit: trimmed and uppercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(RecordError::EmptySku);
        }
        Ok(Sku(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Freelancer (womenswear) SKUs carry the `FW` prefix.
    pub fn is_freelancer(&self) -> bool {
        self.0.starts_with(FREELANCER_SKU_PREFIX)
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const FREELANCER_SKU_PREFIX: &str = "FW";

/// One product row, from the CSV export or from the products table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    /// Database primary key; absent for CSV-only records.
    pub id: Option<String>,
    pub sku: Sku,
    pub name: String,
    pub price: Option<f64>,
    /// Category label exactly as stored in the source.
    pub category_label: Option<String>,
    pub image_url: Option<String>,
}

impl Product {
    pub fn from_csv(sku: Sku, name: &str, price: f64) -> Self {
        Product {
            id: None,
            sku,
            name: name.trim().to_string(),
            price: Some(price),
            category_label: None,
            image_url: None,
        }
    }

    pub fn brand(&self) -> Brand {
        Brand::for_product(&self.sku, &self.name)
    }
}

/// The closed category vocabulary used by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    AoNu,
    QuanNu,
    ChanVayNu,
    DamNu,
    PhuKienNu,
    AoNam,
    QuanNam,
    PhuKienNam,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::AoNu,
        Category::QuanNu,
        Category::ChanVayNu,
        Category::DamNu,
        Category::PhuKienNu,
        Category::AoNam,
        Category::QuanNam,
        Category::PhuKienNam,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::AoNu => "Áo nữ",
            Category::QuanNu => "Quần nữ",
            Category::ChanVayNu => "Chân váy nữ",
            Category::DamNu => "Đầm nữ",
            Category::PhuKienNu => "Phụ kiện nữ",
            Category::AoNam => "Áo nam",
            Category::QuanNam => "Quần nam",
            Category::PhuKienNam => "Phụ kiện nam",
        }
    }

    /// Image folder name under the image root.
    pub fn folder(self) -> &'static str {
        match self {
            Category::AoNu => "ao-nu",
            Category::QuanNu => "quan-nu",
            Category::ChanVayNu => "chan-vay-nu",
            Category::DamNu => "dam-nu",
            Category::PhuKienNu => "phu-kien-nu",
            Category::AoNam => "ao-nam",
            Category::QuanNam => "quan-nam",
            Category::PhuKienNam => "phu-kien-nam",
        }
    }

    pub fn brand(self) -> Brand {
        match self {
            Category::AoNam | Category::QuanNam | Category::PhuKienNam => Brand::JohnHenry,
            _ => Brand::Freelancer,
        }
    }

    /// Looks a category up by label (any case, any accent form the slugger folds)
    /// or by folder name.
    pub fn from_label(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        if let Some(category) = Self::ALL
            .iter()
            .find(|c| c.label().to_lowercase() == wanted || c.folder() == wanted)
        {
            return Some(*category);
        }

        let slug = RuleNormalizer.slugify(&wanted);
        Self::ALL.iter().copied().find(|c| c.folder() == slug)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Category::from_label(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category: {}", raw)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Brand {
    #[serde(rename = "John Henry", alias = "JohnHenry")]
    JohnHenry,
    #[serde(rename = "Freelancer")]
    Freelancer,
}

impl Brand {
    pub fn name(self) -> &'static str {
        match self {
            Brand::JohnHenry => "John Henry",
            Brand::Freelancer => "Freelancer",
        }
    }

    pub fn for_product(sku: &Sku, name: &str) -> Self {
        if sku.is_freelancer() || name.to_lowercase().contains("freelancer") {
            Brand::Freelancer
        } else {
            Brand::JohnHenry
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a single input record was rejected or left out of generated SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RecordError {
    #[error("empty SKU")]
    EmptySku,
    #[error("empty product name")]
    EmptyName,
    #[error("unparseable price '{0}'")]
    InvalidPrice(String),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("no primary key to target")]
    MissingPrimaryKey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// 1-based line in the source file, header included.
    pub line: usize,
    pub sku: Option<String>,
    pub reason: RecordError,
}

/// A catalog plus the bookkeeping of how it was loaded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadedCatalog {
    pub source: String,
    pub rows: usize,
    pub products: Catalog,
    pub rejected: Vec<RejectedRow>,
    pub duplicates: usize,
}

impl LoadedCatalog {
    pub fn empty(source: &str) -> Self {
        LoadedCatalog {
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// First occurrence of a SKU wins; later ones only bump the duplicate counter.
    pub fn insert(&mut self, product: Product) -> bool {
        if self.products.contains_key(&product.sku) {
            self.duplicates += 1;
            return false;
        }
        self.products.insert(product.sku.clone(), product);
        true
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageIssue {
    EmptyUrl,
    AccentedFilename,
    MalformedUrl,
    MissingFolder,
    MissingFile,
}

impl ImageIssue {
    pub fn describe(self) -> &'static str {
        match self {
            ImageIssue::EmptyUrl => "no image URL recorded",
            ImageIssue::AccentedFilename => "accented characters in filename",
            ImageIssue::MalformedUrl => "URL is not <folder>/<file>",
            ImageIssue::MissingFolder => "image folder does not exist",
            ImageIssue::MissingFile => "file not found",
        }
    }
}

/// Outcome of resolving a product image on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageLookup {
    Found {
        url: String,
    },
    /// The file exists but its name differs from the recorded one in case only.
    CaseMismatch {
        recorded: String,
        actual_url: String,
    },
    /// The recorded file is unusable but a file carrying the product's SKU exists.
    SkuMatch {
        recorded: String,
        actual_url: String,
    },
    NotFound {
        reason: ImageIssue,
        placeholder_url: String,
    },
}

impl ImageLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, ImageLookup::Found { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ImageLookup::NotFound { .. })
    }

    /// URL to store for the product: the on-disk file when one exists,
    /// the placeholder otherwise.
    pub fn url(&self) -> &str {
        match self {
            ImageLookup::Found { url } => url,
            ImageLookup::CaseMismatch { actual_url, .. } => actual_url,
            ImageLookup::SkuMatch { actual_url, .. } => actual_url,
            ImageLookup::NotFound {
                placeholder_url, ..
            } => placeholder_url,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ImageLookup::Found { url } => format!("found {}", url),
            ImageLookup::CaseMismatch {
                recorded,
                actual_url,
            } => format!("case mismatch: recorded '{}' but file is '{}'", recorded, actual_url),
            ImageLookup::SkuMatch {
                recorded,
                actual_url,
            } => format!("recorded '{}' unusable, SKU file '{}'", recorded, actual_url),
            ImageLookup::NotFound { reason, .. } => reason.describe().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingClass {
    Matched,
    MissingInDatabase,
    MissingImage,
    CategoryMismatch,
    PriceMismatch,
}

impl FindingClass {
    pub const ALL: [FindingClass; 5] = [
        FindingClass::Matched,
        FindingClass::MissingInDatabase,
        FindingClass::MissingImage,
        FindingClass::CategoryMismatch,
        FindingClass::PriceMismatch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FindingClass::Matched => "matched",
            FindingClass::MissingInDatabase => "missing_in_database",
            FindingClass::MissingImage => "missing_image",
            FindingClass::CategoryMismatch => "category_mismatch",
            FindingClass::PriceMismatch => "price_mismatch",
        }
    }

    pub fn severity(self) -> u8 {
        match self {
            FindingClass::MissingInDatabase => 4,
            FindingClass::CategoryMismatch => 3,
            FindingClass::MissingImage => 2,
            FindingClass::PriceMismatch => 1,
            FindingClass::Matched => 0,
        }
    }
}

impl fmt::Display for FindingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One reconciliation result for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Finding {
    Matched {
        sku: Sku,
    },
    MissingInDatabase {
        sku: Sku,
        name: String,
        price: f64,
        proposed_category: Category,
        brand: Brand,
        image: ImageLookup,
    },
    MissingImage {
        id: Option<String>,
        sku: Sku,
        name: String,
        current_url: Option<String>,
        lookup: ImageLookup,
    },
    CategoryMismatch {
        id: Option<String>,
        sku: Sku,
        name: String,
        current: Option<String>,
        proposed: Category,
    },
    PriceMismatch {
        id: Option<String>,
        sku: Sku,
        database_price: Option<f64>,
        csv_price: f64,
    },
}

impl Finding {
    pub fn class(&self) -> FindingClass {
        match self {
            Finding::Matched { .. } => FindingClass::Matched,
            Finding::MissingInDatabase { .. } => FindingClass::MissingInDatabase,
            Finding::MissingImage { .. } => FindingClass::MissingImage,
            Finding::CategoryMismatch { .. } => FindingClass::CategoryMismatch,
            Finding::PriceMismatch { .. } => FindingClass::PriceMismatch,
        }
    }

    pub fn sku(&self) -> &Sku {
        match self {
            Finding::Matched { sku }
            | Finding::MissingInDatabase { sku, .. }
            | Finding::MissingImage { sku, .. }
            | Finding::CategoryMismatch { sku, .. }
            | Finding::PriceMismatch { sku, .. } => sku,
        }
    }

    /// One-line human description used in console examples.
    pub fn describe(&self) -> String {
        match self {
            Finding::Matched { sku } => sku.to_string(),
            Finding::MissingInDatabase {
                sku,
                name,
                price,
                proposed_category,
                brand,
                image,
            } => format!(
                "{:<20} {} ({:.0} VND) -> {} / {}, image: {}",
                sku,
                name,
                price,
                proposed_category,
                brand,
                image.url()
            ),
            Finding::MissingImage { sku, name, lookup, .. } => {
                format!("{:<20} {} | {}", sku, truncate(name, 50), lookup.describe())
            }
            Finding::CategoryMismatch {
                sku,
                name,
                current,
                proposed,
                ..
            } => format!(
                "{:<20} {} | {} -> {}",
                sku,
                truncate(name, 50),
                current.as_deref().unwrap_or("(none)"),
                proposed
            ),
            Finding::PriceMismatch {
                sku,
                database_price,
                csv_price,
                ..
            } => format!(
                "{:<20} {} -> {:.0}",
                sku,
                database_price
                    .map(|p| format!("{:.0}", p))
                    .unwrap_or_else(|| "(none)".to_string()),
                csv_price
            ),
        }
    }
}

/// An image file whose SKU appears in no catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanImage {
    pub sku: Sku,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Ok,
    NoData,
    Critical,
    RenderingIssue,
    PossiblyHardcoded,
    Error,
}

impl PageStatus {
    pub fn label(self) -> &'static str {
        match self {
            PageStatus::Ok => "OK",
            PageStatus::NoData => "NO DATA",
            PageStatus::Critical => "CRITICAL",
            PageStatus::RenderingIssue => "RENDERING ISSUE",
            PageStatus::PossiblyHardcoded => "POSSIBLY HARDCODED",
            PageStatus::Error => "ERROR",
        }
    }

    pub fn is_warning(self) -> bool {
        matches!(self, PageStatus::NoData | PageStatus::PossiblyHardcoded)
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            PageStatus::Critical | PageStatus::RenderingIssue | PageStatus::Error
        )
    }
}

/// Result of checking one storefront page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageAudit {
    pub page: String,
    pub url: String,
    pub status: PageStatus,
    pub backend_total: usize,
    pub frontend_count: usize,
    pub expected_on_page: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub has_pagination: bool,
    pub skus: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageAudit {
    pub fn failed(page: &str, url: &str, error: String) -> Self {
        PageAudit {
            page: page.to_string(),
            url: url.to_string(),
            status: PageStatus::Error,
            backend_total: 0,
            frontend_count: 0,
            expected_on_page: 0,
            current_page: 0,
            total_pages: 0,
            has_pagination: false,
            skus: Vec::new(),
            issues: Vec::new(),
            error: Some(error),
        }
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        value.chars().take(max_chars).collect::<String>() + "…"
    }
}
