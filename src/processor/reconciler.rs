use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::models::{
    Catalog, Category, Finding, FindingClass, OrphanImage, Product, Sku,
};
use crate::processor::CategoryClassifier;
use crate::storage::ImageIndex;

/// Prices closer than this are treated as equal.
pub const PRICE_TOLERANCE: f64 = 0.5;

/// Result of one reconciliation pass. Findings are ordered by SKU.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    pub findings: Vec<Finding>,
    pub orphan_images: Vec<OrphanImage>,
    /// Most severe class per SKU.
    pub sku_status: BTreeMap<Sku, FindingClass>,
}

impl Reconciliation {
    /// Count per class, zero counts included.
    pub fn counts(&self) -> BTreeMap<FindingClass, usize> {
        let mut counts: BTreeMap<FindingClass, usize> =
            FindingClass::ALL.iter().map(|class| (*class, 0)).collect();
        for finding in &self.findings {
            *counts.entry(finding.class()).or_insert(0) += 1;
        }
        counts
    }

    pub fn of_class(&self, class: FindingClass) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.class() == class)
    }

    /// Keeps only findings of the given classes, recomputing the per-SKU status.
    pub fn retain_classes(&mut self, classes: &[FindingClass]) {
        self.findings.retain(|f| classes.contains(&f.class()));
        self.sku_status = status_by_sku(&self.findings);
    }
}

pub struct Reconciler<'a> {
    classifier: &'a CategoryClassifier,
    images: &'a ImageIndex,
}

impl<'a> Reconciler<'a> {
    pub fn new(classifier: &'a CategoryClassifier, images: &'a ImageIndex) -> Self {
        Reconciler { classifier, images }
    }

    /// Compares the CSV catalog, the database catalog and the image folders.
    /// Every SKU in the union of the two catalogs yields at least one finding.
    pub fn reconcile(&self, csv: &Catalog, db: &Catalog) -> Reconciliation {
        let skus: BTreeSet<&Sku> = csv.keys().chain(db.keys()).collect();
        let mut findings = Vec::new();

        for sku in skus {
            match (csv.get(sku), db.get(sku)) {
                (Some(csv_product), None) => findings.push(self.propose_insert(csv_product)),
                (csv_product, Some(db_product)) => {
                    let before = findings.len();
                    findings.extend(self.check_category(db_product));
                    findings.extend(self.check_image(db_product));
                    if let Some(csv_product) = csv_product {
                        findings.extend(self.check_price(csv_product, db_product));
                    }
                    if findings.len() == before {
                        findings.push(Finding::Matched { sku: sku.clone() });
                    }
                }
                (None, None) => {}
            }
        }

        let orphan_images: Vec<OrphanImage> = self
            .images
            .image_skus()
            .into_iter()
            .filter(|(sku, _)| !csv.contains_key(sku) && !db.contains_key(sku))
            .map(|(sku, url)| OrphanImage { sku, url })
            .collect();

        let reconciliation = Reconciliation {
            sku_status: status_by_sku(&findings),
            findings,
            orphan_images,
        };

        info!(
            "✅ Reconciled {} CSV / {} DB products into {} findings ({} orphan images)",
            csv.len(),
            db.len(),
            reconciliation.findings.len(),
            reconciliation.orphan_images.len()
        );
        reconciliation
    }

    /// A guarded insert proposal for every CSV product, whether or not it is
    /// already in the database.
    pub fn insert_proposals(&self, csv: &Catalog) -> Vec<Finding> {
        csv.values().map(|product| self.propose_insert(product)).collect()
    }

    pub fn propose_insert(&self, product: &Product) -> Finding {
        let category = self.classify(product);
        Finding::MissingInDatabase {
            sku: product.sku.clone(),
            name: product.name.clone(),
            price: product.price.unwrap_or_default(),
            proposed_category: category,
            brand: product.brand(),
            image: self.images.resolve_sku(&product.sku, category),
        }
    }

    pub fn classify(&self, product: &Product) -> Category {
        self.classifier.classify(product.sku.as_str(), &product.name)
    }

    /// Flags a stored label that does not name the category the rules pick.
    pub fn check_category(&self, product: &Product) -> Option<Finding> {
        let proposed = self.classify(product);
        let current = product
            .category_label
            .as_deref()
            .and_then(Category::from_label);

        if current == Some(proposed) {
            return None;
        }

        Some(Finding::CategoryMismatch {
            id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            current: product.category_label.clone(),
            proposed,
        })
    }

    /// Flags a stored image URL that does not point at a file, or an empty one.
    /// The stored category's folder is searched first, the classified one when the
    /// label is unknown.
    pub fn check_image(&self, product: &Product) -> Option<Finding> {
        let category = product
            .category_label
            .as_deref()
            .and_then(Category::from_label)
            .unwrap_or_else(|| self.classify(product));

        let lookup = self
            .images
            .resolve_product(product.image_url.as_deref(), &product.sku, category);

        if lookup.is_found() {
            return None;
        }

        Some(Finding::MissingImage {
            id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            current_url: product.image_url.clone(),
            lookup,
        })
    }

    pub fn check_price(&self, csv_product: &Product, db_product: &Product) -> Option<Finding> {
        let csv_price = csv_product.price?;
        let differs = match db_product.price {
            Some(db_price) => (db_price - csv_price).abs() > PRICE_TOLERANCE,
            None => true,
        };

        differs.then(|| Finding::PriceMismatch {
            id: db_product.id.clone(),
            sku: db_product.sku.clone(),
            database_price: db_product.price,
            csv_price,
        })
    }
}

fn status_by_sku(findings: &[Finding]) -> BTreeMap<Sku, FindingClass> {
    let mut status: BTreeMap<Sku, FindingClass> = BTreeMap::new();
    for finding in findings {
        let class = finding.class();
        status
            .entry(finding.sku().clone())
            .and_modify(|current| {
                if class.severity() > current.severity() {
                    *current = class;
                }
            })
            .or_insert(class);
    }
    status
}
