use anyhow::{Result, anyhow};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::config::{PageTarget, SelectorConfig};
use crate::models::{Brand, FREELANCER_SKU_PREFIX, PageAudit, PageStatus};

const SAMPLE_SKUS: usize = 10;

/// Compares a rendered listing page with the total the backend reports for it.
pub struct PageAnalyzer {
    product_card: Selector,
    sku_element: Selector,
    sku_attribute: String,
    pagination: Vec<Selector>,
    active_page: Selector,
    page_link: Selector,
    total_pattern: Regex,
    sku_pattern: Regex,
    page_size: usize,
    hardcoded_threshold: usize,
}

impl PageAnalyzer {
    pub fn new(selectors: &SelectorConfig, page_size: usize, hardcoded_threshold: usize) -> Result<Self> {
        Ok(PageAnalyzer {
            product_card: parse_selector(&selectors.product_card)?,
            sku_element: parse_selector(&selectors.sku_element)?,
            sku_attribute: selectors.sku_attribute.clone(),
            pagination: selectors
                .pagination
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<Vec<_>>>()?,
            active_page: parse_selector(&selectors.active_page)?,
            page_link: parse_selector(&selectors.page_link)?,
            total_pattern: Regex::new(&selectors.total_pattern)?,
            sku_pattern: Regex::new(&selectors.sku_pattern)?,
            page_size,
            hardcoded_threshold,
        })
    }

    pub fn analyze(&self, target: &PageTarget, url: &str, html: &str) -> PageAudit {
        let backend_total = self.backend_total(html);
        let document = Html::parse_document(html);

        let cards: Vec<ElementRef> = document.select(&self.product_card).collect();
        let frontend_count = cards.len();
        let skus = self.extract_skus(&cards);

        let pagination = self
            .pagination
            .iter()
            .find_map(|selector| document.select(selector).next());
        let (current_page, total_pages) = match pagination {
            Some(container) => self.page_numbers(container),
            None => (1, 1),
        };

        let expected_on_page = self.page_size.min(backend_total);
        let mut issues = Vec::new();

        let status = if backend_total == 0 {
            issues.push("Backend returns 0 products".to_string());
            PageStatus::NoData
        } else if frontend_count == 0 {
            issues.push(format!(
                "Backend has {} products but frontend shows 0",
                backend_total
            ));
            PageStatus::Critical
        } else if frontend_count < expected_on_page {
            issues.push(format!(
                "Expected {} products on page 1, but only {} rendered",
                expected_on_page, frontend_count
            ));
            PageStatus::RenderingIssue
        } else if frontend_count < self.hardcoded_threshold {
            issues.push(format!(
                "Only {} products shown, might be hardcoded sample data",
                frontend_count
            ));
            PageStatus::PossiblyHardcoded
        } else {
            PageStatus::Ok
        };

        if let Some(issue) = brand_issue(target.brand, &skus) {
            issues.push(issue);
        }

        debug!(
            "{}: backend {} / frontend {} -> {:?}",
            target.name, backend_total, frontend_count, status
        );

        PageAudit {
            page: target.name.clone(),
            url: url.to_string(),
            status,
            backend_total,
            frontend_count,
            expected_on_page,
            current_page,
            total_pages,
            has_pagination: pagination.is_some(),
            skus: skus.into_iter().take(SAMPLE_SKUS).collect(),
            issues,
            error: None,
        }
    }

    fn backend_total(&self, html: &str) -> usize {
        self.total_pattern
            .captures(html)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    }

    fn extract_skus(&self, cards: &[ElementRef]) -> Vec<String> {
        let mut skus = Vec::new();
        for card in cards {
            let from_text = card.select(&self.sku_element).next().and_then(|element| {
                let text = element.text().collect::<String>();
                let sku = self
                    .sku_pattern
                    .captures(text.trim())
                    .and_then(|caps| caps.get(1))
                    .map(|sku| sku.as_str().to_string());
                sku
            });
            let from_attribute = card
                .value()
                .attr(&self.sku_attribute)
                .map(str::trim)
                .filter(|sku| !sku.is_empty())
                .map(str::to_string);

            // one SKU per card, even when both the text and the attribute carry it
            match (from_text, from_attribute) {
                (Some(text), Some(attribute)) if text.eq_ignore_ascii_case(&attribute) => skus.push(text),
                (text, attribute) => skus.extend(text.into_iter().chain(attribute)),
            }
        }
        skus
    }

    fn page_numbers(&self, container: ElementRef) -> (usize, usize) {
        let current_page = container
            .select(&self.active_page)
            .next()
            .and_then(|active| active.text().collect::<String>().trim().parse().ok())
            .unwrap_or(1);

        let total_pages = container
            .select(&self.page_link)
            .filter_map(|link| link.text().collect::<String>().trim().parse::<usize>().ok())
            .max()
            .unwrap_or(1);

        (current_page, total_pages.max(current_page))
    }
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| anyhow!("Invalid CSS selector '{}': {:?}", raw, e))
}

/// Freelancer pages must only list FW SKUs and John Henry pages none.
fn brand_issue(brand: Brand, skus: &[String]) -> Option<String> {
    let offending: Vec<&String> = match brand {
        Brand::Freelancer => skus
            .iter()
            .filter(|sku| !sku.starts_with(FREELANCER_SKU_PREFIX))
            .collect(),
        Brand::JohnHenry => skus
            .iter()
            .filter(|sku| sku.starts_with(FREELANCER_SKU_PREFIX))
            .collect(),
    };

    if offending.is_empty() {
        return None;
    }

    let sample: Vec<&str> = offending.iter().take(3).map(|s| s.as_str()).collect();
    let issue = match brand {
        Brand::Freelancer => format!(
            "Found {} SKUs NOT starting with FW: {:?}",
            offending.len(),
            sample
        ),
        Brand::JohnHenry => format!(
            "Found {} SKUs starting with FW: {:?}",
            offending.len(),
            sample
        ),
    };
    warn!("⚠️ {}", issue);
    Some(issue)
}
