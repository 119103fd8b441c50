use serde::{Deserialize, Serialize};

use crate::models::{Brand, Category};

/// The running storefront whose pages get audited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub page_size: usize,
    pub timeout_seconds: u64,
    /// Pages showing fewer cards than this are flagged as possibly hardcoded.
    pub hardcoded_threshold: usize,
    pub selectors: SelectorConfig,
    pub pages: Vec<PageTarget>,
}

/// One storefront listing page and what it is expected to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTarget {
    pub name: String,
    pub path: String,
    pub brand: Brand,
    #[serde(default)]
    pub category: Option<Category>,
}

impl PageTarget {
    pub fn new(name: &str, brand: Brand, category: Option<Category>) -> Self {
        Self {
            name: name.to_string(),
            path: format!("/Home/{}", name),
            brand,
            category,
        }
    }

    pub fn expectation(&self) -> String {
        let prefix = match self.brand {
            Brand::Freelancer => "SKU starting with FW",
            Brand::JohnHenry => "SKU NOT starting with FW",
        };
        match self.category {
            Some(category) => format!("{} + Category: {}", prefix, category),
            None => prefix.to_string(),
        }
    }
}

/// CSS selectors and text patterns describing the storefront markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub product_card: String,
    pub sku_element: String,
    pub sku_attribute: String,
    pub pagination: Vec<String>,
    pub active_page: String,
    pub page_link: String,
    pub total_pattern: String,
    pub sku_pattern: String,
}

impl SiteConfig {
    pub fn url_for(&self, target: &PageTarget) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            target.path.trim_start_matches('/')
        )
    }

    pub fn default_pages() -> Vec<PageTarget> {
        vec![
            PageTarget::new("JohnHenry", Brand::JohnHenry, None),
            PageTarget::new("Freelancer", Brand::Freelancer, None),
            PageTarget::new("FreelancerDress", Brand::Freelancer, Some(Category::DamNu)),
            PageTarget::new("FreelancerShirt", Brand::Freelancer, Some(Category::AoNu)),
            PageTarget::new("FreelancerTrousers", Brand::Freelancer, Some(Category::QuanNu)),
            PageTarget::new("FreelancerSkirt", Brand::Freelancer, Some(Category::ChanVayNu)),
            PageTarget::new(
                "FreelancerAccessories",
                Brand::Freelancer,
                Some(Category::PhuKienNu),
            ),
            PageTarget::new("JohnHenryShirt", Brand::JohnHenry, Some(Category::AoNam)),
            PageTarget::new("JohnHenryTrousers", Brand::JohnHenry, Some(Category::QuanNam)),
            PageTarget::new(
                "JohnHenryAccessories",
                Brand::JohnHenry,
                Some(Category::PhuKienNam),
            ),
        ]
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5101".to_string(),
            page_size: 40,
            timeout_seconds: 10,
            hardcoded_threshold: 10,
            selectors: SelectorConfig::default(),
            pages: Self::default_pages(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            product_card: "div.product-card-new".to_string(),
            sku_element: "p.sku, span.sku".to_string(),
            sku_attribute: "data-sku".to_string(),
            pagination: vec![
                "div.pagination".to_string(),
                "nav[aria-label=\"Page navigation\"]".to_string(),
            ],
            active_page: "a.active, span.active, li.active > a, li.active > span".to_string(),
            page_link: "a[href]".to_string(),
            total_pattern: r"Tổng:\s*(\d+)\s*sản phẩm".to_string(),
            sku_pattern: r"SKU:\s*([A-Z0-9\-]+)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pages() {
        let config = SiteConfig::default();
        assert_eq!(config.pages.len(), 10);
        assert_eq!(config.page_size, 40);
        let dress = &config.pages[2];
        assert_eq!(dress.path, "/Home/FreelancerDress");
        assert_eq!(config.url_for(dress), "http://localhost:5101/Home/FreelancerDress");
        assert_eq!(dress.expectation(), "SKU starting with FW + Category: Đầm nữ");
    }

    #[test]
    fn test_page_from_toml() {
        let config: SiteConfig = toml::from_str(
            r#"
base_url = "http://shop.local/"
[[pages]]
name = "FreelancerDress"
path = "/Home/FreelancerDress"
brand = "Freelancer"
category = "Đầm nữ"

[[pages]]
name = "JohnHenry"
path = "Home/JohnHenry"
brand = "John Henry"
"#,
        )
        .unwrap();

        assert_eq!(config.pages.len(), 2);
        assert_eq!(config.pages[0].category, Some(Category::DamNu));
        assert_eq!(config.pages[1].brand, Brand::JohnHenry);
        assert_eq!(config.pages[1].category, None);
        assert_eq!(config.url_for(&config.pages[1]), "http://shop.local/Home/JohnHenry");
        assert_eq!(config.selectors.product_card, "div.product-card-new");
    }
}
